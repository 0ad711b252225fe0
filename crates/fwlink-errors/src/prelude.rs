//! Prelude module for convenient error handling imports.

pub use crate::{
    DeviceResult, Result,
    common::{ErrorCategory, ErrorSeverity, FwlinkError},
    device::DeviceError,
    firmware::FirmwareFault,
    kernel::KernelPolicyError,
};
