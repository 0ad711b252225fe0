//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use fwlink_test_helpers::prelude::*;
//! ```

pub use crate::must::{must, must_err, must_some, must_with};

#[cfg(feature = "fixtures")]
pub use crate::fixtures::{
    aux_bus_device, display_routing_details, drm_bus_device, interconnect_details,
    thunderbolt_bus_device,
};

#[cfg(feature = "mock")]
pub use crate::mock::{MockDeviceHandle, MockHandleFactory, MockKernelInfo};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
