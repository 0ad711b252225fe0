//! Convenience re-exports for common device types

pub use crate::bus::{BusDevice, BusEvent, DeviceHandleFactory};
pub use crate::device::{Device, DeviceDetails, DeviceFamily, DeviceSnapshot};
pub use crate::flags::{DeviceFlags, InstallFlags, InternalFlags};
pub use crate::handle::DeviceHandle;
pub use crate::locker::DeviceLocker;
pub use crate::version::VersionFormat;
