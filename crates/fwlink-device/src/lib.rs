//! Device model for fwlink plugins
//!
//! A [`Device`] wraps one physical controller seen on a bus. Everything
//! that touches the hardware goes through a [`DeviceLocker`], which grants
//! exclusive access and releases it on every exit path:
//!
//! - [`device`]: identity, versioning and capability state
//! - [`flags`]: capability, internal and install flags
//! - [`handle`]: the per-family hardware capability interface
//! - [`locker`]: scoped exclusive access
//! - [`bus`]: bus notifications and handle construction
//! - [`guid`]: instance-id to GUID derivation
//! - [`version`]: version-format tags used for display

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bus;
pub mod device;
pub mod flags;
pub mod guid;
pub mod handle;
pub mod locker;
pub mod prelude;
pub mod version;

pub use bus::{BusDevice, BusEvent, DeviceHandleFactory};
pub use device::{Device, DeviceDetails, DeviceFamily, DeviceSnapshot};
pub use flags::{DeviceFlags, InstallFlags, InternalFlags};
pub use guid::{instance_id, instance_id_to_guid};
pub use handle::DeviceHandle;
pub use locker::DeviceLocker;
pub use version::VersionFormat;
