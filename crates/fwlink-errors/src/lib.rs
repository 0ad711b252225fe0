//! Error taxonomy for fwlink plugins
//!
//! The error system follows the way a plugin reacts to each failure:
//!
//! - [`device`]: access, probe, rescan and firmware-write failures on a
//!   single controller. Probe and rescan failures mean "no hardware
//!   responded" and are swallowed at the registry boundary.
//! - [`firmware`]: the underlying cause of a failed firmware write, carried
//!   unchanged as the `source` of [`DeviceError::Write`].
//! - [`kernel`]: refusals from the kernel safety gate, fatal to plugin
//!   startup only.
//! - [`common`]: the umbrella [`FwlinkError`] plus category and severity
//!   classification.
//!
//! # Example
//!
//! ```
//! use fwlink_errors::prelude::*;
//!
//! fn open(id: &str, locked: bool) -> Result<()> {
//!     if locked {
//!         return Err(DeviceError::access(id, "already locked").into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(open("mst-0", true).is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod common;
pub mod device;
pub mod firmware;
pub mod kernel;
pub mod prelude;

pub use common::{ErrorCategory, ErrorSeverity, FwlinkError};
pub use device::DeviceError;
pub use firmware::FirmwareFault;
pub use kernel::KernelPolicyError;

/// A specialized `Result` type for fwlink operations.
pub type Result<T> = std::result::Result<T, FwlinkError>;

/// A specialized `Result` type for operations on a single device.
pub type DeviceResult<T = ()> = std::result::Result<T, DeviceError>;
