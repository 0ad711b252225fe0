//! Kernel safety gate
//!
//! Some kernel drivers hang when a plugin talks to hardware they also
//! drive. A plugin can be configured with a minimum kernel version; if the
//! risky module is loaded (or unconditionally, when no module is named)
//! the running kernel must be at least that version, otherwise the plugin
//! refuses to start.
//!
//! - [`version`]: kernel release parsing and ordering
//! - [`source`]: where the running release and loaded modules come from
//! - [`gate`]: the policy check itself

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod gate;
pub mod source;
pub mod version;

pub use gate::{GateOutcome, KernelPolicy, check};
pub use source::{KernelInfo, ProcKernelInfo};
pub use version::{KernelVersion, KernelVersionError};
