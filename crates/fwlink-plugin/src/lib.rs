//! Device lifecycle and firmware update orchestration
//!
//! A plugin reacts to bus add/change/remove notifications, registers the
//! controllers that answer, and writes firmware to them on request:
//!
//! - [`registry`]: the devices registered with the host, and rescans that
//!   add or drop them
//! - [`scheduler`]: debouncing of noisy topology change bursts
//! - [`orchestrator`]: the lock → write → remove-or-defer sequence
//! - [`plugin`]: the lifecycle callbacks
//! - [`display_routing`], [`interconnect`]: the built-in plugins
//! - [`host`]: the single-task event loop
//! - [`config`]: per-plugin settings
//!
//! # Example
//!
//! ```
//! use fwlink_plugin::prelude::*;
//!
//! let config = HostConfig::new();
//! let policies = builtin_kernel_policies(&config);
//! assert_eq!(policies.len(), 2);
//! assert!(policies.iter().all(|(_, p)| p.minimum.is_none()));
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod builtin;
pub mod config;
pub mod display_routing;
pub mod host;
pub mod interconnect;
pub mod orchestrator;
pub mod plugin;
pub mod prelude;
pub mod registry;
pub mod scheduler;

pub use builtin::{BUILTIN_PLUGIN_NAMES, BuiltinDeps, builtin_kernel_policies, builtin_plugins};
pub use config::{HostConfig, PluginConfig};
pub use host::{HostEvent, PluginHost, UpdateReply};
pub use orchestrator::{UpdateOrchestrator, UpdateOutcome, UpdateProgress, UpdateState};
pub use plugin::{Plugin, PluginRule};
pub use registry::{DeviceRegistry, RegisteredHook, RegistryEvent, RescanOutcome};
pub use scheduler::{DEFAULT_RESCAN_DELAY, MAX_RESCAN_DELAY, RescanScheduler};
