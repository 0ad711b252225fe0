//! Convenience re-exports for plugin hosts

pub use crate::builtin::{BuiltinDeps, builtin_kernel_policies, builtin_plugins};
pub use crate::config::{HostConfig, PluginConfig};
pub use crate::display_routing::DisplayRoutingPlugin;
pub use crate::host::{HostEvent, PluginHost};
pub use crate::interconnect::InterconnectPlugin;
pub use crate::orchestrator::{UpdateOrchestrator, UpdateOutcome, UpdateProgress, UpdateState};
pub use crate::plugin::{Plugin, PluginRule};
pub use crate::registry::{DeviceRegistry, RegistryEvent, RescanOutcome};
pub use crate::scheduler::RescanScheduler;
