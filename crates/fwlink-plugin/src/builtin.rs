//! Statically linked plugins.

use std::fmt;
use std::sync::Arc;

use fwlink_device::DeviceHandleFactory;
use fwlink_kernel::{KernelInfo, KernelPolicy};

use crate::config::HostConfig;
use crate::display_routing::{self, DisplayRoutingPlugin};
use crate::host::PluginHost;
use crate::interconnect::{self, InterconnectPlugin};
use crate::plugin::Plugin;

/// Names of the built-in plugins, in registration order.
pub const BUILTIN_PLUGIN_NAMES: &[&str] = &[display_routing::NAME, interconnect::NAME];

/// What the built-in plugins need from the platform.
#[derive(Clone)]
pub struct BuiltinDeps {
    /// Running kernel and loaded modules
    pub kernel: Arc<dyn KernelInfo>,
    /// Handles for display routing hubs
    pub display_routing: Arc<dyn DeviceHandleFactory>,
    /// Handles for interconnect controllers
    pub interconnect: Arc<dyn DeviceHandleFactory>,
}

impl fmt::Debug for BuiltinDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinDeps").finish_non_exhaustive()
    }
}

/// Construct every built-in plugin with its configuration section.
pub fn builtin_plugins(config: &HostConfig, deps: &BuiltinDeps) -> Vec<Box<dyn Plugin>> {
    let display_routing: Box<dyn Plugin> = Box::new(DisplayRoutingPlugin::new(
        config.plugin(display_routing::NAME),
        Arc::clone(&deps.kernel),
        Arc::clone(&deps.display_routing),
    ));
    let interconnect: Box<dyn Plugin> = Box::new(InterconnectPlugin::new(
        config.plugin(interconnect::NAME),
        Arc::clone(&deps.kernel),
        Arc::clone(&deps.interconnect),
    ));
    vec![display_routing, interconnect]
}

/// Kernel policy of every built-in plugin, without constructing them.
pub fn builtin_kernel_policies(config: &HostConfig) -> Vec<(&'static str, KernelPolicy)> {
    vec![
        (
            display_routing::NAME,
            DisplayRoutingPlugin::kernel_policy(&config.plugin(display_routing::NAME)),
        ),
        (
            interconnect::NAME,
            InterconnectPlugin::kernel_policy(&config.plugin(interconnect::NAME)),
        ),
    ]
}

impl PluginHost {
    /// Host with every built-in plugin registered.
    pub fn builtin(config: &HostConfig, deps: &BuiltinDeps) -> Self {
        builtin_plugins(config, deps)
            .into_iter()
            .fold(Self::new(), PluginHost::with_plugin)
    }
}
