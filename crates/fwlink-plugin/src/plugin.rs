//! The lifecycle interface every built-in plugin implements.

use async_trait::async_trait;
use std::fmt;
use tokio::time::Instant;

use fwlink_device::{BusDevice, InstallFlags};
use fwlink_errors::FwlinkError;

use crate::orchestrator::UpdateOutcome;
use crate::registry::DeviceRegistry;

/// A constraint a plugin places on the host while it owns devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginRule {
    /// The host must not enter idle shutdown; the reason is shown to users
    InhibitsIdle(String),
}

impl fmt::Display for PluginRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginRule::InhibitsIdle(reason) => write!(f, "inhibits-idle: {reason}"),
        }
    }
}

/// Lifecycle callbacks, all dispatched from the host's single event loop.
#[async_trait]
pub trait Plugin: Send {
    /// Stable plugin name, also the configuration section name.
    fn name(&self) -> &str;

    /// Bus subsystems this plugin wants events for.
    fn subsystems(&self) -> &[&'static str];

    /// Whether events from `subsystem` should be delivered.
    fn handles(&self, subsystem: &str) -> bool {
        self.subsystems().contains(&subsystem)
    }

    /// Rules declared so far.
    fn rules(&self) -> &[PluginRule] {
        &[]
    }

    /// Run safety checks before any bus event is accepted.
    ///
    /// # Errors
    ///
    /// A failed check leaves the plugin inert.
    fn startup(&mut self) -> Result<(), FwlinkError>;

    /// A node appeared on a subscribed subsystem.
    async fn device_added(&mut self, bus: &BusDevice) -> Result<(), FwlinkError>;

    /// A node on a subscribed subsystem changed state.
    async fn device_changed(&mut self, bus: &BusDevice) -> Result<(), FwlinkError>;

    /// A node on a subscribed subsystem went away.
    async fn device_removed(&mut self, bus: &BusDevice) -> Result<(), FwlinkError>;

    /// When the next debounced rescan is due, if any.
    fn rescan_deadline(&self) -> Option<Instant> {
        None
    }

    /// Called by the host once `now` has reached [`Self::rescan_deadline`].
    async fn rescan_due(&mut self, _now: Instant) {}

    /// Write firmware to a registered device.
    ///
    /// # Errors
    ///
    /// Lock, lookup and write failures, with the underlying cause preserved.
    async fn update(
        &mut self,
        logical_id: &str,
        firmware: &[u8],
        flags: InstallFlags,
    ) -> Result<UpdateOutcome, FwlinkError>;

    /// Devices currently registered with the host.
    fn registry(&self) -> &DeviceRegistry;

    /// Cancel pending work and drop every device.
    fn shutdown(&mut self);
}
