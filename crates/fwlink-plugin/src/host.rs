//! The single-task event loop that drives every plugin.
//!
//! Bus notifications, debounced rescans and update requests are handled one
//! at a time, so no two plugin callbacks ever run concurrently and a
//! firmware write is never interleaved with a rescan of the same device.

use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use fwlink_device::{BusEvent, InstallFlags};
use fwlink_errors::{DeviceError, ErrorSeverity, FwlinkError};

use crate::orchestrator::UpdateOutcome;
use crate::plugin::Plugin;

/// Reply channel for an update request.
pub type UpdateReply = oneshot::Sender<Result<UpdateOutcome, FwlinkError>>;

/// Input to [`PluginHost::run`].
pub enum HostEvent {
    /// A bus notification
    Bus(BusEvent),
    /// Write firmware to a registered device
    Update {
        /// Target device
        logical_id: String,
        /// Image bytes
        firmware: Vec<u8>,
        /// Install flags
        flags: InstallFlags,
        /// Where the result is sent
        reply: UpdateReply,
    },
    /// Stop the loop and tear every plugin down
    Shutdown,
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::Bus(event) => f.debug_tuple("Bus").field(event).finish(),
            HostEvent::Update {
                logical_id,
                firmware,
                flags,
                ..
            } => f
                .debug_struct("Update")
                .field("logical_id", logical_id)
                .field("size", &firmware.len())
                .field("flags", flags)
                .finish_non_exhaustive(),
            HostEvent::Shutdown => write!(f, "Shutdown"),
        }
    }
}

struct Slot {
    plugin: Box<dyn Plugin>,
    enabled: bool,
}

/// Owns the plugins and dispatches events to them.
#[derive(Default)]
pub struct PluginHost {
    slots: Vec<Slot>,
}

impl PluginHost {
    /// Host with no plugins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. It stays inert until [`Self::startup`] accepts it.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.slots.push(Slot {
            plugin,
            enabled: false,
        });
    }

    /// Builder form of [`Self::register`].
    pub fn with_plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.register(plugin);
        self
    }

    /// Run every plugin's startup checks. Plugins that fail stay inert;
    /// their errors are returned by name.
    pub fn startup(&mut self) -> Vec<(String, FwlinkError)> {
        let mut refused = Vec::new();
        for slot in &mut self.slots {
            match slot.plugin.startup() {
                Ok(()) => {
                    slot.enabled = true;
                    info!(plugin = slot.plugin.name(), "plugin started");
                }
                Err(e) => {
                    slot.enabled = false;
                    warn!(plugin = slot.plugin.name(), error = %e, "plugin refused to start");
                    refused.push((slot.plugin.name().to_string(), e));
                }
            }
        }
        refused
    }

    /// Look up a plugin by name.
    pub fn plugin(&self, name: &str) -> Option<&dyn Plugin> {
        self.slots
            .iter()
            .find(|s| s.plugin.name() == name)
            .map(|s| s.plugin.as_ref())
    }

    /// Whether `name` passed startup.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.slots
            .iter()
            .any(|s| s.enabled && s.plugin.name() == name)
    }

    /// Every plugin, enabled or not.
    pub fn plugins(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.slots.iter().map(|s| s.plugin.as_ref())
    }

    /// Deliver a bus event to every enabled plugin subscribed to its subsystem.
    pub async fn dispatch(&mut self, event: &BusEvent) {
        let bus = event.device();
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            if !slot.plugin.handles(&bus.subsystem) {
                continue;
            }
            let (kind, result) = match event {
                BusEvent::Added(bus) => ("add", slot.plugin.device_added(bus).await),
                BusEvent::Changed(bus) => ("change", slot.plugin.device_changed(bus).await),
                BusEvent::Removed(bus) => ("remove", slot.plugin.device_removed(bus).await),
            };
            let Err(e) = result else { continue };
            let plugin = slot.plugin.name();
            let category = e.category();
            if e.severity() < ErrorSeverity::Error {
                debug!(plugin, %category, logical_id = %bus.logical_id, "failed to handle {kind}: {e}");
            } else if e.is_recoverable() {
                warn!(plugin, %category, logical_id = %bus.logical_id, "failed to handle {kind}: {e}");
            } else {
                error!(plugin, %category, logical_id = %bus.logical_id, "failed to handle {kind}: {e}");
            }
        }
    }

    /// Earliest pending rescan across enabled plugins.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .filter(|s| s.enabled)
            .filter_map(|s| s.plugin.rescan_deadline())
            .min()
    }

    /// Run every rescan whose deadline is at or before `now`.
    pub async fn fire_due(&mut self, now: Instant) {
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            if slot.plugin.rescan_deadline().is_some_and(|d| d <= now) {
                slot.plugin.rescan_due(now).await;
            }
        }
    }

    /// Route an update to the plugin that registered `logical_id`.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] if no enabled plugin has it registered,
    /// otherwise the plugin's update error.
    pub async fn update(
        &mut self,
        logical_id: &str,
        firmware: &[u8],
        flags: InstallFlags,
    ) -> Result<UpdateOutcome, FwlinkError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.enabled && s.plugin.registry().contains(logical_id))
            .ok_or_else(|| DeviceError::not_found(logical_id))?;
        slot.plugin.update(logical_id, firmware, flags).await
    }

    /// Tear every plugin down.
    pub fn shutdown(&mut self) {
        for slot in &mut self.slots {
            slot.plugin.shutdown();
            slot.enabled = false;
        }
    }

    /// Process events until [`HostEvent::Shutdown`] or the sender is dropped,
    /// firing debounced rescans as their deadlines pass.
    pub async fn run(&mut self, mut events: mpsc::Receiver<HostEvent>) {
        info!(plugins = self.slots.len(), "plugin host running");
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(HostEvent::Bus(event)) => self.dispatch(&event).await,
                    Some(HostEvent::Update { logical_id, firmware, flags, reply }) => {
                        let result = self.update(&logical_id, &firmware, flags).await;
                        if reply.send(result).is_err() {
                            debug!(%logical_id, "update requester went away");
                        }
                    }
                    Some(HostEvent::Shutdown) | None => break,
                },
                () = sleep_until(deadline) => self.fire_due(Instant::now()).await,
            }
        }
        self.shutdown();
        info!("plugin host stopped");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for slot in &self.slots {
            list.entry(&(slot.plugin.name(), slot.enabled));
        }
        list.finish()
    }
}
