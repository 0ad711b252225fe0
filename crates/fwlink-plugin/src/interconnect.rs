//! High-speed peripheral interconnect controllers.
//!
//! Controllers on the `thunderbolt` subsystem are registered as soon as
//! they probe. With `DelayedActivation` the operating system finishes the
//! update later, so registered controllers are flagged to stay usable and
//! skip the post-update restart.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use fwlink_device::{
    BusDevice, Device, DeviceFamily, DeviceFlags, DeviceHandleFactory, DeviceLocker,
    InstallFlags, InternalFlags,
};
use fwlink_errors::FwlinkError;
use fwlink_kernel::{KernelInfo, KernelPolicy};

use crate::config::PluginConfig;
use crate::orchestrator::{UpdateOrchestrator, UpdateOutcome};
use crate::plugin::{Plugin, PluginRule};
use crate::registry::{DeviceRegistry, RegisteredHook};

/// Plugin name and configuration section.
pub const NAME: &str = "interconnect";
/// Subsystem the controllers live on.
pub const SUBSYSTEM: &str = "thunderbolt";

const SUBSYSTEMS: &[&str] = &[SUBSYSTEM];
const WAKEUP_REASON: &str = "requires device wakeup";

/// Registration hook applying deferred activation to this plugin's devices.
pub fn delayed_activation_hook(enabled: bool) -> RegisteredHook {
    Box::new(move |device: &Device| {
        if device.plugin() != NAME || !enabled {
            return;
        }
        if device.has_flag(DeviceFlags::USABLE_DURING_UPDATE) {
            return;
        }
        let name = device
            .name()
            .unwrap_or_else(|| device.logical_id().to_string());
        debug!("turning on delayed activation for {name}");
        device.add_flag(DeviceFlags::USABLE_DURING_UPDATE | DeviceFlags::SKIPS_RESTART);
        device.remove_internal_flag(InternalFlags::REPLUG_MATCH_GUID);
    })
}

/// Plugin for interconnect controllers.
pub struct InterconnectPlugin {
    config: PluginConfig,
    kernel: Arc<dyn KernelInfo>,
    factory: Arc<dyn DeviceHandleFactory>,
    registry: DeviceRegistry,
    orchestrator: UpdateOrchestrator,
    rules: Vec<PluginRule>,
}

impl InterconnectPlugin {
    /// Create the plugin.
    pub fn new(
        config: PluginConfig,
        kernel: Arc<dyn KernelInfo>,
        factory: Arc<dyn DeviceHandleFactory>,
    ) -> Self {
        let registry =
            DeviceRegistry::new().with_registered_hook(delayed_activation_hook(config.delayed_activation));
        Self {
            config,
            kernel,
            factory,
            registry,
            orchestrator: UpdateOrchestrator::new(),
            rules: Vec::new(),
        }
    }

    /// Kernel policy derived from `config`; applies whenever a minimum is set.
    pub fn kernel_policy(config: &PluginConfig) -> KernelPolicy {
        KernelPolicy::unconditional(config.minimum_kernel_version.clone())
    }

    /// Update state transitions.
    pub fn orchestrator(&self) -> &UpdateOrchestrator {
        &self.orchestrator
    }

    fn add_rule(&mut self, rule: PluginRule) {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
    }
}

#[async_trait]
impl Plugin for InterconnectPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn subsystems(&self) -> &[&'static str] {
        SUBSYSTEMS
    }

    fn rules(&self) -> &[PluginRule] {
        &self.rules
    }

    fn startup(&mut self) -> Result<(), FwlinkError> {
        let outcome = fwlink_kernel::check(&Self::kernel_policy(&self.config), self.kernel.as_ref())?;
        debug!(?outcome, "{NAME} kernel check passed");
        Ok(())
    }

    async fn device_added(&mut self, bus: &BusDevice) -> Result<(), FwlinkError> {
        if bus.subsystem != SUBSYSTEM {
            return Ok(());
        }
        if self.registry.contains(&bus.logical_id) {
            debug!(logical_id = %bus.logical_id, "controller already registered");
            return Ok(());
        }

        let handle = self.factory.create(bus)?;
        let device = Arc::new(Device::new(
            bus.logical_id.clone(),
            DeviceFamily::Interconnect,
            NAME,
            handle,
        ));
        self.add_rule(PluginRule::InhibitsIdle(format!("{SUBSYSTEM} {WAKEUP_REASON}")));

        let locker = DeviceLocker::acquire(&device).await?;
        self.registry.add(Arc::clone(&device))?;
        drop(locker);
        Ok(())
    }

    async fn device_changed(&mut self, bus: &BusDevice) -> Result<(), FwlinkError> {
        if bus.subsystem != SUBSYSTEM || !self.registry.contains(&bus.logical_id) {
            return Ok(());
        }
        let outcome = self.registry.rescan_one(&bus.logical_id).await?;
        debug!(logical_id = %bus.logical_id, ?outcome, "controller changed");
        Ok(())
    }

    async fn device_removed(&mut self, bus: &BusDevice) -> Result<(), FwlinkError> {
        if bus.subsystem == SUBSYSTEM {
            self.registry.remove(&bus.logical_id);
        }
        Ok(())
    }

    async fn update(
        &mut self,
        logical_id: &str,
        firmware: &[u8],
        flags: InstallFlags,
    ) -> Result<UpdateOutcome, FwlinkError> {
        Ok(self
            .orchestrator
            .update_registered(&mut self.registry, logical_id, firmware, flags)
            .await?)
    }

    fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    fn shutdown(&mut self) {
        self.registry.clear();
    }
}

impl fmt::Debug for InterconnectPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterconnectPlugin")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}
