//! Multi-stream display routing hubs.
//!
//! Hubs are reached through DisplayPort aux channel nodes. Every aux node
//! seen on the bus is tracked, even when nothing is plugged in downstream,
//! and only the ones whose hardware answers a rescan are registered.
//! Display topology changes trigger a single debounced rescan of every
//! tracked node once the burst of `drm` change events has settled.
//!
//! Some GPU kernel drivers hang when the aux channel is used concurrently,
//! so startup can be gated on a minimum kernel while `amdgpu` is loaded.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

use fwlink_device::{
    BusDevice, Device, DeviceFamily, DeviceHandleFactory, DeviceLocker, InstallFlags,
};
use fwlink_errors::FwlinkError;
use fwlink_kernel::{KernelInfo, KernelPolicy};

use crate::config::PluginConfig;
use crate::orchestrator::{UpdateOrchestrator, UpdateOutcome};
use crate::plugin::Plugin;
use crate::registry::{DeviceRegistry, RescanOutcome};
use crate::scheduler::RescanScheduler;

/// Plugin name and configuration section.
pub const NAME: &str = "display_routing";
/// Display topology subsystem, only used for change notifications.
pub const SUBSYSTEM_DRM: &str = "drm";
/// Aux channel subsystem the hubs are discovered on.
pub const SUBSYSTEM_AUX: &str = "drm_dp_aux_dev";
/// GPU driver whose presence makes the kernel check mandatory.
pub const GPU_MODULE: &str = "amdgpu";

const SUBSYSTEMS: &[&str] = &[SUBSYSTEM_DRM, SUBSYSTEM_AUX];

/// Plugin for display routing hubs.
pub struct DisplayRoutingPlugin {
    config: PluginConfig,
    kernel: Arc<dyn KernelInfo>,
    factory: Arc<dyn DeviceHandleFactory>,
    tracked: Vec<Arc<Device>>,
    registry: DeviceRegistry,
    scheduler: RescanScheduler,
    orchestrator: UpdateOrchestrator,
}

impl DisplayRoutingPlugin {
    /// Create the plugin. Nothing touches hardware until [`Plugin::startup`].
    pub fn new(
        config: PluginConfig,
        kernel: Arc<dyn KernelInfo>,
        factory: Arc<dyn DeviceHandleFactory>,
    ) -> Self {
        let scheduler = RescanScheduler::new(config.rescan_delay());
        Self {
            config,
            kernel,
            factory,
            tracked: Vec::new(),
            registry: DeviceRegistry::new(),
            scheduler,
            orchestrator: UpdateOrchestrator::new(),
        }
    }

    /// Kernel policy derived from `config`.
    pub fn kernel_policy(config: &PluginConfig) -> KernelPolicy {
        KernelPolicy::when_loaded(GPU_MODULE, config.minimum_amdgpu_kernel_version.clone())
    }

    /// Every aux node seen so far, registered or not, in discovery order.
    pub fn tracked(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.tracked.iter()
    }

    /// Pending debounce state.
    pub fn scheduler(&self) -> &RescanScheduler {
        &self.scheduler
    }

    /// Update state transitions.
    pub fn orchestrator(&self) -> &UpdateOrchestrator {
        &self.orchestrator
    }

    /// Rescan every tracked node now.
    pub async fn rescan_tracked(&mut self) -> Vec<(String, RescanOutcome)> {
        let tracked = self.tracked.clone();
        self.registry.rescan_each(&tracked).await
    }

    fn is_tracked(&self, logical_id: &str) -> bool {
        self.tracked.iter().any(|d| d.logical_id() == logical_id)
    }
}

#[async_trait]
impl Plugin for DisplayRoutingPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn subsystems(&self) -> &[&'static str] {
        SUBSYSTEMS
    }

    fn startup(&mut self) -> Result<(), FwlinkError> {
        let outcome = fwlink_kernel::check(&Self::kernel_policy(&self.config), self.kernel.as_ref())?;
        debug!(?outcome, "{NAME} kernel check passed");
        Ok(())
    }

    async fn device_added(&mut self, bus: &BusDevice) -> Result<(), FwlinkError> {
        if bus.subsystem != SUBSYSTEM_AUX {
            return Ok(());
        }
        if self.is_tracked(&bus.logical_id) {
            debug!(logical_id = %bus.logical_id, "aux node already tracked");
            return Ok(());
        }

        let handle = self.factory.create(bus)?;
        let device = Arc::new(Device::new(
            bus.logical_id.clone(),
            DeviceFamily::DisplayRouting,
            NAME,
            handle,
        ));
        let locker = DeviceLocker::acquire(&device).await?;

        // fails when nothing is connected downstream
        let outcome = self.registry.rescan_with_lock(&locker).await;
        drop(locker);
        debug!(logical_id = %bus.logical_id, ?outcome, "tracking aux node");

        self.tracked.push(device);
        Ok(())
    }

    async fn device_changed(&mut self, bus: &BusDevice) -> Result<(), FwlinkError> {
        if bus.subsystem != SUBSYSTEM_DRM {
            return Ok(());
        }
        self.scheduler.notify_changed();
        debug!(
            delay_secs = self.scheduler.delay().as_secs(),
            generation = self.scheduler.generation(),
            "topology changed, rescan scheduled"
        );
        Ok(())
    }

    async fn device_removed(&mut self, bus: &BusDevice) -> Result<(), FwlinkError> {
        if bus.subsystem != SUBSYSTEM_AUX {
            return Ok(());
        }
        self.tracked.retain(|d| d.logical_id() != bus.logical_id);
        self.registry.remove(&bus.logical_id);
        Ok(())
    }

    fn rescan_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    async fn rescan_due(&mut self, now: Instant) {
        if !self.scheduler.take_due(now) {
            return;
        }
        let outcomes = self.rescan_tracked().await;
        info!(
            tracked = outcomes.len(),
            registered = self.registry.len(),
            "rescanned aux nodes after topology change"
        );
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
        if self.scheduler.cancel() {
            debug!("cancelled pending rescan");
        }
        self.registry.clear();
        self.tracked.clear();
    }
}

impl fmt::Debug for DisplayRoutingPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayRoutingPlugin")
            .field("config", &self.config)
            .field("tracked", &self.tracked.len())
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
