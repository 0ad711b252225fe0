//! The set of devices a plugin has registered with the host.
//!
//! Membership only changes through [`DeviceRegistry::add`] and
//! [`DeviceRegistry::remove`]. Rescans that find no hardware are an
//! expected transient state: they are logged at debug level and turn into
//! a removal, never into an error.

use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, trace, warn};

use fwlink_device::{Device, DeviceFlags, DeviceLocker, DeviceSnapshot};
use fwlink_errors::{DeviceError, DeviceResult};

/// Capacity of the membership event channel.
const EVENT_CAPACITY: usize = 64;

/// Called once for each device as it becomes registered.
pub type RegisteredHook = Box<dyn Fn(&Device) + Send + Sync>;

/// Membership change published to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A device was registered; the snapshot is taken after hooks ran
    Registered(DeviceSnapshot),
    /// A device was unregistered
    Unregistered {
        /// Registry key of the removed device
        logical_id: String,
    },
}

/// What a rescan did to registry membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescanOutcome {
    /// Hardware answered and the device was newly registered
    Added,
    /// Hardware answered and the device was already registered
    Retained,
    /// No hardware answered and the registered device was removed
    Removed,
    /// No hardware answered and the device was never registered
    Absent,
    /// The device could not be locked, nothing was touched
    Skipped,
}

/// Ordered set of registered devices owned by one plugin.
pub struct DeviceRegistry {
    devices: Vec<Arc<Device>>,
    events: broadcast::Sender<RegistryEvent>,
    registered_hook: Option<RegisteredHook>,
}

impl DeviceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            devices: Vec::new(),
            events,
            registered_hook: None,
        }
    }

    /// Install the hook run on every newly registered device.
    pub fn with_registered_hook(mut self, hook: RegisteredHook) -> Self {
        self.registered_hook = Some(hook);
        self
    }

    /// Subscribe to membership changes.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Register `device`.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::Duplicate`] if the logical id is already registered
    /// - [`DeviceError::NotProbed`] if the device was never probed
    pub fn add(&mut self, device: Arc<Device>) -> DeviceResult {
        if self.contains(device.logical_id()) {
            return Err(DeviceError::Duplicate(device.logical_id().to_string()));
        }
        if !device.is_probed() {
            return Err(DeviceError::NotProbed(device.logical_id().to_string()));
        }

        device.add_flag(DeviceFlags::REGISTERED);
        if let Some(hook) = &self.registered_hook {
            hook(&device);
        }
        let version = device.version();
        info!(
            logical_id = device.logical_id(),
            version = version.as_deref().unwrap_or("unknown"),
            "registered device"
        );
        self.publish(RegistryEvent::Registered(device.snapshot()));
        self.devices.push(device);
        Ok(())
    }

    /// Unregister the device with `logical_id`. Absent ids are ignored.
    pub fn remove(&mut self, logical_id: &str) -> Option<Arc<Device>> {
        let index = self
            .devices
            .iter()
            .position(|d| d.logical_id() == logical_id)?;
        let device = self.devices.remove(index);
        device.remove_flag(DeviceFlags::REGISTERED);
        info!(logical_id, "unregistered device");
        self.publish(RegistryEvent::Unregistered {
            logical_id: logical_id.to_string(),
        });
        Some(device)
    }

    /// Whether `logical_id` is registered.
    pub fn contains(&self, logical_id: &str) -> bool {
        self.devices.iter().any(|d| d.logical_id() == logical_id)
    }

    /// Look up a registered device.
    pub fn get(&self, logical_id: &str) -> Option<&Arc<Device>> {
        self.devices.iter().find(|d| d.logical_id() == logical_id)
    }

    /// Registered devices in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.iter()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Unregister everything, in registration order.
    pub fn clear(&mut self) {
        let ids: Vec<String> = self
            .devices
            .iter()
            .map(|d| d.logical_id().to_string())
            .collect();
        for id in ids {
            self.remove(&id);
        }
    }

    /// Lock `device` and rescan it. A device that cannot be locked is
    /// left untouched.
    #[instrument(skip_all, fields(logical_id = device.logical_id()))]
    pub async fn rescan_device(&mut self, device: &Arc<Device>) -> RescanOutcome {
        let locker = match DeviceLocker::acquire(device).await {
            Ok(locker) => locker,
            Err(e) => {
                debug!("failed to open device {}: {e}", device.logical_id());
                return RescanOutcome::Skipped;
            }
        };
        self.rescan_with_lock(&locker).await
    }

    /// Rescan a device the caller already holds locked.
    ///
    /// Success registers the device if it was not registered yet. Failure
    /// unregisters it if it was; only errors other than absent hardware
    /// are logged above debug level.
    pub async fn rescan_with_lock(&mut self, locker: &DeviceLocker) -> RescanOutcome {
        let device = locker.device();
        if let Err(e) = locker.rescan().await {
            if e.is_device_absent() {
                debug!("no device found on {}: {e}", device.logical_id());
            } else {
                warn!(logical_id = device.logical_id(), error = %e, "rescan failed, dropping device");
            }
            return match self.remove(device.logical_id()) {
                Some(_) => RescanOutcome::Removed,
                None => RescanOutcome::Absent,
            };
        }

        if self.contains(device.logical_id()) {
            return RescanOutcome::Retained;
        }
        match self.add(Arc::clone(device)) {
            Ok(()) => RescanOutcome::Added,
            Err(e) => {
                warn!(logical_id = device.logical_id(), error = %e, "failed to register device");
                RescanOutcome::Skipped
            }
        }
    }

    /// Rescan one registered device.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] if `logical_id` is not registered. Absent
    /// hardware is reported through the outcome, not as an error.
    pub async fn rescan_one(&mut self, logical_id: &str) -> DeviceResult<RescanOutcome> {
        let device = self
            .get(logical_id)
            .cloned()
            .ok_or_else(|| DeviceError::not_found(logical_id))?;
        Ok(self.rescan_device(&device).await)
    }

    /// Rescan every registered device in registration order. Each outcome
    /// is independent of the others.
    pub async fn rescan_all(&mut self) -> Vec<(String, RescanOutcome)> {
        let devices: Vec<Arc<Device>> = self.devices.clone();
        self.rescan_each(&devices).await
    }

    /// Rescan `devices` in order, registered or not.
    pub async fn rescan_each(&mut self, devices: &[Arc<Device>]) -> Vec<(String, RescanOutcome)> {
        let mut outcomes = Vec::with_capacity(devices.len());
        for device in devices {
            let outcome = self.rescan_device(device).await;
            outcomes.push((device.logical_id().to_string(), outcome));
        }
        outcomes
    }

    fn publish(&self, event: RegistryEvent) {
        if self.events.send(event).is_err() {
            trace!("no registry subscribers");
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.devices)
            .field("registered_hook", &self.registered_hook.is_some())
            .finish_non_exhaustive()
    }
}
