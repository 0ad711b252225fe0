//! Device identity, versioning and capability state.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use fwlink_errors::{DeviceError, DeviceResult};

use crate::flags::{DeviceFlags, InternalFlags};
use crate::guid::instance_id_to_guid;
use crate::handle::DeviceHandle;
use crate::version::VersionFormat;

/// Controller family, used to pick the plugin and handle implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    /// Multi-stream display routing hub reached over a DisplayPort aux channel
    DisplayRouting,
    /// High-speed peripheral interconnect controller
    Interconnect,
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFamily::DisplayRouting => write!(f, "display-routing"),
            DeviceFamily::Interconnect => write!(f, "interconnect"),
        }
    }
}

/// Identity and version data reported by a probe or rescan.
///
/// `None` fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDetails {
    /// Human-readable name
    pub name: Option<String>,
    /// Vendor string
    pub vendor: Option<String>,
    /// Instance id the GUID is derived from
    pub instance_id: Option<String>,
    /// Current firmware version
    pub version: Option<String>,
    /// Lowest version the device may be downgraded to
    pub version_lowest: Option<String>,
    /// Layout of the version strings
    pub version_format: Option<VersionFormat>,
    /// Capability flags to add
    pub flags: DeviceFlags,
}

impl DeviceDetails {
    /// Empty details.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the vendor.
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    /// Set the instance id.
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Set the current version and its format.
    pub fn with_version(mut self, version: impl Into<String>, format: VersionFormat) -> Self {
        self.version = Some(version.into());
        self.version_format = Some(format);
        self
    }

    /// Set the lowest allowed version.
    pub fn with_version_lowest(mut self, version: impl Into<String>) -> Self {
        self.version_lowest = Some(version.into());
        self
    }

    /// Add capability flags.
    pub fn with_flags(mut self, flags: DeviceFlags) -> Self {
        self.flags |= flags;
        self
    }
}

/// Point-in-time copy of a device's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    /// Registry key
    pub logical_id: String,
    /// Controller family
    pub family: DeviceFamily,
    /// Owning plugin
    pub plugin: String,
    /// Human-readable name
    pub name: Option<String>,
    /// Vendor string
    pub vendor: Option<String>,
    /// Derived GUID
    pub guid: Option<Uuid>,
    /// Current firmware version
    pub version: Option<String>,
    /// Lowest allowed version
    pub version_lowest: Option<String>,
    /// Version layout
    pub version_format: VersionFormat,
    /// Capability flags
    pub flags: DeviceFlags,
    /// Whether a lock is currently held
    pub locked: bool,
}

#[derive(Debug, Default)]
struct DeviceState {
    name: Option<String>,
    vendor: Option<String>,
    instance_id: Option<String>,
    guid: Option<Uuid>,
    version: Option<String>,
    version_lowest: Option<String>,
    version_format: VersionFormat,
    flags: DeviceFlags,
    internal_flags: InternalFlags,
    probed: bool,
}

/// One physical controller known to a plugin.
///
/// Shared as `Arc<Device>` between the plugin's tracked list, the registry
/// and any in-flight operation. State is behind interior locks so the
/// hardware handle can be driven through `&self`.
pub struct Device {
    logical_id: String,
    family: DeviceFamily,
    plugin: String,
    handle: Box<dyn DeviceHandle>,
    state: RwLock<DeviceState>,
    locked: AtomicBool,
}

impl Device {
    /// Create a device that has not been probed yet.
    pub fn new(
        logical_id: impl Into<String>,
        family: DeviceFamily,
        plugin: impl Into<String>,
        handle: Box<dyn DeviceHandle>,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            family,
            plugin: plugin.into(),
            handle,
            state: RwLock::new(DeviceState {
                internal_flags: InternalFlags::REPLUG_MATCH_GUID,
                ..DeviceState::default()
            }),
            locked: AtomicBool::new(false),
        }
    }

    /// Registry key.
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Controller family.
    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    /// Name of the plugin that created the device.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Human-readable name.
    pub fn name(&self) -> Option<String> {
        self.state.read().name.clone()
    }

    /// Vendor string.
    pub fn vendor(&self) -> Option<String> {
        self.state.read().vendor.clone()
    }

    /// Instance id the GUID was derived from.
    pub fn instance_id(&self) -> Option<String> {
        self.state.read().instance_id.clone()
    }

    /// Derived GUID.
    pub fn guid(&self) -> Option<Uuid> {
        self.state.read().guid
    }

    /// Current firmware version.
    pub fn version(&self) -> Option<String> {
        self.state.read().version.clone()
    }

    /// Lowest allowed firmware version.
    pub fn version_lowest(&self) -> Option<String> {
        self.state.read().version_lowest.clone()
    }

    /// Version layout tag.
    pub fn version_format(&self) -> VersionFormat {
        self.state.read().version_format
    }

    /// Capability flags.
    pub fn flags(&self) -> DeviceFlags {
        self.state.read().flags
    }

    /// Check a capability flag.
    pub fn has_flag(&self, flag: DeviceFlags) -> bool {
        self.state.read().flags.contains(flag)
    }

    /// Set a capability flag.
    pub fn add_flag(&self, flag: DeviceFlags) {
        self.state.write().flags.insert(flag);
    }

    /// Clear a capability flag.
    pub fn remove_flag(&self, flag: DeviceFlags) {
        self.state.write().flags.remove(flag);
    }

    /// Internal flags.
    pub fn internal_flags(&self) -> InternalFlags {
        self.state.read().internal_flags
    }

    /// Check an internal flag.
    pub fn has_internal_flag(&self, flag: InternalFlags) -> bool {
        self.state.read().internal_flags.contains(flag)
    }

    /// Set an internal flag.
    pub fn add_internal_flag(&self, flag: InternalFlags) {
        self.state.write().internal_flags.insert(flag);
    }

    /// Clear an internal flag.
    pub fn remove_internal_flag(&self, flag: InternalFlags) {
        self.state.write().internal_flags.remove(flag);
    }

    /// Whether a probe has succeeded at least once.
    pub fn is_probed(&self) -> bool {
        self.state.read().probed
    }

    /// Whether a [`crate::DeviceLocker`] currently holds the device.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Copy the current state.
    pub fn snapshot(&self) -> DeviceSnapshot {
        let state = self.state.read();
        DeviceSnapshot {
            logical_id: self.logical_id.clone(),
            family: self.family,
            plugin: self.plugin.clone(),
            name: state.name.clone(),
            vendor: state.vendor.clone(),
            guid: state.guid,
            version: state.version.clone(),
            version_lowest: state.version_lowest.clone(),
            version_format: state.version_format,
            flags: state.flags,
            locked: self.is_locked(),
        }
    }

    pub(crate) fn handle(&self) -> &dyn DeviceHandle {
        self.handle.as_ref()
    }

    pub(crate) fn try_lock(&self) -> DeviceResult {
        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DeviceError::access(
                &self.logical_id,
                "device is already locked",
            ));
        }
        Ok(())
    }

    pub(crate) fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub(crate) fn mark_probed(&self) {
        self.state.write().probed = true;
    }

    /// Merge reported details. Registration is owned by the registry and
    /// is never taken from hardware reports.
    pub(crate) fn apply_details(&self, details: DeviceDetails) {
        let mut state = self.state.write();
        if let Some(name) = details.name {
            state.name = Some(name);
        }
        if let Some(vendor) = details.vendor {
            state.vendor = Some(vendor);
        }
        if let Some(instance_id) = details.instance_id {
            state.guid = Some(instance_id_to_guid(&instance_id));
            state.instance_id = Some(instance_id);
        }
        if let Some(version) = details.version {
            state.version = Some(version);
        }
        if let Some(version_lowest) = details.version_lowest {
            state.version_lowest = Some(version_lowest);
        }
        if let Some(format) = details.version_format {
            state.version_format = format;
        }
        state.flags |= details.flags - DeviceFlags::REGISTERED;
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("logical_id", &self.logical_id)
            .field("family", &self.family)
            .field("plugin", &self.plugin)
            .field("state", &*self.state.read())
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}
