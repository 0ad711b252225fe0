//! Bus notifications.

use fwlink_errors::DeviceResult;
use serde::{Deserialize, Serialize};

use crate::handle::DeviceHandle;

/// A device node as reported by the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusDevice {
    /// Subsystem the node belongs to, e.g. `drm_dp_aux_dev`
    pub subsystem: String,
    /// Stable name of the node's position on the bus
    pub logical_id: String,
    /// Sysfs path of the node
    pub sysfs_path: String,
}

impl BusDevice {
    /// Create a bus device record.
    pub fn new(
        subsystem: impl Into<String>,
        logical_id: impl Into<String>,
        sysfs_path: impl Into<String>,
    ) -> Self {
        Self {
            subsystem: subsystem.into(),
            logical_id: logical_id.into(),
            sysfs_path: sysfs_path.into(),
        }
    }
}

/// An asynchronous bus notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// A node appeared
    Added(BusDevice),
    /// A node changed state
    Changed(BusDevice),
    /// A node went away
    Removed(BusDevice),
}

impl BusEvent {
    /// The node the event is about.
    pub fn device(&self) -> &BusDevice {
        match self {
            BusEvent::Added(device) | BusEvent::Changed(device) | BusEvent::Removed(device) => {
                device
            }
        }
    }
}

/// Builds the family-specific handle for a newly seen bus node.
pub trait DeviceHandleFactory: Send + Sync {
    /// Create a handle for `bus`.
    fn create(&self, bus: &BusDevice) -> DeviceResult<Box<dyn DeviceHandle>>;
}
