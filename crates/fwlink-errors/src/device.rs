//! Device lifecycle error types.
//!
//! This module provides the errors raised while opening, probing,
//! rescanning, registering and writing firmware to a single controller.

use crate::common::ErrorSeverity;
use crate::firmware::FirmwareFault;

/// Errors raised by operations on one device.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    /// The device could not be opened: already locked, gone, or permission denied
    #[error("Failed to open device {device}: {reason}")]
    Access {
        /// Logical identifier
        device: String,
        /// Failure reason
        reason: String,
    },

    /// Static probe of the device failed
    #[error("Failed to probe device {device}: {reason}")]
    Probe {
        /// Logical identifier
        device: String,
        /// Failure reason
        reason: String,
    },

    /// No hardware responded during rescan
    #[error("No device found on {device}: {reason}")]
    Rescan {
        /// Logical identifier
        device: String,
        /// Failure reason
        reason: String,
    },

    /// Firmware write failed; the cause is preserved as the error source
    #[error("Failed to write firmware to {device}")]
    Write {
        /// Logical identifier
        device: String,
        /// Underlying cause reported by the device family
        #[source]
        cause: FirmwareFault,
    },

    /// A device with the same logical identifier is already registered
    #[error("Device {0} is already registered")]
    Duplicate(String),

    /// The device was never successfully probed
    #[error("Device {0} has not been probed")]
    NotProbed(String),

    /// No device with this logical identifier is known
    #[error("Device not found: {0}")]
    NotFound(String),
}

impl DeviceError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DeviceError::Access { .. } => ErrorSeverity::Warning,
            DeviceError::Probe { .. } | DeviceError::Rescan { .. } => ErrorSeverity::Info,
            DeviceError::Write { cause, .. } => cause.severity(),
            DeviceError::Duplicate(_) => ErrorSeverity::Error,
            DeviceError::NotProbed(_) => ErrorSeverity::Error,
            DeviceError::NotFound(_) => ErrorSeverity::Error,
        }
    }

    /// Check if this error means no hardware is present or responding.
    ///
    /// Such errors are an expected transient state and are logged rather
    /// than surfaced to the user.
    pub fn is_device_absent(&self) -> bool {
        matches!(self, DeviceError::Probe { .. } | DeviceError::Rescan { .. })
    }

    /// Check if the device was left untouched and the plugin can carry on.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DeviceError::Write { .. })
    }

    /// Create an access error.
    pub fn access(device: impl Into<String>, reason: impl Into<String>) -> Self {
        DeviceError::Access {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a probe error.
    pub fn probe(device: impl Into<String>, reason: impl Into<String>) -> Self {
        DeviceError::Probe {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a rescan error.
    pub fn rescan(device: impl Into<String>, reason: impl Into<String>) -> Self {
        DeviceError::Rescan {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a write error wrapping the device family's cause.
    pub fn write(device: impl Into<String>, cause: FirmwareFault) -> Self {
        DeviceError::Write {
            device: device.into(),
            cause,
        }
    }

    /// Create a not found error.
    pub fn not_found(device: impl Into<String>) -> Self {
        DeviceError::NotFound(device.into())
    }
}
