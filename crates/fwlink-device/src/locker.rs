//! Scoped exclusive access to a device.
//!
//! [`DeviceLocker`] is the only way to reach a device's hardware-facing
//! operations. Acquiring it marks the device locked, probes it if it has
//! never been probed, and opens it. The lock is released exactly once,
//! either explicitly through [`DeviceLocker::release`] or when the locker
//! is dropped, which also covers early returns, `?` and cancelled futures.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use fwlink_errors::{DeviceError, DeviceResult};

use crate::device::Device;
use crate::flags::InstallFlags;

/// Exclusive-access handle on one device.
#[derive(Debug)]
#[must_use = "the device is unlocked as soon as the locker is dropped"]
pub struct DeviceLocker {
    device: Arc<Device>,
    opened: bool,
    released: bool,
}

impl DeviceLocker {
    /// Lock, probe if needed, and open `device`.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::Access`] if the device is already locked or cannot be opened
    /// - [`DeviceError::Probe`] if the first probe fails
    #[instrument(skip_all, fields(logical_id = device.logical_id()))]
    pub async fn acquire(device: &Arc<Device>) -> DeviceResult<Self> {
        device.try_lock()?;

        // From here on, dropping `locker` undoes the lock.
        let mut locker = Self {
            device: Arc::clone(device),
            opened: false,
            released: false,
        };

        if !device.is_probed() {
            let details = device.handle().probe().await?;
            device.apply_details(details);
            device.mark_probed();
            debug!("probed device");
        }

        device.handle().open().map_err(|e| match e {
            DeviceError::Access { .. } => e,
            other => DeviceError::access(device.logical_id(), other.to_string()),
        })?;
        locker.opened = true;

        Ok(locker)
    }

    /// The locked device.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Re-query the controller and merge what it reports.
    ///
    /// # Errors
    ///
    /// Whatever the handle reports, typically [`DeviceError::Rescan`] when
    /// no hardware responds.
    #[instrument(skip_all, fields(logical_id = self.device.logical_id()))]
    pub async fn rescan(&self) -> DeviceResult {
        let details = self.device.handle().rescan().await?;
        self.device.apply_details(details);
        Ok(())
    }

    /// Write a firmware image.
    ///
    /// # Errors
    ///
    /// [`DeviceError::Write`] carrying the family's [`fwlink_errors::FirmwareFault`] unchanged.
    #[instrument(skip_all, fields(logical_id = self.device.logical_id(), size = firmware.len()))]
    pub async fn write_firmware(&self, firmware: &[u8], flags: InstallFlags) -> DeviceResult {
        self.device
            .handle()
            .write_firmware(firmware, flags)
            .await
            .map_err(|cause| DeviceError::write(self.device.logical_id(), cause))
    }

    /// Close and unlock the device. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the handle's close error. The device is unlocked either way.
    pub fn release(&mut self) -> DeviceResult {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let closed = if self.opened {
            self.device.handle().close()
        } else {
            Ok(())
        };
        self.device.unlock();
        closed
    }

    /// Whether [`Self::release`] has already run.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for DeviceLocker {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(
                logical_id = self.device.logical_id(),
                error = %e,
                "failed to close device"
            );
        }
    }
}
