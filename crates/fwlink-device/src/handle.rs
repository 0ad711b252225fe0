//! Per-family hardware capability interface.

use async_trait::async_trait;
use fwlink_errors::{DeviceResult, FirmwareFault};

use crate::device::DeviceDetails;
use crate::flags::InstallFlags;

/// Hardware-facing operations of one controller family.
///
/// Implementations hold the family-specific protocol (aux-channel
/// transactions, NVM access, ...). They are only ever invoked through a
/// [`crate::DeviceLocker`], which serialises access to one physical device.
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    /// Open the underlying node (file descriptor, aux channel).
    fn open(&self) -> DeviceResult;

    /// Close the underlying node.
    fn close(&self) -> DeviceResult;

    /// Read static identity from the bus without talking to the controller.
    async fn probe(&self) -> DeviceResult<DeviceDetails>;

    /// Query the controller itself.
    ///
    /// Fails with [`fwlink_errors::DeviceError::Rescan`] when nothing
    /// responds, e.g. no display is plugged into the downstream port.
    async fn rescan(&self) -> DeviceResult<DeviceDetails>;

    /// Write a firmware image.
    async fn write_firmware(&self, firmware: &[u8], flags: InstallFlags) -> Result<(), FirmwareFault>;
}
