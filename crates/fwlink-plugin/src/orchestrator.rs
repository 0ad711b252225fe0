//! Firmware update sequencing.
//!
//! An update moves `Idle → Locked → Writing` and then ends in one of three
//! terminal states:
//!
//! - [`UpdateState::Completed`]: the device restarts into the new firmware
//!   and will re-enumerate, so it is unregistered.
//! - [`UpdateState::DeferredActive`]: the device skips the restart; the
//!   image is staged, the device stays registered and is flagged
//!   usable-during-update until the host activates it.
//! - [`UpdateState::Failed`]: the error is returned unchanged. Nothing is
//!   retried here.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, trace, warn};

use fwlink_device::{Device, DeviceFlags, DeviceLocker, InstallFlags};
use fwlink_errors::{DeviceError, DeviceResult};

use crate::registry::DeviceRegistry;

const PROGRESS_CAPACITY: usize = 64;

/// Where an update request currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateState {
    /// Not started
    #[default]
    Idle,
    /// Exclusive access acquired
    Locked,
    /// Image being written
    Writing,
    /// Image staged; device stays registered until activated
    DeferredActive,
    /// Image written; device expected to re-enumerate
    Completed,
    /// Update failed
    Failed {
        /// Error description
        error: String,
    },
}

impl UpdateState {
    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UpdateState::DeferredActive | UpdateState::Completed | UpdateState::Failed { .. }
        )
    }

    /// Whether the request is between start and a terminal state.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, UpdateState::Locked | UpdateState::Writing)
    }
}

/// How a successful update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOutcome {
    /// Device restarts and was unregistered
    Completed,
    /// Image staged, device still registered
    DeferredActive,
}

/// A state transition of one update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateProgress {
    /// Target device
    pub logical_id: String,
    /// New state
    pub state: UpdateState,
}

/// Runs update requests against devices of one registry.
#[derive(Debug, Clone)]
pub struct UpdateOrchestrator {
    progress_tx: broadcast::Sender<UpdateProgress>,
}

impl UpdateOrchestrator {
    /// New orchestrator with no subscribers.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CAPACITY);
        Self { progress_tx }
    }

    /// Subscribe to state transitions.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<UpdateProgress> {
        self.progress_tx.subscribe()
    }

    /// Update the registered device `logical_id`.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] if it is not registered, otherwise as
    /// [`Self::update`].
    pub async fn update_registered(
        &self,
        registry: &mut DeviceRegistry,
        logical_id: &str,
        firmware: &[u8],
        flags: InstallFlags,
    ) -> DeviceResult<UpdateOutcome> {
        let device = registry
            .get(logical_id)
            .cloned()
            .ok_or_else(|| DeviceError::not_found(logical_id))?;
        self.update(registry, &device, firmware, flags).await
    }

    /// Write `firmware` to `device`.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::Access`] (or [`DeviceError::Probe`]) if the device cannot be locked
    /// - [`DeviceError::Write`] with the family's cause if the write fails
    #[instrument(skip_all, fields(logical_id = device.logical_id(), size = firmware.len()))]
    pub async fn update(
        &self,
        registry: &mut DeviceRegistry,
        device: &Arc<Device>,
        firmware: &[u8],
        flags: InstallFlags,
    ) -> DeviceResult<UpdateOutcome> {
        let logical_id = device.logical_id();
        info!("starting firmware update for {logical_id}");

        let mut locker = match DeviceLocker::acquire(device).await {
            Ok(locker) => locker,
            Err(e) => return Err(self.fail(logical_id, e)),
        };
        self.transition(logical_id, UpdateState::Locked);

        self.transition(logical_id, UpdateState::Writing);
        if let Err(e) = locker.write_firmware(firmware, flags).await {
            Self::release(&mut locker);
            return Err(self.fail(logical_id, e));
        }

        if device.has_flag(DeviceFlags::SKIPS_RESTART) {
            device.add_flag(DeviceFlags::USABLE_DURING_UPDATE);
            Self::release(&mut locker);
            info!("firmware staged on {logical_id}, activation deferred");
            self.transition(logical_id, UpdateState::DeferredActive);
            return Ok(UpdateOutcome::DeferredActive);
        }

        registry.remove(logical_id);
        Self::release(&mut locker);
        info!("firmware update completed for {logical_id}");
        self.transition(logical_id, UpdateState::Completed);
        Ok(UpdateOutcome::Completed)
    }

    fn release(locker: &mut DeviceLocker) {
        if let Err(e) = locker.release() {
            warn!(
                logical_id = locker.device().logical_id(),
                error = %e,
                "failed to close device after update"
            );
        }
    }

    fn fail(&self, logical_id: &str, e: DeviceError) -> DeviceError {
        if e.is_recoverable() {
            warn!("firmware update of {logical_id} not started: {e}");
        } else {
            error!("firmware update failed for {logical_id}: {e}");
        }
        if let DeviceError::Write { cause, .. } = &e
            && cause.may_have_modified_device()
        {
            warn!("{logical_id} may hold a partially written image and need recovery");
        }
        self.transition(
            logical_id,
            UpdateState::Failed {
                error: e.to_string(),
            },
        );
        e
    }

    fn transition(&self, logical_id: &str, state: UpdateState) {
        let progress = UpdateProgress {
            logical_id: logical_id.to_string(),
            state,
        };
        if self.progress_tx.send(progress).is_err() {
            trace!("no update progress subscribers");
        }
    }
}

impl Default for UpdateOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}
