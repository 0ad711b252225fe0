//! Causes of a failed firmware write.
//!
//! Device families report why a write failed through [`FirmwareFault`].
//! The update orchestrator wraps it in [`crate::DeviceError::Write`]
//! without reinterpreting it.

use crate::common::ErrorSeverity;

/// Why a firmware write did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FirmwareFault {
    /// The image could not be parsed or is truncated.
    #[error("corrupt firmware image: {0}")]
    CorruptImage(String),

    /// The device rejected the image after transfer.
    #[error("firmware verification failed: {0}")]
    VerificationFailed(String),

    /// The bus transaction failed mid-write.
    #[error("transport error: {0}")]
    Transport(String),

    /// The image is valid but not for this hardware.
    #[error("unsupported firmware: {0}")]
    Unsupported(String),
}

impl FirmwareFault {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FirmwareFault::CorruptImage(_) | FirmwareFault::Unsupported(_) => ErrorSeverity::Error,
            FirmwareFault::VerificationFailed(_) | FirmwareFault::Transport(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    /// Whether the device may have been left with a partially written image.
    pub fn may_have_modified_device(&self) -> bool {
        matches!(
            self,
            FirmwareFault::VerificationFailed(_) | FirmwareFault::Transport(_)
        )
    }
}
