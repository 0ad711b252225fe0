//! The kernel safety check run at plugin startup.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use fwlink_errors::KernelPolicyError;

use crate::source::KernelInfo;
use crate::version::KernelVersion;

/// Minimum-kernel policy for one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelPolicy {
    /// Minimum kernel release; `None` disables the check
    pub minimum: Option<String>,
    /// Module whose presence makes the check mandatory; `None` means always
    pub module: Option<String>,
}

impl KernelPolicy {
    /// Policy applied regardless of loaded modules.
    pub fn unconditional(minimum: Option<String>) -> Self {
        Self {
            minimum,
            module: None,
        }
    }

    /// Policy applied only while `module` is loaded.
    pub fn when_loaded(module: impl Into<String>, minimum: Option<String>) -> Self {
        Self {
            minimum,
            module: Some(module.into()),
        }
    }
}

/// Why the gate let a plugin start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// No minimum version configured
    NoPolicy,
    /// The kernel exposes no module list, so the module cannot be loaded
    NoModuleSupport,
    /// The risky module is not loaded
    ModuleAbsent,
    /// The running kernel meets the minimum
    Satisfied {
        /// Running kernel release
        running: String,
    },
}

/// Run the gate.
///
/// # Errors
///
/// - [`KernelPolicyError::KernelTooOld`] when the check applies and the running kernel is older
/// - [`KernelPolicyError::InvalidVersion`] when either version does not parse
/// - [`KernelPolicyError::Unreadable`] when kernel information cannot be read
pub fn check(policy: &KernelPolicy, info: &dyn KernelInfo) -> Result<GateOutcome, KernelPolicyError> {
    let Some(minimum) = policy.minimum.as_deref() else {
        debug!("ignoring kernel safety checks");
        return Ok(GateOutcome::NoPolicy);
    };

    if let Some(module) = policy.module.as_deref() {
        let Some(modules) = info.loaded_modules()? else {
            debug!("no kernel module support, {module} cannot be loaded");
            return Ok(GateOutcome::NoModuleSupport);
        };
        if !modules.iter().any(|m| m == module) {
            debug!("{module} not loaded, skipping kernel version check");
            return Ok(GateOutcome::ModuleAbsent);
        }
    }

    let running_raw = info.release()?;
    let running = KernelVersion::parse(&running_raw)?;
    let required = KernelVersion::parse(minimum)?;

    if running < required {
        warn!(
            running = %running,
            minimum = %required,
            module = policy.module.as_deref().unwrap_or("-"),
            "kernel too old, refusing to start"
        );
        return Err(KernelPolicyError::KernelTooOld {
            running: running_raw,
            minimum: minimum.to_string(),
            module: policy.module.clone(),
        });
    }

    debug!(running = %running, minimum = %required, "kernel version is safe");
    Ok(GateOutcome::Satisfied {
        running: running_raw,
    })
}
