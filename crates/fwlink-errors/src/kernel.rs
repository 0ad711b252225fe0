//! Kernel safety gate errors.

use crate::common::ErrorSeverity;

/// Refusals raised by the kernel safety gate at plugin startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelPolicyError {
    /// The running kernel is older than the configured minimum
    #[error("kernel {running} is older than required minimum {minimum}{}", module_suffix(.module))]
    KernelTooOld {
        /// Running kernel release
        running: String,
        /// Configured minimum version
        minimum: String,
        /// Module whose presence made the check mandatory
        module: Option<String>,
    },

    /// A version string could not be parsed
    #[error("invalid kernel version '{0}'")]
    InvalidVersion(String),

    /// Kernel information could not be read
    #[error("failed to read {path}: {reason}")]
    Unreadable {
        /// Path that was read
        path: String,
        /// Failure reason
        reason: String,
    },
}

fn module_suffix(module: &Option<String>) -> String {
    match module {
        Some(name) => format!(" while module {name} is loaded"),
        None => String::new(),
    }
}

impl KernelPolicyError {
    /// Get the error severity.
    ///
    /// Every refusal is fatal to plugin startup.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Critical
    }

    /// Human-readable statement of the unmet requirement, if any.
    pub fn requirement(&self) -> Option<String> {
        match self {
            KernelPolicyError::KernelTooOld {
                minimum,
                module: Some(module),
                ..
            } => Some(format!("kernel >= {minimum} when {module} is loaded")),
            KernelPolicyError::KernelTooOld {
                minimum,
                module: None,
                ..
            } => Some(format!("kernel >= {minimum}")),
            _ => None,
        }
    }
}
