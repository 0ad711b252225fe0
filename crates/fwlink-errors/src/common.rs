//! Common error types and utilities used across all fwlink crates.
//!
//! This module provides the top-level error enum that can wrap all sub-errors,
//! along with error classification and severity levels.

use core::fmt;

use crate::{DeviceError, KernelPolicyError};

/// Top-level error type that can wrap all fwlink sub-errors.
#[derive(Debug, thiserror::Error)]
pub enum FwlinkError {
    /// Device lifecycle errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Kernel safety gate refusals
    #[error("Kernel policy error: {0}")]
    KernelPolicy(#[from] KernelPolicyError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl FwlinkError {
    /// Get the error category for classification.
    pub fn category(&self) -> ErrorCategory {
        match self {
            FwlinkError::Device(_) => ErrorCategory::Device,
            FwlinkError::KernelPolicy(_) => ErrorCategory::Kernel,
            FwlinkError::Io(_) => ErrorCategory::IO,
            FwlinkError::Config(_) => ErrorCategory::Config,
            FwlinkError::Other(_) => ErrorCategory::Other,
        }
    }

    /// Get the error severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FwlinkError::Device(e) => e.severity(),
            FwlinkError::KernelPolicy(e) => e.severity(),
            FwlinkError::Io(_) => ErrorSeverity::Error,
            FwlinkError::Config(_) => ErrorSeverity::Error,
            FwlinkError::Other(_) => ErrorSeverity::Error,
        }
    }

    /// Check if this error is recoverable.
    pub fn is_recoverable(&self) -> bool {
        self.severity() < ErrorSeverity::Critical
    }

    /// Create a configuration error with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        FwlinkError::Config(msg.into())
    }

    /// Create a generic error with a message.
    pub fn other(msg: impl Into<String>) -> Self {
        FwlinkError::Other(msg.into())
    }
}

impl From<std::io::Error> for FwlinkError {
    fn from(e: std::io::Error) -> Self {
        FwlinkError::Io(e)
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Device lifecycle errors
    Device = 0,
    /// Kernel safety gate errors
    Kernel = 1,
    /// Configuration errors
    Config = 2,
    /// I/O errors
    IO = 3,
    /// Other errors
    Other = 255,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Kernel => write!(f, "Kernel"),
            ErrorCategory::Config => write!(f, "Config"),
            ErrorCategory::IO => write!(f, "IO"),
            ErrorCategory::Other => write!(f, "Other"),
        }
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational, expected transient state
    Info = 0,
    /// Warning, operation skipped
    Warning = 1,
    /// Error, operation failed
    Error = 2,
    /// Critical, hardware or plugin may be in an unsafe state
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
