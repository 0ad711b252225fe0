//! Error types for fwlinkctl

use std::path::PathBuf;
use thiserror::Error;

/// Failures that map to a distinct process exit code.
#[derive(Error, Debug)]
pub enum CliError {
    /// One or more plugins would refuse to start
    #[error("Kernel safety check refused: {0}")]
    KernelRefused(String),

    /// The configuration file failed to parse or validate
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `config init` would overwrite an existing file
    #[error("Configuration already exists at {}", .0.display())]
    ConfigExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::InvalidConfiguration(_) | CliError::JsonError(_) => 2,
            CliError::KernelRefused(_) => 3,
            CliError::ConfigExists(_) => 4,
            CliError::IoError(_) => 5,
        }
    }
}
