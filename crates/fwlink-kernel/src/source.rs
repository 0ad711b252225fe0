//! Running kernel release and loaded modules.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fwlink_errors::KernelPolicyError;

/// Where the gate learns about the running kernel.
pub trait KernelInfo: Send + Sync {
    /// Running kernel release, e.g. `6.8.0-31-generic`.
    ///
    /// # Errors
    ///
    /// [`KernelPolicyError::Unreadable`] if the release cannot be read.
    fn release(&self) -> Result<String, KernelPolicyError>;

    /// Names of loaded modules, or `None` when the kernel has no module support.
    ///
    /// # Errors
    ///
    /// [`KernelPolicyError::Unreadable`] if the module list exists but cannot be read.
    fn loaded_modules(&self) -> Result<Option<Vec<String>>, KernelPolicyError>;
}

/// Reads `/proc/sys/kernel/osrelease` and `/proc/modules`.
#[derive(Debug, Clone)]
pub struct ProcKernelInfo {
    proc_root: PathBuf,
}

impl ProcKernelInfo {
    /// Use the real `/proc`.
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Use another procfs mount, e.g. a fixture directory.
    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn read(path: &Path) -> Result<String, KernelPolicyError> {
        std::fs::read_to_string(path).map_err(|e| KernelPolicyError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for ProcKernelInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelInfo for ProcKernelInfo {
    fn release(&self) -> Result<String, KernelPolicyError> {
        let path = self.proc_root.join("sys").join("kernel").join("osrelease");
        Ok(Self::read(&path)?.trim().to_string())
    }

    fn loaded_modules(&self) -> Result<Option<Vec<String>>, KernelPolicyError> {
        let path = self.proc_root.join("modules");
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(KernelPolicyError::Unreadable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        Ok(Some(parse_modules(&content)))
    }
}

/// Module names from `/proc/modules` content: the first field of each line.
pub fn parse_modules(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
