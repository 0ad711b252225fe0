//! Plugin configuration.
//!
//! Keys keep the host's configuration names (`MinimumKernelVersion`,
//! `MinimumAmdGpuKernelVersion`, `DelayedActivation`) so an existing
//! per-plugin section can be carried over unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use fwlink_errors::FwlinkError;
use fwlink_kernel::KernelVersion;

/// Key for the unconditional minimum kernel version.
pub const KEY_MINIMUM_KERNEL_VERSION: &str = "MinimumKernelVersion";
/// Key for the minimum kernel version applied while `amdgpu` is loaded.
pub const KEY_MINIMUM_AMDGPU_KERNEL_VERSION: &str = "MinimumAmdGpuKernelVersion";
/// Key enabling deferred activation for newly registered devices.
pub const KEY_DELAYED_ACTIVATION: &str = "DelayedActivation";
/// Key for the debounce window in seconds.
pub const KEY_RESCAN_DELAY_SECS: &str = "RescanDelaySecs";

/// Default debounce window.
pub const DEFAULT_RESCAN_DELAY_SECS: u64 = 5;
/// Longest accepted debounce window.
pub const MAX_RESCAN_DELAY_SECS: u64 = 3600;

/// Settings for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Minimum kernel, checked unconditionally
    #[serde(
        rename = "MinimumKernelVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_kernel_version: Option<String>,

    /// Minimum kernel, checked only while `amdgpu` is loaded
    #[serde(
        rename = "MinimumAmdGpuKernelVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_amdgpu_kernel_version: Option<String>,

    /// Mark newly registered devices usable-during-update and skips-restart-after-update
    #[serde(rename = "DelayedActivation")]
    pub delayed_activation: bool,

    /// Debounce window for bus change bursts
    #[serde(rename = "RescanDelaySecs")]
    pub rescan_delay_secs: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            minimum_kernel_version: None,
            minimum_amdgpu_kernel_version: None,
            delayed_activation: false,
            rescan_delay_secs: DEFAULT_RESCAN_DELAY_SECS,
        }
    }
}

impl PluginConfig {
    /// Look up a value by its configuration key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            KEY_MINIMUM_KERNEL_VERSION => self.minimum_kernel_version.clone(),
            KEY_MINIMUM_AMDGPU_KERNEL_VERSION => self.minimum_amdgpu_kernel_version.clone(),
            KEY_DELAYED_ACTIVATION => Some(self.delayed_activation.to_string()),
            KEY_RESCAN_DELAY_SECS => Some(self.rescan_delay_secs.to_string()),
            _ => None,
        }
    }

    /// Look up a boolean by its configuration key; missing or non-boolean is `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
    }

    /// Debounce window.
    pub fn rescan_delay(&self) -> Duration {
        Duration::from_secs(self.rescan_delay_secs)
    }

    /// Validate values.
    ///
    /// # Errors
    ///
    /// [`FwlinkError::Config`] for an unparsable minimum version or a debounce
    /// window outside `1..=MAX_RESCAN_DELAY_SECS`.
    pub fn validate(&self) -> Result<(), FwlinkError> {
        for (key, value) in [
            (KEY_MINIMUM_KERNEL_VERSION, &self.minimum_kernel_version),
            (
                KEY_MINIMUM_AMDGPU_KERNEL_VERSION,
                &self.minimum_amdgpu_kernel_version,
            ),
        ] {
            if let Some(version) = value
                && let Err(e) = KernelVersion::parse(version)
            {
                return Err(FwlinkError::config(format!("{key}: {e}")));
            }
        }
        if !(1..=MAX_RESCAN_DELAY_SECS).contains(&self.rescan_delay_secs) {
            return Err(FwlinkError::config(format!(
                "{KEY_RESCAN_DELAY_SECS} must be between 1 and {MAX_RESCAN_DELAY_SECS}, got {}",
                self.rescan_delay_secs
            )));
        }
        Ok(())
    }
}

/// Settings for every built-in plugin, keyed by plugin name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostConfig {
    plugins: BTreeMap<String, PluginConfig>,
}

impl HostConfig {
    /// Empty configuration; every plugin gets defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for `plugin`, defaults if absent.
    pub fn plugin(&self, plugin: &str) -> PluginConfig {
        self.plugins.get(plugin).cloned().unwrap_or_default()
    }

    /// Replace the settings for `plugin`.
    pub fn set_plugin(&mut self, plugin: impl Into<String>, config: PluginConfig) {
        self.plugins.insert(plugin.into(), config);
    }

    /// Builder form of [`Self::set_plugin`].
    pub fn with_plugin(mut self, plugin: impl Into<String>, config: PluginConfig) -> Self {
        self.set_plugin(plugin, config);
        self
    }

    /// Names of plugins with explicit settings.
    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Validate every plugin section.
    ///
    /// # Errors
    ///
    /// [`FwlinkError::Config`] naming the offending plugin.
    pub fn validate(&self) -> Result<(), FwlinkError> {
        for (name, config) in &self.plugins {
            config
                .validate()
                .map_err(|e| FwlinkError::config(format!("[{name}] {e}")))?;
        }
        Ok(())
    }

    /// Load from a JSON file; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// I/O errors other than not-found, parse errors, and validation errors.
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, FwlinkError> {
        let path = path.as_ref();

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("config file not found at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: HostConfig = serde_json::from_str(&content).map_err(|e| {
            FwlinkError::config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;

        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Save as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// I/O and serialization errors.
    pub async fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), FwlinkError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| FwlinkError::config(format!("failed to serialize config: {e}")))?;
        tokio::fs::write(path, content).await?;

        debug!("saved config to {}", path.display());
        Ok(())
    }
}
