//! Configuration file commands

use anyhow::Result;
use colored::*;
use serde_json::json;
use std::path::Path;
use tracing::info;

use fwlink_errors::FwlinkError;
use fwlink_plugin::{BUILTIN_PLUGIN_NAMES, HostConfig, PluginConfig};

use crate::commands::ConfigCommands;
use crate::error::CliError;

/// Execute configuration commands
pub async fn execute(cmd: &ConfigCommands, path: &Path, json: bool) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(path, json).await,
        ConfigCommands::Init { force } => init(path, *force, json).await,
    }
}

/// Load the host configuration, mapping failures to CLI errors.
pub async fn load_config(path: &Path) -> Result<HostConfig> {
    HostConfig::load_from_path(path).await.map_err(|e| match e {
        FwlinkError::Io(io) => CliError::IoError(io).into(),
        other => CliError::InvalidConfiguration(other.to_string()).into(),
    })
}

/// Configuration with an explicit default section for every built-in plugin.
fn effective_config(loaded: HostConfig) -> HostConfig {
    BUILTIN_PLUGIN_NAMES.iter().fold(loaded, |config, name| {
        let section = config.plugin(name);
        config.with_plugin(*name, section)
    })
}

async fn show(path: &Path, json: bool) -> Result<()> {
    let config = effective_config(load_config(path).await?);

    if json {
        let text = serde_json::to_string_pretty(&config).map_err(CliError::from)?;
        println!("{text}");
        return Ok(());
    }

    println!("{} {}", "Configuration:".bold(), path.display());
    for name in config.plugin_names() {
        print_plugin_human(name, &config.plugin(name));
    }
    Ok(())
}

fn print_plugin_human(name: &str, plugin: &PluginConfig) {
    println!("  {}", name.bold());
    for key in [
        fwlink_plugin::config::KEY_MINIMUM_KERNEL_VERSION,
        fwlink_plugin::config::KEY_MINIMUM_AMDGPU_KERNEL_VERSION,
        fwlink_plugin::config::KEY_DELAYED_ACTIVATION,
        fwlink_plugin::config::KEY_RESCAN_DELAY_SECS,
    ] {
        match plugin.get(key) {
            Some(value) => println!("    {key}: {value}"),
            None => println!("    {key}: {}", "unset".dimmed()),
        }
    }
}

async fn init(path: &Path, force: bool, json: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(path).await? {
        return Err(CliError::ConfigExists(path.to_path_buf()).into());
    }

    let config = effective_config(HostConfig::new());
    config.save_to_path(path).await.map_err(|e| match e {
        FwlinkError::Io(io) => anyhow::Error::from(CliError::IoError(io)),
        other => anyhow::Error::from(other),
    })?;
    info!("wrote default configuration to {}", path.display());

    if json {
        let output = json!({
            "success": true,
            "path": path.display().to_string(),
        });
        let text = serde_json::to_string_pretty(&output).map_err(CliError::from)?;
        println!("{text}");
    } else {
        println!("{} Wrote {}", "✓".green(), path.display());
    }
    Ok(())
}
