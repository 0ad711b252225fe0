//! Loading and saving host configuration

use fwlink_errors::{ErrorCategory, FwlinkError};
use fwlink_plugin::config::MAX_RESCAN_DELAY_SECS;
use fwlink_plugin::{HostConfig, PluginConfig};
use fwlink_test_helpers::prelude::*;

#[tokio::test]
async fn test_missing_file_yields_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = HostConfig::load_from_path(dir.path().join("absent.json")).await?;
    assert_eq!(config, HostConfig::default());
    Ok(())
}

#[tokio::test]
async fn test_saved_config_loads_back() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("fwlink.json");
    let config = HostConfig::new().with_plugin(
        "interconnect",
        PluginConfig {
            minimum_kernel_version: Some("4.13".into()),
            delayed_activation: true,
            ..PluginConfig::default()
        },
    );

    config.save_to_path(&path).await?;
    let written = std::fs::read_to_string(&path)?;
    assert!(written.contains("\"MinimumKernelVersion\": \"4.13\""));
    assert!(written.contains("\"DelayedActivation\": true"));

    let loaded = HostConfig::load_from_path(&path).await?;
    assert_eq!(loaded, config);
    assert!(loaded.plugin("interconnect").delayed_activation);
    Ok(())
}

#[tokio::test]
async fn test_invalid_json_is_config_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fwlink.json");
    std::fs::write(&path, "{ not json")?;

    let err = must_err(HostConfig::load_from_path(&path).await);
    assert_eq!(err.category(), ErrorCategory::Config);
    Ok(())
}

#[tokio::test]
async fn test_invalid_value_names_plugin() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fwlink.json");
    std::fs::write(
        &path,
        r#"{"display_routing": {"MinimumAmdGpuKernelVersion": "next"}}"#,
    )?;

    let err = must_err(HostConfig::load_from_path(&path).await);
    assert!(matches!(&err, FwlinkError::Config(msg) if msg.contains("[display_routing]")));
    Ok(())
}

#[tokio::test]
async fn test_out_of_range_rescan_delay_is_rejected() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fwlink.json");
    std::fs::write(
        &path,
        r#"{"display_routing": {"RescanDelaySecs": 18446744073709551615}}"#,
    )?;

    let err = must_err(HostConfig::load_from_path(&path).await);
    assert!(matches!(
        &err,
        FwlinkError::Config(msg) if msg.contains("[display_routing]") && msg.contains("RescanDelaySecs")
    ));
    Ok(())
}

#[test]
fn test_rescan_delay_bounds() {
    let with_delay = |secs| PluginConfig {
        rescan_delay_secs: secs,
        ..PluginConfig::default()
    };

    assert!(with_delay(0).validate().is_err());
    assert!(with_delay(1).validate().is_ok());
    assert!(with_delay(MAX_RESCAN_DELAY_SECS).validate().is_ok());
    assert!(with_delay(MAX_RESCAN_DELAY_SECS + 1).validate().is_err());
}
