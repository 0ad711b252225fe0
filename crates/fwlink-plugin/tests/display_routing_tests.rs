//! Display routing plugin: discovery, debounced rescans and the amdgpu gate

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use fwlink_device::{DeviceFlags, InstallFlags, VersionFormat};
use fwlink_errors::{DeviceError, FwlinkError, KernelPolicyError};
use fwlink_plugin::display_routing::DisplayRoutingPlugin;
use fwlink_plugin::{DEFAULT_RESCAN_DELAY, Plugin, PluginConfig, RegistryEvent, UpdateOutcome};
use fwlink_test_helpers::prelude::*;

fn plugin(factory: &MockHandleFactory) -> DisplayRoutingPlugin {
    plugin_with(factory, PluginConfig::default(), MockKernelInfo::new("6.1.0"))
}

fn plugin_with(
    factory: &MockHandleFactory,
    config: PluginConfig,
    kernel: MockKernelInfo,
) -> DisplayRoutingPlugin {
    DisplayRoutingPlugin::new(config, Arc::new(kernel), Arc::new(factory.clone()))
}

fn amdgpu_minimum(version: &str) -> PluginConfig {
    PluginConfig {
        minimum_amdgpu_kernel_version: Some(version.into()),
        ..PluginConfig::default()
    }
}

#[tokio::test]
async fn test_added_hub_is_registered_with_reported_fields() -> TestResult {
    let factory = MockHandleFactory::new();
    factory.insert(MockDeviceHandle::new("aux0", display_routing_details()));
    let mut plugin = plugin(&factory);
    plugin.startup()?;

    plugin.device_added(&aux_bus_device(0)).await?;

    let device = must_some(plugin.registry().get("aux0"), "aux0 registered");
    assert_eq!(device.version().as_deref(), Some("1.45"));
    assert_eq!(device.version_format(), VersionFormat::Pair);
    assert_eq!(device.version_lowest().as_deref(), Some("1.10"));
    assert!(device.has_flag(DeviceFlags::UPDATABLE | DeviceFlags::REGISTERED));
    assert!(device.guid().is_some());
    assert!(!device.is_locked());
    Ok(())
}

#[tokio::test]
async fn test_hub_without_downstream_is_tracked_not_registered() -> TestResult {
    let factory = MockHandleFactory::new();
    factory.insert(MockDeviceHandle::absent("aux0", display_routing_details()));
    let mut plugin = plugin(&factory);

    plugin.device_added(&aux_bus_device(0)).await?;

    assert!(plugin.registry().is_empty());
    assert_eq!(plugin.tracked().count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_drm_nodes_are_not_devices() -> TestResult {
    let factory = MockHandleFactory::new();
    let mut plugin = plugin(&factory);

    plugin.device_added(&drm_bus_device(0)).await?;

    assert!(factory.created().is_empty());
    assert_eq!(plugin.tracked().count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_open_failure_is_reported_and_not_tracked() {
    let factory = MockHandleFactory::new();
    let handle = factory.insert(MockDeviceHandle::new("aux0", display_routing_details()));
    handle.set_deny_open(true);
    let mut plugin = plugin(&factory);

    let err = must_err(plugin.device_added(&aux_bus_device(0)).await);

    assert!(matches!(err, FwlinkError::Device(DeviceError::Access { .. })));
    assert_eq!(plugin.tracked().count(), 0);
    assert!(plugin.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_changes_triggers_one_rescan() -> TestResult {
    let factory = MockHandleFactory::new();
    let handle = factory.insert(MockDeviceHandle::new("aux0", display_routing_details()));
    let mut plugin = plugin(&factory);
    plugin.device_added(&aux_bus_device(0)).await?;
    assert_eq!(handle.rescans(), 1);

    let start = Instant::now();
    for _ in 0..10 {
        plugin.device_changed(&drm_bus_device(0)).await?;
        tokio::time::advance(Duration::from_millis(400)).await;
    }
    let last = start + Duration::from_millis(3600);
    assert_eq!(plugin.rescan_deadline(), Some(last + DEFAULT_RESCAN_DELAY));

    tokio::time::advance(Duration::from_millis(4500)).await;
    plugin.rescan_due(Instant::now()).await;
    assert_eq!(handle.rescans(), 1, "deadline not reached yet");

    tokio::time::advance(Duration::from_millis(100)).await;
    plugin.rescan_due(Instant::now()).await;
    assert_eq!(handle.rescans(), 2);
    assert!(plugin.rescan_deadline().is_none());

    plugin.rescan_due(Instant::now() + Duration::from_secs(60)).await;
    assert_eq!(handle.rescans(), 2, "fires exactly once");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_topology_change_brings_hub_online() -> TestResult {
    let factory = MockHandleFactory::new();
    let handle = factory.insert(MockDeviceHandle::absent("aux0", display_routing_details()));
    let mut plugin = plugin(&factory);
    plugin.device_added(&aux_bus_device(0)).await?;
    assert!(plugin.registry().is_empty());

    handle.set_present(true);
    plugin.device_changed(&drm_bus_device(0)).await?;
    tokio::time::advance(DEFAULT_RESCAN_DELAY).await;
    plugin.rescan_due(Instant::now()).await;

    assert!(plugin.registry().contains("aux0"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_topology_change_removes_vanished_hub() -> TestResult {
    let factory = MockHandleFactory::new();
    let handle = factory.insert(MockDeviceHandle::new("aux0", display_routing_details()));
    let mut plugin = plugin(&factory);
    plugin.device_added(&aux_bus_device(0)).await?;
    let mut events = plugin.registry().subscribe();
    assert!(plugin.registry().contains("aux0"));

    handle.set_present(false);
    for _ in 0..3 {
        plugin.device_changed(&drm_bus_device(0)).await?;
    }
    tokio::time::advance(DEFAULT_RESCAN_DELAY).await;
    plugin.rescan_due(Instant::now()).await;

    assert!(!plugin.registry().contains("aux0"));
    assert_eq!(plugin.tracked().count(), 1, "hub stays tracked for a later topology change");
    assert_eq!(handle.rescans(), 2);
    assert_eq!(
        events.try_recv()?,
        RegistryEvent::Unregistered {
            logical_id: "aux0".into()
        }
    );
    assert!(events.try_recv().is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_aux_change_does_not_schedule() -> TestResult {
    let factory = MockHandleFactory::new();
    let mut plugin = plugin(&factory);

    plugin.device_changed(&aux_bus_device(0)).await?;

    assert!(plugin.rescan_deadline().is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_configured_delay_is_used() -> TestResult {
    let factory = MockHandleFactory::new();
    let config = PluginConfig {
        rescan_delay_secs: 2,
        ..PluginConfig::default()
    };
    let mut plugin = plugin_with(&factory, config, MockKernelInfo::new("6.1.0"));

    let now = Instant::now();
    plugin.device_changed(&drm_bus_device(0)).await?;

    assert_eq!(plugin.rescan_deadline(), Some(now + Duration::from_secs(2)));
    Ok(())
}

#[tokio::test]
async fn test_removed_hub_is_forgotten() -> TestResult {
    let factory = MockHandleFactory::new();
    factory.insert(MockDeviceHandle::new("aux0", display_routing_details()));
    factory.insert(MockDeviceHandle::new("aux1", display_routing_details()));
    let mut plugin = plugin(&factory);
    plugin.device_added(&aux_bus_device(0)).await?;
    plugin.device_added(&aux_bus_device(1)).await?;

    plugin.device_removed(&aux_bus_device(0)).await?;

    assert!(!plugin.registry().contains("aux0"));
    let tracked: Vec<&str> = plugin.tracked().map(|d| d.logical_id()).collect();
    assert_eq!(tracked, ["aux1"]);
    Ok(())
}

#[tokio::test]
async fn test_update_then_rescan_reregisters() -> TestResult {
    let factory = MockHandleFactory::new();
    let handle = factory.insert(MockDeviceHandle::new("aux0", display_routing_details()));
    let mut plugin = plugin(&factory);
    plugin.device_added(&aux_bus_device(0)).await?;

    let outcome = plugin.update("aux0", b"image", InstallFlags::NONE).await?;
    assert_eq!(outcome, UpdateOutcome::Completed);
    assert!(plugin.registry().is_empty());
    assert_eq!(plugin.tracked().count(), 1);

    plugin.rescan_tracked().await;
    assert!(plugin.registry().contains("aux0"));
    assert_eq!(handle.writes().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_update_of_unregistered_hub_is_not_found() -> TestResult {
    let factory = MockHandleFactory::new();
    factory.insert(MockDeviceHandle::absent("aux0", display_routing_details()));
    let mut plugin = plugin(&factory);
    plugin.device_added(&aux_bus_device(0)).await?;

    let err = must_err(plugin.update("aux0", b"image", InstallFlags::NONE).await);
    assert!(matches!(err, FwlinkError::Device(DeviceError::NotFound(_))));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_rescan() -> TestResult {
    let factory = MockHandleFactory::new();
    let handle = factory.insert(MockDeviceHandle::new("aux0", display_routing_details()));
    let mut plugin = plugin(&factory);
    plugin.device_added(&aux_bus_device(0)).await?;
    plugin.device_changed(&drm_bus_device(0)).await?;

    plugin.shutdown();

    assert!(plugin.rescan_deadline().is_none());
    assert!(plugin.registry().is_empty());
    assert_eq!(plugin.tracked().count(), 0);
    tokio::time::advance(DEFAULT_RESCAN_DELAY).await;
    plugin.rescan_due(Instant::now()).await;
    assert_eq!(handle.rescans(), 1);
    Ok(())
}

#[test]
fn test_old_kernel_with_amdgpu_refuses_startup() {
    let factory = MockHandleFactory::new();
    let kernel = MockKernelInfo::new("4.15.0-112-generic").with_modules(&["amdgpu", "drm"]);
    let mut plugin = plugin_with(&factory, amdgpu_minimum("4.20"), kernel);

    let err = must_err(plugin.startup());
    assert!(matches!(
        err,
        FwlinkError::KernelPolicy(KernelPolicyError::KernelTooOld { ref module, .. })
            if module.as_deref() == Some("amdgpu")
    ));
}

#[test]
fn test_old_kernel_without_amdgpu_starts() -> TestResult {
    let factory = MockHandleFactory::new();
    let kernel = MockKernelInfo::new("4.15.0").with_modules(&["i915", "drm"]);
    let mut plugin = plugin_with(&factory, amdgpu_minimum("4.20"), kernel);

    plugin.startup()?;
    Ok(())
}

#[test]
fn test_no_module_support_starts() -> TestResult {
    let factory = MockHandleFactory::new();
    let kernel = MockKernelInfo::new("4.15.0").without_module_support();
    let mut plugin = plugin_with(&factory, amdgpu_minimum("4.20"), kernel);

    plugin.startup()?;
    Ok(())
}

#[test]
fn test_new_kernel_with_amdgpu_starts() -> TestResult {
    let factory = MockHandleFactory::new();
    let kernel = MockKernelInfo::new("5.4.0-42-generic").with_modules(&["amdgpu"]);
    let mut plugin = plugin_with(&factory, amdgpu_minimum("4.20"), kernel);

    plugin.startup()?;
    Ok(())
}
