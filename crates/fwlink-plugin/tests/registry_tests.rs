//! Registry membership and rescan behaviour

use std::sync::Arc;

use fwlink_device::{Device, DeviceFamily, DeviceFlags, DeviceLocker};
use fwlink_errors::DeviceError;
use fwlink_plugin::{DeviceRegistry, RegistryEvent, RescanOutcome};
use fwlink_test_helpers::prelude::*;
use tracing_test::traced_test;

fn device(handle: &MockDeviceHandle) -> Arc<Device> {
    Arc::new(Device::new(
        handle.logical_id(),
        DeviceFamily::DisplayRouting,
        "display_routing",
        Box::new(handle.clone()),
    ))
}

#[tokio::test]
async fn test_add_requires_probe() -> TestResult {
    let handle = MockDeviceHandle::new("aux0", display_routing_details());
    let dev = device(&handle);
    let mut registry = DeviceRegistry::new();

    let err = must_err(registry.add(Arc::clone(&dev)));
    assert!(matches!(err, DeviceError::NotProbed(ref id) if id == "aux0"));

    drop(DeviceLocker::acquire(&dev).await?);
    registry.add(Arc::clone(&dev))?;
    assert!(dev.has_flag(DeviceFlags::REGISTERED));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_logical_id_rejected() -> TestResult {
    let first = MockDeviceHandle::new("aux0", display_routing_details());
    let second = MockDeviceHandle::new("aux0", display_routing_details());
    let mut registry = DeviceRegistry::new();

    assert_eq!(registry.rescan_device(&device(&first)).await, RescanOutcome::Added);

    let other = device(&second);
    drop(DeviceLocker::acquire(&other).await?);
    let err = must_err(registry.add(other));
    assert!(matches!(err, DeviceError::Duplicate(_)));
    assert_eq!(registry.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_remove_absent_is_noop() {
    let mut registry = DeviceRegistry::new();
    assert!(registry.remove("aux7").is_none());
    assert!(registry.is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_failed_rescan_removes_registered_device() -> TestResult {
    let handle = MockDeviceHandle::new("aux0", display_routing_details());
    let dev = device(&handle);
    let mut registry = DeviceRegistry::new();

    assert_eq!(registry.rescan_device(&dev).await, RescanOutcome::Added);
    handle.set_present(false);

    assert_eq!(registry.rescan_one("aux0").await?, RescanOutcome::Removed);
    assert!(!registry.contains("aux0"));
    assert!(!dev.has_flag(DeviceFlags::REGISTERED));
    assert!(!dev.is_locked());
    assert!(logs_contain("no device found on aux0"));
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_unexpected_rescan_error_is_warned_and_drops_device() -> TestResult {
    let handle = MockDeviceHandle::new("aux0", display_routing_details());
    let mut registry = DeviceRegistry::new();
    assert_eq!(registry.rescan_device(&device(&handle)).await, RescanOutcome::Added);

    handle.set_rescan_error(Some(DeviceError::access("aux0", "aux channel busy")));

    assert_eq!(registry.rescan_one("aux0").await?, RescanOutcome::Removed);
    assert!(logs_contain("rescan failed, dropping device"));
    assert!(!logs_contain("no device found on aux0"));
    Ok(())
}

#[tokio::test]
async fn test_failed_rescan_of_unregistered_device_adds_nothing() {
    let handle = MockDeviceHandle::absent("aux1", display_routing_details());
    let mut registry = DeviceRegistry::new();

    assert_eq!(registry.rescan_device(&device(&handle)).await, RescanOutcome::Absent);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_rescan_one_unknown_id() {
    let mut registry = DeviceRegistry::new();
    let err = must_err(registry.rescan_one("aux3").await);
    assert!(matches!(err, DeviceError::NotFound(_)));
}

#[tokio::test]
async fn test_rescan_is_idempotent_add() -> TestResult {
    let handle = MockDeviceHandle::new("aux0", display_routing_details());
    let mut registry = DeviceRegistry::new();

    registry.rescan_device(&device(&handle)).await;
    assert_eq!(registry.rescan_one("aux0").await?, RescanOutcome::Retained);
    assert_eq!(registry.len(), 1);
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn test_locked_device_is_skipped() -> TestResult {
    let handle = MockDeviceHandle::new("aux0", display_routing_details());
    let dev = device(&handle);
    let mut registry = DeviceRegistry::new();
    registry.rescan_device(&dev).await;

    let _held = DeviceLocker::acquire(&dev).await?;
    handle.set_present(false);

    assert_eq!(registry.rescan_one("aux0").await?, RescanOutcome::Skipped);
    assert!(registry.contains("aux0"));
    assert!(logs_contain("failed to open device aux0"));
    Ok(())
}

#[tokio::test]
async fn test_rescan_all_outcomes_are_independent() {
    let aux0 = MockDeviceHandle::new("aux0", display_routing_details());
    let aux1 = MockDeviceHandle::new("aux1", display_routing_details());
    let aux2 = MockDeviceHandle::new("aux2", display_routing_details());
    let mut registry = DeviceRegistry::new();
    for handle in [&aux0, &aux1, &aux2] {
        registry.rescan_device(&device(handle)).await;
    }

    aux1.set_present(false);
    let outcomes = registry.rescan_all().await;

    assert_eq!(
        outcomes,
        vec![
            ("aux0".to_string(), RescanOutcome::Retained),
            ("aux1".to_string(), RescanOutcome::Removed),
            ("aux2".to_string(), RescanOutcome::Retained),
        ]
    );
    let remaining: Vec<&str> = registry.iter().map(|d| d.logical_id()).collect();
    assert_eq!(remaining, ["aux0", "aux2"]);
}

#[tokio::test]
async fn test_membership_events() -> TestResult {
    let handle = MockDeviceHandle::new("aux0", display_routing_details());
    let mut registry = DeviceRegistry::new();
    let mut events = registry.subscribe();

    registry.rescan_device(&device(&handle)).await;
    registry.remove("aux0");

    let registered = events.recv().await?;
    assert!(matches!(
        registered,
        RegistryEvent::Registered(ref snapshot)
            if snapshot.logical_id == "aux0" && snapshot.flags.contains(DeviceFlags::REGISTERED)
    ));
    assert_eq!(
        events.recv().await?,
        RegistryEvent::Unregistered {
            logical_id: "aux0".into()
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_registered_hook_runs_before_event() -> TestResult {
    let handle = MockDeviceHandle::new("aux0", display_routing_details());
    let mut registry = DeviceRegistry::new()
        .with_registered_hook(Box::new(|d: &Device| d.add_flag(DeviceFlags::SKIPS_RESTART)));
    let mut events = registry.subscribe();

    registry.rescan_device(&device(&handle)).await;

    let registered = events.recv().await?;
    assert!(matches!(
        registered,
        RegistryEvent::Registered(ref snapshot) if snapshot.flags.contains(DeviceFlags::SKIPS_RESTART)
    ));
    Ok(())
}

#[tokio::test]
async fn test_clear_unregisters_everything() {
    let a = MockDeviceHandle::new("aux0", display_routing_details());
    let b = MockDeviceHandle::new("aux1", display_routing_details());
    let mut registry = DeviceRegistry::new();
    let dev_a = device(&a);
    registry.rescan_device(&dev_a).await;
    registry.rescan_device(&device(&b)).await;

    registry.clear();

    assert!(registry.is_empty());
    assert!(!dev_a.has_flag(DeviceFlags::REGISTERED));
}
