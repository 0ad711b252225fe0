//! Host dispatch and the end-to-end event loop

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

use fwlink_device::{BusEvent, InstallFlags};
use fwlink_errors::{DeviceError, FwlinkError};
use fwlink_plugin::display_routing::{self, DisplayRoutingPlugin};
use fwlink_plugin::interconnect;
use fwlink_plugin::{
    BUILTIN_PLUGIN_NAMES, BuiltinDeps, HostConfig, HostEvent, Plugin, PluginConfig, PluginHost,
    RegistryEvent, UpdateOutcome,
};
use fwlink_test_helpers::prelude::*;
use tracing_test::traced_test;

struct Rig {
    display: MockHandleFactory,
    interconnect: MockHandleFactory,
    deps: BuiltinDeps,
}

fn rig(kernel: MockKernelInfo) -> Rig {
    let display = MockHandleFactory::new();
    let interconnect = MockHandleFactory::new();
    let deps = BuiltinDeps {
        kernel: Arc::new(kernel),
        display_routing: Arc::new(display.clone()),
        interconnect: Arc::new(interconnect.clone()),
    };
    Rig {
        display,
        interconnect,
        deps,
    }
}

fn started_host(rig: &Rig, config: &HostConfig) -> PluginHost {
    let mut host = PluginHost::builtin(config, &rig.deps);
    let refused = host.startup();
    assert!(refused.is_empty(), "unexpected refusals: {refused:?}");
    host
}

fn drain_membership(rx: &mut broadcast::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn registered(events: &[RegistryEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            RegistryEvent::Registered(snapshot) => Some(snapshot.logical_id.as_str()),
            RegistryEvent::Unregistered { .. } => None,
        })
        .collect()
}

fn unregistered(events: &[RegistryEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            RegistryEvent::Unregistered { logical_id } => Some(logical_id.as_str()),
            RegistryEvent::Registered(_) => None,
        })
        .collect()
}

#[test]
fn test_builtin_plugins_in_order() {
    let rig = rig(MockKernelInfo::new("6.1.0"));
    let host = PluginHost::builtin(&HostConfig::new(), &rig.deps);

    let names: Vec<&str> = host.plugins().map(|p| p.name()).collect();
    assert_eq!(names, BUILTIN_PLUGIN_NAMES);
}

#[tokio::test]
async fn test_refused_plugin_stays_inert() {
    let rig = rig(MockKernelInfo::new("4.15.0").with_modules(&["amdgpu"]));
    rig.display
        .insert(MockDeviceHandle::new("aux0", display_routing_details()));
    let config = HostConfig::new().with_plugin(
        display_routing::NAME,
        PluginConfig {
            minimum_amdgpu_kernel_version: Some("4.20".into()),
            ..PluginConfig::default()
        },
    );
    let mut host = PluginHost::builtin(&config, &rig.deps);

    let refused = host.startup();

    assert_eq!(refused.len(), 1);
    assert!(matches!(
        refused.first(),
        Some((name, FwlinkError::KernelPolicy(_))) if name == display_routing::NAME
    ));
    assert!(!host.is_enabled(display_routing::NAME));
    assert!(host.is_enabled(interconnect::NAME));

    host.dispatch(&BusEvent::Added(aux_bus_device(0))).await;
    assert!(rig.display.created().is_empty());
}

#[tokio::test]
async fn test_events_only_reach_subscribed_plugins() {
    let rig = rig(MockKernelInfo::new("6.1.0"));
    rig.interconnect
        .insert(MockDeviceHandle::new("0-0", interconnect_details()));
    let mut host = started_host(&rig, &HostConfig::new());

    host.dispatch(&BusEvent::Added(thunderbolt_bus_device(0))).await;

    assert!(rig.display.created().is_empty());
    assert_eq!(rig.interconnect.created(), ["0-0"]);
    let interconnect = must_some(host.plugin(interconnect::NAME), "builtin");
    assert!(interconnect.registry().contains("0-0"));
}

#[tokio::test]
#[traced_test]
async fn test_dispatch_failure_is_logged_with_category() {
    let rig = rig(MockKernelInfo::new("6.1.0"));
    let mut host = started_host(&rig, &HostConfig::new());

    // no handle was inserted, so opening the node is denied
    host.dispatch(&BusEvent::Added(thunderbolt_bus_device(0))).await;

    let interconnect = must_some(host.plugin(interconnect::NAME), "builtin");
    assert!(interconnect.registry().is_empty());
    assert!(host.is_enabled(interconnect::NAME), "a failed event does not disable the plugin");
    logs_assert(|lines: &[&str]| {
        let found = lines.iter().any(|line| {
            line.contains("DEBUG")
                && line.contains("failed to handle add")
                && line.contains("category=Device")
        });
        if found {
            Ok(())
        } else {
            Err("access failure not logged at debug with its category".to_string())
        }
    });
}

#[tokio::test]
async fn test_update_of_unknown_device() {
    let rig = rig(MockKernelInfo::new("6.1.0"));
    let mut host = started_host(&rig, &HostConfig::new());

    let err = must_err(host.update("aux9", b"fw", InstallFlags::NONE).await);
    assert!(matches!(err, FwlinkError::Device(DeviceError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_display_routing() -> TestResult {
    let rig = rig(MockKernelInfo::new("6.1.0"));
    let aux0 = rig
        .display
        .insert(MockDeviceHandle::new("aux0", display_routing_details()));
    let aux1 = rig
        .display
        .insert(MockDeviceHandle::new("aux1", display_routing_details()));
    let mut host = started_host(&rig, &HostConfig::new());
    let mut membership = must_some(host.plugin(display_routing::NAME), "builtin")
        .registry()
        .subscribe();
    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(async move {
        host.run(rx).await;
        host
    });

    tx.send(HostEvent::Bus(BusEvent::Added(aux_bus_device(0)))).await?;
    tx.send(HostEvent::Bus(BusEvent::Added(aux_bus_device(1)))).await?;

    let (reply, answer) = oneshot::channel();
    tx.send(HostEvent::Update {
        logical_id: "aux0".into(),
        firmware: b"image".to_vec(),
        flags: InstallFlags::NONE,
        reply,
    })
    .await?;
    assert_eq!(answer.await??, UpdateOutcome::Completed);
    assert_eq!(aux0.writes().len(), 1);

    // aux1 loses its downstream hardware, then a burst of topology changes
    aux1.set_present(false);
    for _ in 0..5 {
        tx.send(HostEvent::Bus(BusEvent::Changed(drm_bus_device(0))))
            .await?;
    }
    tokio::time::sleep(Duration::from_secs(6)).await;

    let events = drain_membership(&mut membership);
    assert_eq!(aux1.rescans(), 2, "one rescan on add, one after the burst");
    assert_eq!(aux0.rescans(), 2, "updated hub is rescanned with the rest");
    assert_eq!(registered(&events), ["aux0", "aux1", "aux0"]);
    assert_eq!(unregistered(&events), ["aux0", "aux1"]);
    let restarted = must_some(
        events
            .iter()
            .position(|e| matches!(e, RegistryEvent::Unregistered { logical_id } if logical_id == "aux0")),
        "update unregisters aux0",
    );
    let rediscovered = must_some(
        events
            .iter()
            .rposition(|e| matches!(e, RegistryEvent::Registered(s) if s.logical_id == "aux0")),
        "burst registers aux0 again",
    );
    assert!(restarted < rediscovered);

    tx.send(HostEvent::Shutdown).await?;
    let host = task.await?;

    assert!(!host.is_enabled(display_routing::NAME));
    let plugin = must_some(host.plugin(display_routing::NAME), "builtin");
    assert!(plugin.registry().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropped_sender_stops_loop() -> TestResult {
    let rig = rig(MockKernelInfo::new("6.1.0"));
    let mut host = started_host(&rig, &HostConfig::new());
    let (tx, rx) = mpsc::channel::<HostEvent>(1);
    let task = tokio::spawn(async move {
        host.run(rx).await;
        host
    });

    drop(tx);
    let host = task.await?;

    assert!(!host.is_enabled(interconnect::NAME));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rescan_tracked_reports_absent_hub() -> TestResult {
    let rig = rig(MockKernelInfo::new("6.1.0"));
    rig.display
        .insert(MockDeviceHandle::absent("aux0", display_routing_details()));
    let mut plugin = DisplayRoutingPlugin::new(
        PluginConfig::default(),
        Arc::clone(&rig.deps.kernel),
        Arc::clone(&rig.deps.display_routing),
    );
    plugin.device_added(&aux_bus_device(0)).await?;

    let outcomes = plugin.rescan_tracked().await;

    assert_eq!(outcomes.len(), 1);
    assert!(plugin.registry().is_empty());
    Ok(())
}
