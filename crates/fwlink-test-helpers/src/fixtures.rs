//! Canned device details and bus nodes.

use fwlink_device::{BusDevice, DeviceDetails, DeviceFlags, VersionFormat, instance_id};

/// A display routing hub reporting firmware 1.45, downgradable to 1.10.
pub fn display_routing_details() -> DeviceDetails {
    DeviceDetails::new()
        .with_name("VMM5331")
        .with_vendor("Synaptics")
        .with_instance_id(instance_id("MST", "06CB", "5331", "0"))
        .with_version("1.45", VersionFormat::Pair)
        .with_version_lowest("1.10")
        .with_flags(DeviceFlags::UPDATABLE)
}

/// An interconnect controller with a plain numeric version.
pub fn interconnect_details() -> DeviceDetails {
    DeviceDetails::new()
        .with_name("JHL7540 Thunderbolt 3 Bridge")
        .with_vendor("Intel")
        .with_instance_id(instance_id("TBT", "8086", "15EF", "1"))
        .with_version("43.00", VersionFormat::Pair)
        .with_flags(DeviceFlags::UPDATABLE)
}

/// Aux channel node `auxN`.
pub fn aux_bus_device(index: u32) -> BusDevice {
    BusDevice::new(
        "drm_dp_aux_dev",
        format!("aux{index}"),
        format!("/sys/class/drm_dp_aux_dev/drm_dp_aux{index}"),
    )
}

/// Display connector node `cardN`.
pub fn drm_bus_device(index: u32) -> BusDevice {
    BusDevice::new(
        "drm",
        format!("card{index}"),
        format!("/sys/class/drm/card{index}"),
    )
}

/// Interconnect domain node `N-0`.
pub fn thunderbolt_bus_device(index: u32) -> BusDevice {
    BusDevice::new(
        "thunderbolt",
        format!("{index}-0"),
        format!("/sys/bus/thunderbolt/devices/{index}-0"),
    )
}
