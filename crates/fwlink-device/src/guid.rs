//! GUID derivation.
//!
//! A device's GUID is the name-based (SHA-1, v5) UUID of its instance id
//! in the DNS namespace, so the same vendor/model/topology always maps to
//! the same GUID.

use uuid::Uuid;

/// Build an instance id from the subsystem prefix, vendor, model and bus topology.
pub fn instance_id(prefix: &str, vendor: &str, model: &str, topology: &str) -> String {
    format!("{prefix}\\VEN_{vendor}&DEV_{model}&TOPO_{topology}")
}

/// Derive the GUID for an instance id.
pub fn instance_id_to_guid(instance_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, instance_id.as_bytes())
}
