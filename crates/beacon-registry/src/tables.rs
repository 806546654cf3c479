//! redb table definitions for the Beacon registry.
//!
//! Service and incident rows use `u64` keys and `&[u8]` values
//! (JSON-serialized domain types). The meta table holds the monotonic
//! id counters, bumped inside the same write transaction as the insert
//! they serve.

use redb::TableDefinition;

/// Service rows keyed by service id.
pub const SERVICES: TableDefinition<u64, &[u8]> = TableDefinition::new("services");

/// Incident rows keyed by incident id (key order is append order).
pub const INCIDENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("incident_log");

/// Monotonic id counters keyed by counter name.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Counter holding the next service id to allocate.
pub const SERVICE_ID_COUNTER: &str = "next_service_id";

/// Counter holding the next incident id to allocate.
pub const INCIDENT_ID_COUNTER: &str = "next_incident_id";
