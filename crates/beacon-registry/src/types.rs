//! Domain types for the Beacon durable registry.
//!
//! These types represent the persisted rows of the registry: monitored
//! services and the append-only incident log. All types are serializable
//! to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};

/// Unique identifier for a monitored service. Id `0` is reserved-invalid
/// and rejected at the ingestion boundary.
pub type ServiceId = u64;

/// Unique identifier for an incident log row.
pub type IncidentId = u64;

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── Service ────────────────────────────────────────────────────────

/// Authoritative status of a monitored service.
///
/// `Degraded` is a reserved state: it is storable and round-trips through
/// the registry, but no transition in this repository produces it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Up,
    Down,
    Degraded,
}

/// Registry row for a monitored service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRecord {
    pub id: ServiceId,
    pub name: String,
    pub url: String,
    pub region: String,
    pub status: ServiceStatus,
    /// Millisecond unix time of the heartbeat that last marked this
    /// service UP. `None` until a recovery stamps it.
    pub last_heartbeat: Option<u64>,
    /// Unix timestamp (milliseconds) when this row was created.
    pub created_at: u64,
    /// Unix timestamp (milliseconds) when this row was last updated.
    pub updated_at: u64,
}

/// Request body for registering a new service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub url: String,
    pub region: String,
}

// ── Incident ───────────────────────────────────────────────────────

/// The two liveness transitions recorded in the incident log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentEvent {
    WentDown,
    CameUp,
}

/// Immutable audit row recording a single liveness transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    pub id: IncidentId,
    pub service_id: ServiceId,
    pub event_type: IncidentEvent,
    /// Millisecond unix time the transition was detected.
    pub event_time: u64,
    pub details: String,
}

/// An incident to append. The id is assigned by the registry on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncident {
    pub service_id: ServiceId,
    pub event_type: IncidentEvent,
    pub event_time: u64,
    pub details: String,
}

impl NewIncident {
    /// A WENT_DOWN incident for a service whose silence exceeded the timeout.
    pub fn went_down(service_id: ServiceId, event_time: u64) -> Self {
        Self {
            service_id,
            event_type: IncidentEvent::WentDown,
            event_time,
            details: "heartbeat timeout exceeded".to_string(),
        }
    }

    /// A CAME_UP incident for a service that reported in while believed down.
    pub fn came_up(service_id: ServiceId, event_time: u64) -> Self {
        Self {
            service_id,
            event_type: IncidentEvent::CameUp,
            event_time,
            details: "heartbeat received after failure".to_string(),
        }
    }
}
