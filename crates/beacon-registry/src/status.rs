//! The narrow durable-registry surface consumed by the liveness core.

use async_trait::async_trait;

use crate::error::RegistryResult;
use crate::store::RegistryStore;
use crate::types::{IncidentId, NewIncident, ServiceId};

/// Durable-registry operations the detector and recovery paths depend on.
///
/// Kept narrow so tests can substitute failure-injecting implementations.
/// Every operation is a single-row write; no multi-row transactions are
/// required of implementors.
#[async_trait]
pub trait StatusRegistry: Send + Sync {
    /// Set a service's status to UP and stamp the observed heartbeat time.
    async fn mark_service_up(&self, id: ServiceId, observed_at_ms: u64) -> RegistryResult<()>;

    /// Set a service's status to DOWN.
    async fn mark_service_down(&self, id: ServiceId) -> RegistryResult<()>;

    /// Append an incident row, returning its assigned id.
    async fn append_incident(&self, incident: NewIncident) -> RegistryResult<IncidentId>;
}

#[async_trait]
impl StatusRegistry for RegistryStore {
    async fn mark_service_up(&self, id: ServiceId, observed_at_ms: u64) -> RegistryResult<()> {
        self.mark_up(id, observed_at_ms)
    }

    async fn mark_service_down(&self, id: ServiceId) -> RegistryResult<()> {
        self.mark_down(id)
    }

    async fn append_incident(&self, incident: NewIncident) -> RegistryResult<IncidentId> {
        self.log_incident(&incident).map(|row| row.id)
    }
}
