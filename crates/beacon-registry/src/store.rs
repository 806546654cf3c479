//! RegistryStore — redb-backed durable registry for Beacon.
//!
//! Holds the authoritative service rows and the append-only incident
//! log. All values are JSON-serialized into redb's `&[u8]` value
//! columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `RegistryError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| RegistryError::$variant(e.to_string())
    };
}

/// Thread-safe durable registry backed by redb.
#[derive(Clone)]
pub struct RegistryStore {
    db: Arc<Database>,
}

impl RegistryStore {
    /// Open (or create) a persistent registry at the given path.
    pub fn open(path: &Path) -> RegistryResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "registry opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory registry (for testing).
    pub fn open_in_memory() -> RegistryResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory registry opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> RegistryResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SERVICES).map_err(map_err!(Table))?;
        txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Verify the store is reachable (health check).
    pub fn ping(&self) -> RegistryResult<()> {
        self.db.begin_read().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Services ───────────────────────────────────────────────────

    /// Register a new service. Allocates a fresh id and starts it UP.
    pub fn register_service(&self, req: &NewService) -> RegistryResult<ServiceRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record;
        {
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let id = next_id(&mut meta, SERVICE_ID_COUNTER)?;
            drop(meta);

            let now = now_millis();
            record = ServiceRecord {
                id,
                name: req.name.clone(),
                url: req.url.clone(),
                region: req.region.clone(),
                status: ServiceStatus::Up,
                last_heartbeat: None,
                created_at: now,
                updated_at: now,
            };
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            let mut table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            table
                .insert(record.id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(service_id = record.id, name = %record.name, "service registered");
        Ok(record)
    }

    /// Get a service by id.
    pub fn get_service(&self, id: ServiceId) -> RegistryResult<Option<ServiceRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ServiceRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all registered services.
    pub fn list_services(&self) -> RegistryResult<Vec<ServiceRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ServiceRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Delete a service row. Returns true if it existed.
    pub fn delete_service(&self, id: ServiceId) -> RegistryResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(service_id = id, existed, "service deleted");
        Ok(existed)
    }

    /// Point-update a service's status.
    pub fn set_service_status(&self, id: ServiceId, status: ServiceStatus) -> RegistryResult<()> {
        self.update_service(id, |record| record.status = status)?;
        debug!(service_id = id, ?status, "service status updated");
        Ok(())
    }

    /// Set a service UP and stamp the heartbeat time that proved it alive.
    pub fn mark_up(&self, id: ServiceId, observed_at_ms: u64) -> RegistryResult<()> {
        self.update_service(id, |record| {
            record.status = ServiceStatus::Up;
            record.last_heartbeat = Some(observed_at_ms);
        })?;
        debug!(service_id = id, observed_at_ms, "service marked up");
        Ok(())
    }

    /// Set a service DOWN.
    pub fn mark_down(&self, id: ServiceId) -> RegistryResult<()> {
        self.update_service(id, |record| record.status = ServiceStatus::Down)?;
        debug!(service_id = id, "service marked down");
        Ok(())
    }

    /// Read-modify-write a single service row in one write transaction.
    fn update_service<F>(&self, id: ServiceId, apply: F) -> RegistryResult<()>
    where
        F: FnOnce(&mut ServiceRecord),
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            let mut record = {
                match table.get(id).map_err(map_err!(Read))? {
                    Some(guard) => serde_json::from_slice::<ServiceRecord>(guard.value())
                        .map_err(map_err!(Deserialize))?,
                    None => return Err(RegistryError::NotFound(format!("service {id}"))),
                }
            };
            apply(&mut record);
            record.updated_at = now_millis();
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table.insert(id, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Incident log ───────────────────────────────────────────────

    /// Append an incident row. The id is allocated from the meta counter
    /// inside the same write transaction as the insert.
    pub fn log_incident(&self, incident: &NewIncident) -> RegistryResult<Incident> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let row;
        {
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let id = next_id(&mut meta, INCIDENT_ID_COUNTER)?;
            drop(meta);

            row = Incident {
                id,
                service_id: incident.service_id,
                event_type: incident.event_type,
                event_time: incident.event_time,
                details: incident.details.clone(),
            };
            let value = serde_json::to_vec(&row).map_err(map_err!(Serialize))?;
            let mut table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
            table
                .insert(row.id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            incident_id = row.id,
            service_id = row.service_id,
            event = ?row.event_type,
            "incident logged"
        );
        Ok(row)
    }

    /// Incident history for one service, newest first.
    pub fn list_incidents_for_service(
        &self,
        service_id: ServiceId,
        limit: usize,
    ) -> RegistryResult<Vec<Incident>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let incident: Incident =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if incident.service_id == service_id {
                results.push(incident);
            }
        }
        results.reverse();
        results.truncate(limit);
        Ok(results)
    }

    /// Recent incidents across all services, newest first.
    pub fn list_recent_incidents(&self, limit: usize) -> RegistryResult<Vec<Incident>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INCIDENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let incident: Incident =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(incident);
        }
        results.reverse();
        results.truncate(limit);
        Ok(results)
    }
}

/// Bump a meta counter and return the value it held. Counters start at 1.
fn next_id(table: &mut redb::Table<'_, &'static str, u64>, counter: &str) -> RegistryResult<u64> {
    let next = {
        let guard = table.get(counter).map_err(map_err!(Read))?;
        guard.map(|g| g.value()).unwrap_or(1)
    };
    table.insert(counter, next + 1).map_err(map_err!(Write))?;
    Ok(next)
}
