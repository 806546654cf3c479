//! Liveness store trait and the in-memory implementation.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use beacon_registry::ServiceId;

use crate::error::LivenessResult;

/// Ephemeral record of the last heartbeat observed for a service.
///
/// Created on first heartbeat, overwritten on every subsequent one,
/// deleted when the service transitions to DOWN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessRecord {
    pub service_id: ServiceId,
    pub last_heartbeat_ms: u64,
}

/// Capability interface over the ephemeral liveness state.
///
/// All operations are single-key or single-element; no multi-key
/// transactions are required of implementors. `clear_down` is the one
/// operation with an atomicity requirement: the membership test and the
/// removal must be indivisible, because it is the sole synchronization
/// point between the detector's DOWN transitions and ingestion's UP
/// transitions.
#[async_trait]
pub trait LivenessStore: Send + Sync {
    /// Overwrite the last-heartbeat timestamp for a service.
    async fn record_heartbeat(&self, id: ServiceId, at_ms: u64) -> LivenessResult<()>;

    /// All services with an active liveness record.
    async fn snapshot(&self) -> LivenessResult<Vec<LivenessRecord>>;

    /// Delete a service's liveness record. Absent keys are a no-op.
    async fn remove_record(&self, id: ServiceId) -> LivenessResult<()>;

    /// Add a service to the down set.
    async fn mark_down(&self, id: ServiceId) -> LivenessResult<()>;

    /// Atomically remove a service from the down set, returning whether
    /// it was present. At most one concurrent caller observes `true`.
    async fn clear_down(&self, id: ServiceId) -> LivenessResult<bool>;

    /// Whether a service is currently in the down set.
    async fn is_down(&self, id: ServiceId) -> LivenessResult<bool>;

    /// All services currently in the down set.
    async fn down_services(&self) -> LivenessResult<Vec<ServiceId>>;
}

#[derive(Default)]
struct Inner {
    heartbeats: HashMap<ServiceId, u64>,
    down: HashSet<ServiceId>,
}

/// In-memory liveness store. Not durable across restarts.
///
/// A single `RwLock` over both maps makes `clear_down` a true
/// test-and-delete: the membership check and the removal happen under
/// one write-lock acquisition.
#[derive(Default)]
pub struct MemoryLivenessStore {
    inner: RwLock<Inner>,
}

impl MemoryLivenessStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LivenessStore for MemoryLivenessStore {
    async fn record_heartbeat(&self, id: ServiceId, at_ms: u64) -> LivenessResult<()> {
        let mut inner = self.inner.write().await;
        inner.heartbeats.insert(id, at_ms);
        Ok(())
    }

    async fn snapshot(&self) -> LivenessResult<Vec<LivenessRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .heartbeats
            .iter()
            .map(|(&service_id, &last_heartbeat_ms)| LivenessRecord {
                service_id,
                last_heartbeat_ms,
            })
            .collect())
    }

    async fn remove_record(&self, id: ServiceId) -> LivenessResult<()> {
        let mut inner = self.inner.write().await;
        inner.heartbeats.remove(&id);
        Ok(())
    }

    async fn mark_down(&self, id: ServiceId) -> LivenessResult<()> {
        let mut inner = self.inner.write().await;
        inner.down.insert(id);
        debug!(service_id = id, "added to down set");
        Ok(())
    }

    async fn clear_down(&self, id: ServiceId) -> LivenessResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.down.remove(&id))
    }

    async fn is_down(&self, id: ServiceId) -> LivenessResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.down.contains(&id))
    }

    async fn down_services(&self) -> LivenessResult<Vec<ServiceId>> {
        let inner = self.inner.read().await;
        let mut ids: Vec<ServiceId> = inner.down.iter().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn heartbeat_creates_and_overwrites_record() {
        let store = MemoryLivenessStore::new();

        store.record_heartbeat(1, 1000).await.unwrap();
        store.record_heartbeat(1, 2000).await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].last_heartbeat_ms, 2000);
    }

    #[tokio::test]
    async fn snapshot_lists_all_active_records() {
        let store = MemoryLivenessStore::new();
        store.record_heartbeat(1, 1000).await.unwrap();
        store.record_heartbeat(2, 1000).await.unwrap();
        store.record_heartbeat(3, 1000).await.unwrap();

        assert_eq!(store.snapshot().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn remove_record_deletes_key() {
        let store = MemoryLivenessStore::new();
        store.record_heartbeat(1, 1000).await.unwrap();

        store.remove_record(1).await.unwrap();
        assert!(store.snapshot().await.unwrap().is_empty());

        // Removing an absent key is a no-op.
        store.remove_record(1).await.unwrap();
    }

    #[tokio::test]
    async fn down_set_membership() {
        let store = MemoryLivenessStore::new();

        assert!(!store.is_down(7).await.unwrap());
        store.mark_down(7).await.unwrap();
        assert!(store.is_down(7).await.unwrap());
        assert_eq!(store.down_services().await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn clear_down_reports_presence_once() {
        let store = MemoryLivenessStore::new();
        store.mark_down(7).await.unwrap();

        assert!(store.clear_down(7).await.unwrap());
        assert!(!store.clear_down(7).await.unwrap());
        assert!(!store.is_down(7).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_clear_down_single_winner() {
        let store = Arc::new(MemoryLivenessStore::new());
        store.mark_down(7).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.clear_down(7).await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn down_services_sorted() {
        let store = MemoryLivenessStore::new();
        for id in [9u64, 3, 5] {
            store.mark_down(id).await.unwrap();
        }
        assert_eq!(store.down_services().await.unwrap(), vec![3, 5, 9]);
    }
}
