//! Failure detector — periodic scan for silent services.
//!
//! A single task owns the tick loop, so at most one scan is ever in
//! flight. Per candidate the order is strict: incident append, durable
//! status write, ephemeral demotion. A failure at any step leaves the
//! liveness record untouched, so silence only grows and the candidate is
//! re-detected on the next tick — at-least-once incident logging, with a
//! duplicate incident as the accepted trade under partial failure.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use beacon_liveness::LivenessStore;
use beacon_registry::{NewIncident, ServiceId, StatusRegistry, now_millis};

use crate::config::MonitorConfig;

/// Scans the liveness store on a fixed tick and transitions timed-out
/// services to DOWN in both stores.
pub struct FailureDetector {
    liveness: Arc<dyn LivenessStore>,
    registry: Arc<dyn StatusRegistry>,
    config: MonitorConfig,
}

impl FailureDetector {
    pub fn new(
        liveness: Arc<dyn LivenessStore>,
        registry: Arc<dyn StatusRegistry>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            liveness,
            registry,
            config,
        }
    }

    /// Run the detection loop until the shutdown signal fires.
    ///
    /// An in-flight scan completes before the loop exits; an overrunning
    /// scan delays the next tick rather than running in parallel with it.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.config.check_interval, "failure detector started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.scan().await;
                }
                _ = shutdown.changed() => {
                    info!("failure detector shutting down");
                    break;
                }
            }
        }
    }

    /// Evaluate all candidates against the current clock.
    pub async fn scan(&self) -> Vec<ServiceId> {
        self.scan_at(now_millis()).await
    }

    /// Evaluate all candidates against an explicit clock reading and
    /// return the ids transitioned to DOWN this pass.
    pub async fn scan_at(&self, now_ms: u64) -> Vec<ServiceId> {
        let records = match tokio::time::timeout(self.config.op_deadline, self.liveness.snapshot())
            .await
        {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!(error = %e, "liveness snapshot failed");
                return Vec::new();
            }
            Err(_) => {
                warn!("liveness snapshot timed out");
                return Vec::new();
            }
        };

        let timeout_ms = self.config.failure_timeout_ms();
        let mut transitioned = Vec::new();
        for record in records {
            let silence = now_ms.saturating_sub(record.last_heartbeat_ms);
            // Strict greater-than: exactly-at-timeout is not a candidate.
            if silence <= timeout_ms {
                continue;
            }
            if self.demote(record.service_id, now_ms).await {
                transitioned.push(record.service_id);
            }
        }

        if !transitioned.is_empty() {
            info!(
                count = transitioned.len(),
                service_ids = ?transitioned,
                "detected failures"
            );
        }
        transitioned
    }

    /// Transition one candidate to DOWN. Returns whether the full
    /// transition landed.
    async fn demote(&self, id: ServiceId, now_ms: u64) -> bool {
        // Incident first: a crash or failure past this point repeats the
        // append next tick instead of losing the transition.
        match tokio::time::timeout(
            self.config.op_deadline,
            self.registry
                .append_incident(NewIncident::went_down(id, now_ms)),
        )
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(service_id = id, error = %e, "failed to log incident");
                return false;
            }
            Err(_) => {
                warn!(service_id = id, "incident append timed out");
                return false;
            }
        }

        match tokio::time::timeout(self.config.op_deadline, self.registry.mark_service_down(id))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(service_id = id, error = %e, "failed to mark service down");
                return false;
            }
            Err(_) => {
                warn!(service_id = id, "status write timed out");
                return false;
            }
        }

        // Down-set membership before record deletion: a failure in
        // between re-detects the service next tick instead of stranding
        // it unmonitored with no down-set entry.
        match tokio::time::timeout(self.config.op_deadline, self.liveness.mark_down(id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(service_id = id, error = %e, "failed to add to down set");
                return false;
            }
            Err(_) => {
                warn!(service_id = id, "down set write timed out");
                return false;
            }
        }

        match tokio::time::timeout(self.config.op_deadline, self.liveness.remove_record(id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(service_id = id, error = %e, "failed to remove liveness record");
            }
            Err(_) => {
                warn!(service_id = id, "liveness record removal timed out");
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use beacon_liveness::MemoryLivenessStore;
    use beacon_registry::{
        IncidentEvent, IncidentId, RegistryError, RegistryResult, ServiceStatus,
    };

    /// Registry double with per-operation failure injection.
    #[derive(Default)]
    struct RecordingRegistry {
        incidents: Mutex<Vec<NewIncident>>,
        statuses: Mutex<Vec<(ServiceId, ServiceStatus)>>,
        fail_incident_append: AtomicBool,
        fail_status_write: AtomicBool,
    }

    impl RecordingRegistry {
        fn incident_events(&self, id: ServiceId) -> Vec<IncidentEvent> {
            self.incidents
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.service_id == id)
                .map(|i| i.event_type)
                .collect()
        }
    }

    #[async_trait]
    impl StatusRegistry for RecordingRegistry {
        async fn mark_service_up(&self, id: ServiceId, _observed_at_ms: u64) -> RegistryResult<()> {
            self.statuses.lock().unwrap().push((id, ServiceStatus::Up));
            Ok(())
        }

        async fn mark_service_down(&self, id: ServiceId) -> RegistryResult<()> {
            if self.fail_status_write.load(Ordering::SeqCst) {
                return Err(RegistryError::Write("injected".to_string()));
            }
            self.statuses.lock().unwrap().push((id, ServiceStatus::Down));
            Ok(())
        }

        async fn append_incident(&self, incident: NewIncident) -> RegistryResult<IncidentId> {
            if self.fail_incident_append.load(Ordering::SeqCst) {
                return Err(RegistryError::Write("injected".to_string()));
            }
            let mut incidents = self.incidents.lock().unwrap();
            incidents.push(incident);
            Ok(incidents.len() as IncidentId)
        }
    }

    const TIMEOUT_MS: u64 = 10_000;
    const BASE_MS: u64 = 1_000_000;

    fn test_detector() -> (
        FailureDetector,
        Arc<MemoryLivenessStore>,
        Arc<RecordingRegistry>,
    ) {
        let liveness = Arc::new(MemoryLivenessStore::new());
        let registry = Arc::new(RecordingRegistry::default());
        let config = MonitorConfig::new(
            Duration::from_secs(5),
            Duration::from_millis(TIMEOUT_MS),
            Duration::from_secs(1),
        );
        let detector = FailureDetector::new(liveness.clone(), registry.clone(), config);
        (detector, liveness, registry)
    }

    #[tokio::test]
    async fn never_heartbeated_services_produce_no_incidents() {
        let (detector, _liveness, registry) = test_detector();

        let transitioned = detector.scan_at(BASE_MS).await;
        assert!(transitioned.is_empty());
        assert!(registry.incidents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn silence_past_timeout_transitions_to_down() {
        let (detector, liveness, registry) = test_detector();
        liveness.record_heartbeat(1, BASE_MS).await.unwrap();

        let transitioned = detector.scan_at(BASE_MS + TIMEOUT_MS + 1).await;
        assert_eq!(transitioned, vec![1]);

        assert_eq!(registry.incident_events(1), vec![IncidentEvent::WentDown]);
        assert_eq!(
            *registry.statuses.lock().unwrap(),
            vec![(1, ServiceStatus::Down)]
        );
        assert!(liveness.snapshot().await.unwrap().is_empty());
        assert!(liveness.is_down(1).await.unwrap());
    }

    #[tokio::test]
    async fn exact_timeout_silence_is_not_a_candidate() {
        let (detector, liveness, registry) = test_detector();
        liveness.record_heartbeat(1, BASE_MS).await.unwrap();

        let transitioned = detector.scan_at(BASE_MS + TIMEOUT_MS).await;
        assert!(transitioned.is_empty());
        assert!(registry.incidents.lock().unwrap().is_empty());
        assert_eq!(liveness.snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn down_service_is_not_rescanned() {
        let (detector, liveness, registry) = test_detector();
        liveness.record_heartbeat(1, BASE_MS).await.unwrap();

        detector.scan_at(BASE_MS + TIMEOUT_MS + 1).await;
        // Record is gone, so a later tick finds no candidate.
        let transitioned = detector.scan_at(BASE_MS + 2 * TIMEOUT_MS).await;
        assert!(transitioned.is_empty());
        assert_eq!(registry.incident_events(1).len(), 1);
    }

    #[tokio::test]
    async fn incident_append_failure_leaves_candidate_untouched() {
        let (detector, liveness, registry) = test_detector();
        liveness.record_heartbeat(1, BASE_MS).await.unwrap();
        registry.fail_incident_append.store(true, Ordering::SeqCst);

        let transitioned = detector.scan_at(BASE_MS + TIMEOUT_MS + 1).await;
        assert!(transitioned.is_empty());
        assert!(registry.statuses.lock().unwrap().is_empty());
        assert_eq!(liveness.snapshot().await.unwrap().len(), 1);
        assert!(!liveness.is_down(1).await.unwrap());

        // Next tick, with the store healthy again, completes the transition.
        registry.fail_incident_append.store(false, Ordering::SeqCst);
        let transitioned = detector.scan_at(BASE_MS + TIMEOUT_MS + 2).await;
        assert_eq!(transitioned, vec![1]);
        assert_eq!(registry.incident_events(1), vec![IncidentEvent::WentDown]);
    }

    #[tokio::test]
    async fn status_write_failure_repeats_from_incident_append() {
        let (detector, liveness, registry) = test_detector();
        liveness.record_heartbeat(1, BASE_MS).await.unwrap();
        registry.fail_status_write.store(true, Ordering::SeqCst);

        let transitioned = detector.scan_at(BASE_MS + TIMEOUT_MS + 1).await;
        assert!(transitioned.is_empty());
        // The incident landed but the ephemeral state is untouched.
        assert_eq!(registry.incident_events(1).len(), 1);
        assert_eq!(liveness.snapshot().await.unwrap().len(), 1);
        assert!(!liveness.is_down(1).await.unwrap());

        // Re-detection repeats the append: a duplicate incident is the
        // accepted trade for at-least-once logging.
        registry.fail_status_write.store(false, Ordering::SeqCst);
        let transitioned = detector.scan_at(BASE_MS + TIMEOUT_MS + 2).await;
        assert_eq!(transitioned, vec![1]);
        assert_eq!(
            registry.incident_events(1),
            vec![IncidentEvent::WentDown, IncidentEvent::WentDown]
        );
        assert!(liveness.is_down(1).await.unwrap());
    }

    #[tokio::test]
    async fn partial_silence_transitions_only_silent_services() {
        // Services 1, 2, 3 heartbeat at t=0; service 2 beats again at
        // t=5s; a tick at t=11s with a 10s timeout demotes only 1 and 3.
        let (detector, liveness, registry) = test_detector();
        for id in [1u64, 2, 3] {
            liveness.record_heartbeat(id, BASE_MS).await.unwrap();
        }
        liveness.record_heartbeat(2, BASE_MS + 5_000).await.unwrap();

        let mut transitioned = detector.scan_at(BASE_MS + 11_000).await;
        transitioned.sort_unstable();
        assert_eq!(transitioned, vec![1, 3]);

        assert_eq!(registry.incident_events(1), vec![IncidentEvent::WentDown]);
        assert_eq!(registry.incident_events(3), vec![IncidentEvent::WentDown]);
        assert!(registry.incident_events(2).is_empty());

        let snapshot = liveness.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].service_id, 2);
    }

    #[tokio::test]
    async fn run_loop_stops_on_shutdown() {
        let (detector, _liveness, _registry) = test_detector();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(detector.run(shutdown_rx));
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
