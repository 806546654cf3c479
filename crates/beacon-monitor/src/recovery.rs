//! Recovery worker — detached bookkeeping for services that report in
//! after being declared DOWN.
//!
//! Ingestion enqueues a `RecoveryJob` on the channel and returns; the
//! worker consumes jobs one at a time with its own error-logging sink.
//! The contract is at-least-once execution with no return value observed
//! by the trigger. The three writes per job are deliberately not wrapped
//! in a cross-store transaction: each is idempotent or non-corrupting on
//! repeat, and a failed step never aborts the remaining ones.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use beacon_liveness::LivenessStore;
use beacon_registry::{NewIncident, ServiceId, StatusRegistry, now_millis};

/// A down-to-up transition detected by ingestion, awaiting durable bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryJob {
    pub service_id: ServiceId,
    /// Millisecond unix time of the heartbeat that proved the service alive.
    pub observed_at_ms: u64,
}

/// Create the channel connecting ingestion to the recovery worker.
pub fn recovery_channel() -> (
    mpsc::UnboundedSender<RecoveryJob>,
    mpsc::UnboundedReceiver<RecoveryJob>,
) {
    mpsc::unbounded_channel()
}

/// Consumes recovery jobs and applies the UP-transition bookkeeping.
pub struct RecoveryWorker {
    registry: Arc<dyn StatusRegistry>,
    liveness: Arc<dyn LivenessStore>,
    rx: mpsc::UnboundedReceiver<RecoveryJob>,
    op_deadline: Duration,
}

impl RecoveryWorker {
    pub fn new(
        registry: Arc<dyn StatusRegistry>,
        liveness: Arc<dyn LivenessStore>,
        rx: mpsc::UnboundedReceiver<RecoveryJob>,
        op_deadline: Duration,
    ) -> Self {
        Self {
            registry,
            liveness,
            rx,
            op_deadline,
        }
    }

    /// Run until every sender is dropped and the channel drains.
    pub async fn run(mut self) {
        info!("recovery worker started");
        while let Some(job) = self.rx.recv().await {
            self.handle_recovery(job).await;
        }
        info!("recovery worker stopped");
    }

    /// Apply the three recovery writes for one service.
    ///
    /// Each step is independently attempted; failures are logged and the
    /// remaining steps still run.
    async fn handle_recovery(&self, job: RecoveryJob) {
        let id = job.service_id;
        info!(service_id = id, "service recovered");

        match tokio::time::timeout(
            self.op_deadline,
            self.registry.mark_service_up(id, job.observed_at_ms),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(service_id = id, error = %e, "failed to mark service up"),
            Err(_) => warn!(service_id = id, "status write timed out"),
        }

        match tokio::time::timeout(
            self.op_deadline,
            self.registry
                .append_incident(NewIncident::came_up(id, now_millis())),
        )
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(service_id = id, error = %e, "failed to log recovery incident"),
            Err(_) => warn!(service_id = id, "recovery incident append timed out"),
        }

        // Defensive re-clear; ingestion already removed the id atomically,
        // and removing an absent member is a no-op.
        match tokio::time::timeout(self.op_deadline, self.liveness.clear_down(id)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(service_id = id, error = %e, "failed to clear down set"),
            Err(_) => warn!(service_id = id, "down set clear timed out"),
        }
    }
}
