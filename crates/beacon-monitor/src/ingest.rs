//! Heartbeat ingestion — the hot path.
//!
//! Updates the liveness record unconditionally, then runs the recovery
//! check. Only the liveness write can fail the call: heartbeats repeat
//! on their own cadence, so a dropped update self-heals within one
//! interval. Recovery bookkeeping is handed off to the worker channel
//! and never delays the caller.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use beacon_liveness::LivenessStore;
use beacon_registry::{ServiceId, now_millis};

use crate::error::{MonitorError, MonitorResult};
use crate::recovery::RecoveryJob;

/// Processes heartbeat reports from monitored services.
///
/// Safe to share across arbitrarily many concurrent callers; the only
/// synchronization with the detector is the liveness store's atomic
/// down-set test-and-delete.
pub struct HeartbeatIngestor {
    liveness: Arc<dyn LivenessStore>,
    recovery_tx: mpsc::UnboundedSender<RecoveryJob>,
}

impl HeartbeatIngestor {
    pub fn new(
        liveness: Arc<dyn LivenessStore>,
        recovery_tx: mpsc::UnboundedSender<RecoveryJob>,
    ) -> Self {
        Self {
            liveness,
            recovery_tx,
        }
    }

    /// Record a heartbeat for a service.
    ///
    /// Fails only when the id is invalid or the liveness write fails;
    /// a failed recovery check is logged and the heartbeat still
    /// succeeds.
    pub async fn report_heartbeat(&self, service_id: ServiceId) -> MonitorResult<()> {
        if service_id == 0 {
            return Err(MonitorError::InvalidServiceId(service_id));
        }

        let observed_at_ms = now_millis();
        self.liveness
            .record_heartbeat(service_id, observed_at_ms)
            .await?;
        debug!(service_id, "heartbeat recorded");

        // Recovery check. The atomic test-and-delete guarantees at most
        // one caller observes the id as present, so concurrent heartbeats
        // for a recently-recovered service enqueue a single job.
        match self.liveness.clear_down(service_id).await {
            Ok(true) => {
                let job = RecoveryJob {
                    service_id,
                    observed_at_ms,
                };
                if self.recovery_tx.send(job).is_err() {
                    warn!(service_id, "recovery worker unavailable, recovery not scheduled");
                }
            }
            Ok(false) => {}
            Err(e) => {
                warn!(service_id, error = %e, "recovery check failed");
            }
        }

        Ok(())
    }
}
