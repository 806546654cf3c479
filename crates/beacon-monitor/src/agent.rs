//! Heartbeat agent — client-side heartbeat loop.
//!
//! Runs alongside (or on behalf of) a monitored service and posts a
//! heartbeat to the monitor's ingest endpoint on a fixed interval. Send
//! failures are logged and retried on the next beat; the monitor's
//! detector tolerates a missed interval by design.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use beacon_registry::ServiceId;

use crate::server::{HeartbeatRequest, HeartbeatResponse};

/// Configuration for the heartbeat agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Address of the monitor's ingest listener (host:port).
    pub monitor_addr: String,
    /// The registered id this agent beats for.
    pub service_id: ServiceId,
    /// Beat interval. Should be well under the monitor's failure timeout.
    pub interval: Duration,
}

/// Posts periodic heartbeats for one service.
pub struct HeartbeatAgent {
    config: AgentConfig,
    client: reqwest::Client,
}

impl HeartbeatAgent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Run the heartbeat loop until the shutdown signal fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            service_id = self.config.service_id,
            monitor = %self.config.monitor_addr,
            interval = ?self.config.interval,
            "heartbeat agent started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {
                    self.beat().await;
                }
                _ = shutdown.changed() => {
                    info!(service_id = self.config.service_id, "heartbeat agent shutting down");
                    break;
                }
            }
        }
    }

    /// Send one heartbeat. Failures are logged; the next interval retries.
    async fn beat(&self) {
        let url = format!("http://{}/v1/heartbeat", self.config.monitor_addr);
        let request = HeartbeatRequest {
            service_id: self.config.service_id,
        };

        match self.client.post(&url).json(&request).send().await {
            Ok(resp) if resp.status().is_success() => {
                let ack = resp
                    .json::<HeartbeatResponse>()
                    .await
                    .map(|body| body.success)
                    .unwrap_or(false);
                debug!(service_id = self.config.service_id, ack, "heartbeat sent");
            }
            Ok(resp) => {
                warn!(
                    service_id = self.config.service_id,
                    status = %resp.status(),
                    "heartbeat rejected"
                );
            }
            Err(e) => {
                warn!(service_id = self.config.service_id, error = %e, "heartbeat failed");
            }
        }
    }
}
