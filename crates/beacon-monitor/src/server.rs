//! HTTP ingest surface for heartbeats.
//!
//! Mounted on its own listener, separate from the management API, so
//! heartbeat traffic never queues behind CRUD requests.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::MonitorError;
use crate::ingest::HeartbeatIngestor;

/// Body of `POST /v1/heartbeat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub service_id: u64,
}

/// Response envelope for the ingest endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build the ingest router.
pub fn build_ingest_router(ingestor: Arc<HeartbeatIngestor>) -> Router {
    Router::new()
        .route("/v1/heartbeat", post(report_heartbeat))
        .with_state(ingestor)
}

/// POST /v1/heartbeat
async fn report_heartbeat(
    State(ingestor): State<Arc<HeartbeatIngestor>>,
    Json(req): Json<HeartbeatRequest>,
) -> impl IntoResponse {
    match ingestor.report_heartbeat(req.service_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HeartbeatResponse {
                success: true,
                error: None,
            }),
        ),
        Err(e @ MonitorError::InvalidServiceId(_)) => (
            StatusCode::BAD_REQUEST,
            Json(HeartbeatResponse {
                success: false,
                error: Some(e.to_string()),
            }),
        ),
        Err(e) => {
            warn!(service_id = req.service_id, error = %e, "heartbeat write failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HeartbeatResponse {
                    success: false,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
