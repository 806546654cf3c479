//! REST API handlers.
//!
//! Each handler reads/writes via `RegistryStore` (and the liveness store
//! for the ephemeral views) and returns JSON responses.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::warn;

use beacon_registry::{NewService, ServiceId};

use crate::ApiState;

/// Default number of incident rows returned when no limit is given.
const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// Query parameters for incident history endpoints.
#[derive(serde::Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

// ── Services ───────────────────────────────────────────────────

/// GET /api/v1/services
pub async fn list_services(State(state): State<ApiState>) -> impl IntoResponse {
    match state.registry.list_services() {
        Ok(services) => ApiResponse::ok(services).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// POST /api/v1/services
pub async fn register_service(
    State(state): State<ApiState>,
    Json(req): Json<NewService>,
) -> impl IntoResponse {
    if req.name.is_empty() {
        return error_response("service name must not be empty", StatusCode::BAD_REQUEST)
            .into_response();
    }
    match state.registry.register_service(&req) {
        Ok(record) => (StatusCode::CREATED, ApiResponse::ok(record)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/services/:id
pub async fn get_service(
    State(state): State<ApiState>,
    Path(id): Path<ServiceId>,
) -> impl IntoResponse {
    match state.registry.get_service(id) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => error_response("service not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// DELETE /api/v1/services/:id
pub async fn deregister_service(
    State(state): State<ApiState>,
    Path(id): Path<ServiceId>,
) -> impl IntoResponse {
    match state.registry.delete_service(id) {
        Ok(true) => {
            // Clear ephemeral traces so the detector and the recovery
            // check forget the service too.
            if let Err(e) = state.liveness.remove_record(id).await {
                warn!(service_id = id, error = %e, "failed to remove liveness record");
            }
            if let Err(e) = state.liveness.clear_down(id).await {
                warn!(service_id = id, error = %e, "failed to clear down set");
            }
            ApiResponse::ok("deleted").into_response()
        }
        Ok(false) => error_response("service not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Incidents ──────────────────────────────────────────────────

/// GET /api/v1/services/:id/incidents
pub async fn service_incidents(
    State(state): State<ApiState>,
    Path(id): Path<ServiceId>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    match state.registry.list_incidents_for_service(id, limit) {
        Ok(incidents) => ApiResponse::ok(incidents).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/incidents
pub async fn recent_incidents(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    match state.registry.list_recent_incidents(limit) {
        Ok(incidents) => ApiResponse::ok(incidents).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Liveness views ─────────────────────────────────────────────

/// GET /api/v1/down
pub async fn down_services(State(state): State<ApiState>) -> impl IntoResponse {
    match state.liveness.down_services().await {
        Ok(ids) => ApiResponse::ok(ids).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/healthz
pub async fn healthz(State(state): State<ApiState>) -> impl IntoResponse {
    match state.registry.ping() {
        Ok(()) => ApiResponse::ok(serde_json::json!({"status": "ok"})).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use beacon_liveness::{LivenessStore, MemoryLivenessStore};
    use beacon_registry::{NewService, RegistryStore};

    use crate::build_router;

    fn test_stores() -> (RegistryStore, Arc<MemoryLivenessStore>) {
        (
            RegistryStore::open_in_memory().unwrap(),
            Arc::new(MemoryLivenessStore::new()),
        )
    }

    fn register_body(name: &str) -> Body {
        let req = NewService {
            name: name.to_string(),
            url: format!("http://{name}:8080"),
            region: "us-east-1".to_string(),
        };
        Body::from(serde_json::to_vec(&req).unwrap())
    }

    #[tokio::test]
    async fn register_and_fetch_service() {
        let (registry, liveness) = test_stores();
        let router = build_router(registry, liveness);

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/services")
            .header("content-type", "application/json")
            .body(register_body("auth"))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = Request::builder()
            .uri("/api/v1/services/1")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_service_is_not_found() {
        let (registry, liveness) = test_stores();
        let router = build_router(registry, liveness);

        let req = Request::builder()
            .uri("/api/v1/services/42")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_name_rejected() {
        let (registry, liveness) = test_stores();
        let router = build_router(registry, liveness);

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/services")
            .header("content-type", "application/json")
            .body(register_body(""))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deregister_clears_ephemeral_state() {
        let (registry, liveness) = test_stores();
        let svc = registry
            .register_service(&NewService {
                name: "auth".to_string(),
                url: "http://auth:8080".to_string(),
                region: "us-east-1".to_string(),
            })
            .unwrap();
        liveness.record_heartbeat(svc.id, 1000).await.unwrap();
        liveness.mark_down(svc.id).await.unwrap();

        let router = build_router(registry, liveness.clone());
        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/services/{}", svc.id))
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        assert!(liveness.snapshot().await.unwrap().is_empty());
        assert!(!liveness.is_down(svc.id).await.unwrap());
    }

    #[tokio::test]
    async fn down_view_reflects_liveness_store() {
        let (registry, liveness) = test_stores();
        liveness.mark_down(3).await.unwrap();
        liveness.mark_down(9).await.unwrap();

        let router = build_router(registry, liveness);
        let req = Request::builder()
            .uri("/api/v1/down")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), 4096).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"], serde_json::json!([3, 9]));
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let (registry, liveness) = test_stores();
        let router = build_router(registry, liveness);

        let req = Request::builder()
            .uri("/api/v1/healthz")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn incident_history_endpoint_honors_limit() {
        use beacon_registry::NewIncident;

        let (registry, liveness) = test_stores();
        for t in [1000u64, 2000, 3000] {
            registry.log_incident(&NewIncident::went_down(1, t)).unwrap();
        }

        let router = build_router(registry, liveness);
        let req = Request::builder()
            .uri("/api/v1/services/1/incidents?limit=2")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), 65536).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        // Newest first.
        assert_eq!(body["data"][0]["event_time"], 3000);
    }
}
