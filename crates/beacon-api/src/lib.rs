//! beacon-api — REST API for Beacon.
//!
//! Provides axum route handlers for service registration, incident
//! history, and the current down-set view. Heartbeat ingestion has its
//! own listener in `beacon-monitor` and is not mounted here.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/services` | List all registered services |
//! | POST | `/api/v1/services` | Register a service |
//! | GET | `/api/v1/services/:id` | Get a service row |
//! | DELETE | `/api/v1/services/:id` | Deregister a service |
//! | GET | `/api/v1/services/:id/incidents` | Incident history, newest first |
//! | GET | `/api/v1/incidents` | Recent incidents across services |
//! | GET | `/api/v1/down` | Services currently believed down |
//! | GET | `/api/v1/healthz` | Registry reachability check |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use beacon_liveness::LivenessStore;
use beacon_registry::RegistryStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: RegistryStore,
    pub liveness: Arc<dyn LivenessStore>,
}

/// Build the complete API router.
pub fn build_router(registry: RegistryStore, liveness: Arc<dyn LivenessStore>) -> Router {
    let state = ApiState { registry, liveness };

    let api_routes = Router::new()
        .route(
            "/services",
            get(handlers::list_services).post(handlers::register_service),
        )
        .route(
            "/services/{id}",
            get(handlers::get_service).delete(handlers::deregister_service),
        )
        .route("/services/{id}/incidents", get(handlers::service_incidents))
        .route("/incidents", get(handlers::recent_incidents))
        .route("/down", get(handlers::down_services))
        .route("/healthz", get(handlers::healthz))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
