//! sizing-api — read-only REST API for the cluster sizing controller.
//!
//! Serves the state the controller persists: the configuration status
//! condition, per-cluster sizing records and the fleet transition ledger.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/status` | Conditions and fleet summary |
//! | GET | `/api/v1/clusters` | List cluster sizing records |
//! | GET | `/api/v1/clusters/{id}` | Get one cluster's record |
//! | GET | `/api/v1/ledger` | Committed transitions still on record |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use sizing_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
}

/// Build the API router.
pub fn build_router(store: StateStore) -> Router {
    let api_routes = Router::new()
        .route("/status", get(handlers::get_status))
        .route("/clusters", get(handlers::list_clusters))
        .route("/clusters/{id}", get(handlers::get_cluster))
        .route("/ledger", get(handlers::list_ledger))
        .with_state(ApiState { store });

    Router::new().nest("/api/v1", api_routes)
}
