//! REST API handlers.
//!
//! Each handler reads via `StateStore` and returns JSON responses.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use sizing_core::{Condition, Timestamp};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
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

/// Controller status as served by `GET /api/v1/status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetStatus {
    pub conditions: Vec<Condition>,
    pub clusters: usize,
    /// Clusters with a size transition waiting out its delay or a slot.
    pub pending: usize,
    /// Committed size → number of clusters.
    pub sizes: BTreeMap<String, usize>,
    pub ledger_entries: usize,
    pub last_transition_at: Option<Timestamp>,
}

fn fleet_status(state: &ApiState) -> Result<FleetStatus, sizing_state::StateError> {
    let conditions = state.store.get_conditions()?;
    let clusters = state.store.list_clusters()?;
    let ledger = state.store.list_transitions()?;

    let mut sizes = BTreeMap::new();
    for size in clusters.iter().filter_map(|c| c.state.current_size.clone()) {
        *sizes.entry(size).or_insert(0) += 1;
    }

    Ok(FleetStatus {
        conditions,
        clusters: clusters.len(),
        pending: clusters.iter().filter(|c| c.state.is_pending()).count(),
        sizes,
        ledger_entries: ledger.len(),
        last_transition_at: ledger.last().map(|r| r.committed_at),
    })
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> impl IntoResponse {
    match fleet_status(&state) {
        Ok(status) => ApiResponse::ok(status).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Clusters ───────────────────────────────────────────────────

/// GET /api/v1/clusters
pub async fn list_clusters(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_clusters() {
        Ok(clusters) => ApiResponse::ok(clusters).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/clusters/{id}
pub async fn get_cluster(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_cluster(&id) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => error_response("cluster not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Ledger ─────────────────────────────────────────────────────

/// GET /api/v1/ledger
pub async fn list_ledger(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_transitions() {
        Ok(records) => ApiResponse::ok(records).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}
