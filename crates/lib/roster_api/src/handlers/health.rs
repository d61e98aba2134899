//! Health endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use tracing::warn;

use crate::AppState;
use crate::error::AppError;
use crate::models::Envelope;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub store_reachable: bool,
    pub version: &'static str,
}

/// `GET /health`: reports store reachability; never fails.
pub async fn health_handler(State(state): State<AppState>) -> Json<Envelope<HealthResponse>> {
    let store_reachable = state.store.ping().await;
    if !store_reachable {
        warn!("health check: store unreachable");
    }
    Json(Envelope::ok(HealthResponse {
        status: if store_reachable { "ok" } else { "degraded" },
        store_reachable,
        version: roster_core::version(),
    }))
}

/// Fallback for unknown routes.
pub async fn not_found_handler() -> AppError {
    AppError::RouteNotFound
}
