use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use genflow_store::StoreMode;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Active task-store backend: `durable` or `ephemeral`.
    pub store_mode: StoreMode,
}

/// GET /health -- returns service status and the task store mode.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_mode = state.store.mode().await;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store_mode,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
