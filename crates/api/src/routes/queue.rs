//! Routes for queue observability.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/queue
///
/// Instantaneous scheduler counters: running, queued, and the budget.
pub async fn queue_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = state.queue.stats().await;
    Ok(Json(DataResponse { data: stats }))
}

/// Routes mounted at `/queue`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(queue_stats))
}
