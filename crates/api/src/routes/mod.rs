pub mod health;
pub mod queue;
pub mod tasks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /tasks                   GET list, POST create-and-submit
/// /tasks/{id}              GET fetch, DELETE remove
/// /tasks/{id}/cancel       POST cancel while queued
///
/// /queue                   GET scheduler counters
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/tasks", tasks::router())
        .nest("/queue", queue::router())
}
