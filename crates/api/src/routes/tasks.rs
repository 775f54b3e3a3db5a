//! Routes for the `/tasks` resource.
//!
//! Creation submits the generation job in the same call; everything the
//! job does afterwards is observable through polling these endpoints or
//! via the task's `callback_url`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use genflow_core::{CoreError, NewTask, TaskId, TaskPatch, TaskStatus, TaskType};
use genflow_store::TaskFilter;

use crate::engine::runner;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for POST /tasks.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub model: Option<String>,
    pub prompt: Option<String>,
    /// Webhook destination for the terminal snapshot.
    pub callback_url: Option<String>,
}

/// Query parameters for GET /tasks.
#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    /// Maximum number of results. Defaults to 100.
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/tasks
///
/// Create a task and submit its generation job. Responds 202: the job
/// runs (or waits for a slot) asynchronously; poll the task or supply a
/// `callback_url` to learn its outcome.
pub async fn create_task(
    State(state): State<AppState>,
    Json(input): Json<CreateTaskRequest>,
) -> AppResult<impl IntoResponse> {
    if let Some(url) = &input.callback_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::BadRequest(
                "callback_url must be an http(s) URL".into(),
            ));
        }
    }

    let task = state
        .store
        .create(NewTask {
            task_type: input.task_type,
            status: None,
            callback_url: input.callback_url,
            model: input.model,
            prompt: input.prompt,
        })
        .await;

    let task = runner::submit(&state, task).await;

    tracing::info!(task_id = %task.id, task_type = %task.task_type, status = %task.status, "Task submitted");

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: task })))
}

/// GET /api/v1/tasks
///
/// List tasks, newest first, with optional status/type equality filters.
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> AppResult<impl IntoResponse> {
    let tasks = state
        .store
        .list(TaskFilter {
            status: query.status,
            task_type: query.task_type,
            limit: query.limit,
        })
        .await;

    Ok(Json(DataResponse { data: tasks }))
}

/// GET /api/v1/tasks/{id}
///
/// Fetch one task; 404 when unknown or already expired.
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    let task = state
        .store
        .get(id)
        .await
        .ok_or(CoreError::TaskNotFound(id))?;

    Ok(Json(DataResponse { data: task }))
}

/// DELETE /api/v1/tasks/{id}
///
/// Remove a task record. Idempotent; always 204.
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    state.store.delete(id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/tasks/{id}/cancel
///
/// Cancel a job still waiting in the queue. A job that already started
/// runs to completion; cancelling it answers 409.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    let task = state
        .store
        .get(id)
        .await
        .ok_or(CoreError::TaskNotFound(id))?;

    if !state.queue.cancel_queued(id).await {
        return Err(CoreError::Conflict(format!(
            "Task {id} can no longer be cancelled (status: {})",
            task.status
        ))
        .into());
    }

    let cancelled = state
        .store
        .update(
            id,
            TaskPatch::status(TaskStatus::Cancelled).with_progress("Cancelled before execution"),
        )
        .await
        .ok_or(CoreError::TaskNotFound(id))?;

    // Cancellation is terminal, so the webhook fires like any other end
    // state. Delivery retries must not block the response.
    if let Some(url) = cancelled.callback_url.clone() {
        let notifier = Arc::clone(&state.notifier);
        let snapshot = cancelled.clone();
        tokio::spawn(async move {
            notifier.notify(&url, &snapshot).await;
        });
    }

    tracing::info!(task_id = %id, "Task cancelled while queued");

    Ok(Json(DataResponse { data: cancelled }))
}

/// Routes mounted at `/tasks`.
///
/// ```text
/// GET    /                -> list_tasks
/// POST   /                -> create_task
/// GET    /{id}            -> get_task
/// DELETE /{id}            -> delete_task
/// POST   /{id}/cancel     -> cancel_task
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/{id}", get(get_task).delete(delete_task))
        .route("/{id}/cancel", post(cancel_task))
}
