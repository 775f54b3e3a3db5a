//! Generation job runner.
//!
//! [`submit`] builds the job body for a freshly created task and hands it
//! to the queue. The body owns the whole lifecycle: `processing` on
//! start, the provider call, the terminal patch, and webhook delivery.
//! Every failure becomes task state or a log line; nothing escapes into
//! the queue or the HTTP layer.

use genflow_core::{Task, TaskPatch, TaskStatus};
use genflow_provider::GenerationRequest;
use genflow_queue::Admission;

use crate::state::AppState;

/// Submit the generation job for `task`.
///
/// Returns the freshest snapshot: unchanged when the job started
/// immediately, or `queued` with a position hint when the queue was at
/// capacity.
pub async fn submit(state: &AppState, task: Task) -> Task {
    let job = generation_job(state.clone(), task.clone());

    match state.queue.enqueue(task.id, job).await {
        Admission::Started => task,
        Admission::Queued { position } => state
            .store
            .update(
                task.id,
                TaskPatch::status(TaskStatus::Queued)
                    .with_progress(format!("Queued at position {position}")),
            )
            .await
            .unwrap_or(task),
    }
}

/// Build the job body for one task.
fn generation_job(
    state: AppState,
    task: Task,
) -> impl std::future::Future<Output = ()> + Send + 'static {
    async move {
        let task_id = task.id;

        state
            .store
            .update(
                task_id,
                TaskPatch::status(TaskStatus::Processing).with_progress("Generation started"),
            )
            .await;

        let request = GenerationRequest {
            task_type: task.task_type,
            model: task.model.clone(),
            prompt: task.prompt.clone(),
        };

        let patch = match state.provider.generate(request).await {
            Ok(outputs) => {
                tracing::info!(task_id = %task_id, outputs = outputs.len(), "Generation completed");
                TaskPatch::completed(serde_json::json!({ "outputs": outputs }))
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "Generation failed");
                TaskPatch::failed(e.to_string())
            }
        };

        let Some(finished) = state.store.update(task_id, patch).await else {
            // Deleted mid-flight; nothing left to report.
            return;
        };

        if let Some(url) = &finished.callback_url {
            state.notifier.notify(url, &finished).await;
        }
    }
}
