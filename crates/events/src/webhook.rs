//! Webhook delivery of terminal task snapshots.
//!
//! [`WebhookNotifier`] POSTs a JSON-encoded snapshot of a finished
//! [`Task`] to an external URL. Failed attempts are retried on a fixed
//! backoff schedule (5 s, 15 s, 30 s -- four attempts in total), after
//! which the failure is logged and dropped. Delivery is at-least-once
//! best effort: it never raises to the caller and never mutates task
//! state.

use std::time::Duration;

use genflow_core::{Task, TaskId, TaskStatus};

/// Retry delays between delivery attempts.
const RETRY_DELAYS_SECS: [u64; 3] = [5, 15, 30];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the event tag, e.g. `task.completed`.
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// Header carrying the task id, for receiver-side routing and dedup.
pub const TASK_ID_HEADER: &str = "X-Task-Id";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server answered outside the accepted `[200, 400)` range.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Build the webhook payload for a task's terminal snapshot.
///
/// `result` appears only for completed tasks and `error` only for failed
/// ones; receivers can rely on the two never showing up together.
pub fn terminal_payload(task: &Task) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "task_id": task.id,
        "type": task.task_type,
        "status": task.status,
        "model": task.model,
        "prompt": task.prompt,
        "created_at": task.created_at,
        "updated_at": task.updated_at,
    });

    if let Some(done) = task.completed_at {
        payload["completed_at"] = serde_json::json!(done);
    }
    if task.status == TaskStatus::Completed {
        if let Some(result) = &task.result {
            payload["result"] = result.clone();
        }
    }
    if task.status == TaskStatus::Failed {
        if let Some(error) = &task.error {
            payload["error"] = serde_json::json!(error);
        }
    }
    payload
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

/// Delivers terminal task snapshots to external webhook endpoints.
pub struct WebhookNotifier {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl WebhookNotifier {
    /// Create a notifier with the standard retry schedule.
    pub fn new() -> Self {
        let retry_delays = RETRY_DELAYS_SECS.iter().map(|s| Duration::from_secs(*s)).collect();
        Self::with_retry_delays(retry_delays)
    }

    /// Create a notifier with an explicit retry schedule.
    fn with_retry_delays(retry_delays: Vec<Duration>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            retry_delays,
        }
    }

    /// Deliver the terminal snapshot of `task` to `url`.
    ///
    /// Best effort: retries on the backoff schedule, then logs and gives
    /// up. Never returns an error and never touches the task record.
    pub async fn notify(&self, url: &str, task: &Task) {
        let event = format!("task.{}", task.status);
        let payload = terminal_payload(task);

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(url, &event, task.id, &payload).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        task_id = %task.id,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        if let Err(e) = self.try_send(url, &event, task.id, &payload).await {
            tracing::error!(
                url,
                task_id = %task.id,
                error = %e,
                "Webhook delivery failed after all retries"
            );
        }
    }

    /// Execute a single POST request and check the response status.
    ///
    /// Any status in `[200, 400)` counts as delivered.
    async fn try_send(
        &self,
        url: &str,
        event: &str,
        task_id: TaskId,
        payload: &serde_json::Value,
    ) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url)
            .header(EVENT_HEADER, event)
            .header(TASK_ID_HEADER, task_id.to_string())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(WebhookError::HttpStatus(status.as_u16()))
        }
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
