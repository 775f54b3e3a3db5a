//! Task entity, status state machine, and patch semantics.
//!
//! A [`Task`] is the unit of asynchronous generation work. Records are
//! stored as JSON documents, so every field serializes with its wire name
//! (`type` for the job kind, snake_case statuses). All lifecycle mutation
//! flows through [`Task::apply`], which enforces the forward-only status
//! machine and the terminal bookkeeping invariants.

use serde::{Deserialize, Serialize};

use crate::types::{TaskId, Timestamp};

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a task.
///
/// Statuses only move forward: `pending -> queued -> processing`, with a
/// jump into exactly one terminal status (`completed`, `failed`,
/// `cancelled`) allowed from any non-terminal state. Terminal statuses
/// accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal (no further transitions).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether a transition from `self` to `next` is permitted.
    ///
    /// Re-asserting the current status is allowed; [`Task::apply`] treats
    /// it as a no-op.
    pub fn can_transition(self, next: TaskStatus) -> bool {
        if self == next {
            return true;
        }
        match self {
            TaskStatus::Pending => true,
            TaskStatus::Queued => next != TaskStatus::Pending,
            TaskStatus::Processing => next.is_terminal(),
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => false,
        }
    }

    /// Lowercase wire name, e.g. `"processing"`.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TaskType
// ---------------------------------------------------------------------------

/// Kind of generation job.
///
/// Carried for reporting and webhook payloads only; the queue and store
/// never interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Image,
    Video,
    Composition,
}

impl TaskType {
    /// Lowercase wire name, e.g. `"image"`.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Image => "image",
            TaskType::Video => "video",
            TaskType::Composition => "composition",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of asynchronous generation work.
///
/// Invariants maintained by [`Task::new`] and [`Task::apply`]:
///
/// - `id` never changes.
/// - `status` only moves forward through the state machine.
/// - `completed_at` is present iff `status` is terminal, stamped once.
/// - `result` is present only when `status` is `completed`; `error` only
///   when `status` is `failed`.
/// - `callback_url`, `model`, and `prompt` are immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    /// Free-text progress hint, overwritten freely during execution.
    pub progress: Option<String>,
    /// Opaque result payload, set on transition to `completed`.
    pub result: Option<serde_json::Value>,
    /// Failure description, set on transition to `failed`.
    pub error: Option<String>,
    /// Webhook destination for the terminal snapshot, if any.
    pub callback_url: Option<String>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Fields supplied by the caller when creating a task.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Initial status; defaults to [`TaskStatus::Pending`].
    pub status: Option<TaskStatus>,
    pub callback_url: Option<String>,
    pub model: Option<String>,
    pub prompt: Option<String>,
}

/// Partial update merged over an existing task by [`Task::apply`].
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub progress: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl TaskPatch {
    /// Patch that only requests a status change.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch transitioning into `completed` with a result payload.
    pub fn completed(result: serde_json::Value) -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            result: Some(result),
            ..Self::default()
        }
    }

    /// Patch transitioning into `failed` with an error description.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attach a progress hint to the patch.
    pub fn with_progress(mut self, progress: impl Into<String>) -> Self {
        self.progress = Some(progress.into());
        self
    }
}

/// Result of applying a [`TaskPatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// All requested changes were applied.
    Applied,
    /// The requested status change violated the state machine and was
    /// skipped; the remaining fields were still applied.
    StatusRejected,
}

impl Task {
    /// Build a fresh task from caller-supplied fields.
    ///
    /// Assigns a new id, stamps both timestamps with `now`, and defaults
    /// the status to [`TaskStatus::Pending`].
    pub fn new(new: NewTask, now: Timestamp) -> Self {
        Self {
            id: TaskId::new_v4(),
            task_type: new.task_type,
            status: new.status.unwrap_or(TaskStatus::Pending),
            progress: None,
            result: None,
            error: None,
            callback_url: new.callback_url,
            model: new.model,
            prompt: new.prompt,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Merge `patch` over this task, enforcing the state machine.
    ///
    /// `updated_at` is always bumped to `now`. A status change the machine
    /// forbids is skipped (reported via [`PatchOutcome::StatusRejected`])
    /// while the other fields still apply. `result` is only accepted
    /// together with the transition into `completed`, `error` only with
    /// `failed`, and `completed_at` is stamped once, on the first
    /// transition into a terminal status.
    pub fn apply(&mut self, patch: TaskPatch, now: Timestamp) -> PatchOutcome {
        let TaskPatch {
            status,
            progress,
            result,
            error,
        } = patch;

        let mut outcome = PatchOutcome::Applied;
        match status {
            Some(next) if self.status.can_transition(next) => {
                let entering_terminal = next.is_terminal() && !self.status.is_terminal();
                self.status = next;
                if entering_terminal {
                    self.completed_at = Some(now);
                    match next {
                        TaskStatus::Completed => {
                            self.result = result;
                            self.error = None;
                        }
                        TaskStatus::Failed => {
                            self.error = error;
                            self.result = None;
                        }
                        _ => {}
                    }
                }
            }
            Some(_) => outcome = PatchOutcome::StatusRejected,
            None => {}
        }

        if let Some(progress) = progress {
            self.progress = Some(progress);
        }
        self.updated_at = now;
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
