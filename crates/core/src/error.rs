use crate::types::TaskId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
