//! Shared domain types for the genflow platform.
//!
//! This crate holds the task data model and its lifecycle state machine,
//! plus the common type aliases and error type used by every other crate.
//! It has no internal dependencies and no I/O.

pub mod error;
pub mod task;
pub mod types;

pub use error::CoreError;
pub use task::{NewTask, PatchOutcome, Task, TaskPatch, TaskStatus, TaskType};
pub use types::{TaskId, Timestamp};
