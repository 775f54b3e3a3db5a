//! Storage backend seam for task records.
//!
//! Two implementations exist: [`RedisBackend`](crate::RedisBackend)
//! (durable, native per-key expiry) and
//! [`MemoryBackend`](crate::MemoryBackend) (ephemeral, swept by the
//! store). The store holds the active durable implementation behind this
//! trait so it can swap it out at runtime after a failure.

use std::time::Duration;

use async_trait::async_trait;
use genflow_core::{Task, TaskId};

/// Error type for storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The Redis server rejected or dropped an operation.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A task record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Narrow persistence interface over task records.
///
/// `expire_after` is honoured only by backends with native expiry; the
/// memory backend ignores it and relies on the store's sweep instead.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Insert or replace a record and ensure its id is indexed.
    async fn put(&self, task: &Task, expire_after: Option<Duration>) -> Result<(), BackendError>;

    /// Fetch a record by id.
    async fn get(&self, id: TaskId) -> Result<Option<Task>, BackendError>;

    /// Fetch many records at once; the result aligns index-wise with `ids`.
    async fn get_many(&self, ids: &[TaskId]) -> Result<Vec<Option<Task>>, BackendError>;

    /// Remove a record and its index entry. Idempotent.
    async fn remove(&self, id: TaskId) -> Result<(), BackendError>;

    /// All ids currently present in the enumeration index.
    async fn ids(&self) -> Result<Vec<TaskId>, BackendError>;

    /// Drop stale ids from the enumeration index.
    async fn prune_ids(&self, stale: &[TaskId]) -> Result<(), BackendError>;
}
