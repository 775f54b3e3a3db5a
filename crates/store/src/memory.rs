//! In-process ephemeral task backend.
//!
//! [`MemoryBackend`] is a plain map behind a [`tokio::sync::RwLock`]. It
//! serves two roles: the ephemeral backend once the store runs without
//! Redis, and the always-on mirror that keeps records reachable across a
//! runtime downgrade. It has no native expiry; the store's sweep calls
//! [`MemoryBackend::sweep_expired`] instead.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use genflow_core::{Task, TaskId, Timestamp};

use crate::backend::{BackendError, TaskBackend};

/// Memory-resident task map.
#[derive(Default)]
pub struct MemoryBackend {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub async fn insert(&self, task: Task) {
        self.tasks.write().await.insert(task.id, task);
    }

    /// Fetch a record by id.
    pub async fn fetch(&self, id: TaskId) -> Option<Task> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// Snapshot of every record, in no particular order.
    pub async fn fetch_all(&self) -> Vec<Task> {
        self.tasks.read().await.values().cloned().collect()
    }

    /// Remove a record. Idempotent.
    pub async fn discard(&self, id: TaskId) {
        self.tasks.write().await.remove(&id);
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Remove terminal tasks whose `completed_at` predates
    /// `now - retention`. Returns the number of records dropped.
    pub async fn sweep_expired(&self, retention: Duration, now: Timestamp) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = now - retention;

        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, task| {
            !(task.status.is_terminal()
                && task.completed_at.is_some_and(|done| done < cutoff))
        });
        before - tasks.len()
    }
}

#[async_trait]
impl TaskBackend for MemoryBackend {
    async fn put(&self, task: &Task, _expire_after: Option<Duration>) -> Result<(), BackendError> {
        self.insert(task.clone()).await;
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, BackendError> {
        Ok(self.fetch(id).await)
    }

    async fn get_many(&self, ids: &[TaskId]) -> Result<Vec<Option<Task>>, BackendError> {
        let tasks = self.tasks.read().await;
        Ok(ids.iter().map(|id| tasks.get(id).cloned()).collect())
    }

    async fn remove(&self, id: TaskId) -> Result<(), BackendError> {
        self.discard(id).await;
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<TaskId>, BackendError> {
        Ok(self.tasks.read().await.keys().copied().collect())
    }

    async fn prune_ids(&self, _stale: &[TaskId]) -> Result<(), BackendError> {
        // Records and index are one and the same map; nothing to prune.
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
