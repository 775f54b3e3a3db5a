//! Redis-backed durable task storage.
//!
//! Records are stored as JSON strings under `<namespace>:task:<id>`, with
//! a secondary set `<namespace>:task_ids` for enumeration. A per-key TTL
//! is installed only once a task reaches a terminal status; Redis expiry
//! then removes the record without any sweep on our side. The index set
//! is reconciled lazily by [`TaskStore::list`](crate::TaskStore::list)
//! pruning ids whose records have expired.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use genflow_core::{Task, TaskId};

use crate::backend::{BackendError, TaskBackend};

/// Durable task backend over a single Redis connection manager.
///
/// The connection manager transparently re-establishes dropped
/// connections; an operation that still fails is surfaced as a
/// [`BackendError`] and triggers the store's downgrade.
pub struct RedisBackend {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisBackend {
    /// Connect to `url` and verify the server answers a PING.
    pub async fn connect(url: &str, namespace: &str) -> Result<Self, BackendError> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;

        Ok(Self {
            conn,
            namespace: namespace.to_string(),
        })
    }

    /// Key holding one task record.
    fn task_key(&self, id: TaskId) -> String {
        format!("{}:task:{}", self.namespace, id)
    }

    /// Key of the enumeration set holding all live task ids.
    fn index_key(&self) -> String {
        format!("{}:task_ids", self.namespace)
    }
}

#[async_trait]
impl TaskBackend for RedisBackend {
    async fn put(&self, task: &Task, expire_after: Option<Duration>) -> Result<(), BackendError> {
        let json = serde_json::to_string(task)?;
        let key = self.task_key(task.id);
        let mut conn = self.conn.clone();

        let _: () = conn.set(&key, json).await?;
        let _: () = conn.sadd(self.index_key(), task.id.to_string()).await?;
        if let Some(ttl) = expire_after {
            let _: () = conn.expire(&key, ttl.as_secs() as i64).await?;
        }
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, BackendError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.task_key(id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn get_many(&self, ids: &[TaskId]) -> Result<Vec<Option<Task>>, BackendError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| self.task_key(*id)).collect();
        let mut conn = self.conn.clone();
        let raw: Vec<Option<String>> = conn.mget(&keys).await?;

        Ok(raw
            .into_iter()
            .map(|record| {
                record.and_then(|json| match serde_json::from_str(&json) {
                    Ok(task) => Some(task),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unparseable task record");
                        None
                    }
                })
            })
            .collect())
    }

    async fn remove(&self, id: TaskId) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.task_key(id)).await?;
        let _: () = conn.srem(self.index_key(), id.to_string()).await?;
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<TaskId>, BackendError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(self.index_key()).await?;

        // Ignore malformed members rather than poisoning enumeration.
        Ok(members
            .iter()
            .filter_map(|member| member.parse().ok())
            .collect())
    }

    async fn prune_ids(&self, stale: &[TaskId]) -> Result<(), BackendError> {
        if stale.is_empty() {
            return Ok(());
        }
        let members: Vec<String> = stale.iter().map(ToString::to_string).collect();
        let mut conn = self.conn.clone();
        let _: () = conn.srem(self.index_key(), members).await?;
        Ok(())
    }
}
