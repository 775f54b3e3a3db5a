//! Durable-or-ephemeral task store with runtime downgrade.
//!
//! [`TaskStore`] prefers the Redis backend when configured and reachable.
//! The first backend failure permanently downgrades the store to the
//! in-process [`MemoryBackend`] for the rest of the process lifetime -- no
//! reconnect attempts -- and starts the retention sweep for terminal
//! tasks. Every write is mirrored into the memory backend while durable
//! mode is active, so a mid-flight downgrade never loses records callers
//! could still poll.
//!
//! None of the public operations can fail: backend errors are logged,
//! converted into the downgrade, and the call proceeds via memory.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use genflow_core::{NewTask, PatchOutcome, Task, TaskId, TaskPatch, TaskStatus, TaskType};

use crate::backend::{BackendError, TaskBackend};
use crate::memory::MemoryBackend;
use crate::redis::RedisBackend;

/// Interval between ephemeral sweep passes.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Default maximum number of records returned by [`TaskStore::list`].
pub const DEFAULT_LIST_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Store construction parameters.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Durable backend URL; `None` selects ephemeral-only mode from start.
    pub redis_url: Option<String>,
    /// Key prefix for durable records.
    pub namespace: String,
    /// How long terminal tasks are retained before expiry.
    pub retention: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            namespace: "genflow".to_string(),
            retention: Duration::from_secs(3600),
        }
    }
}

// ---------------------------------------------------------------------------
// Mode / filters
// ---------------------------------------------------------------------------

/// Which backend currently serves reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    Durable,
    Ephemeral,
}

/// Equality filters for [`TaskStore::list`].
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    /// Maximum records returned; defaults to [`DEFAULT_LIST_LIMIT`].
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// TaskStore
// ---------------------------------------------------------------------------

/// Shared handle to the task repository.
///
/// Created once at startup and cloned into every component that reads or
/// mutates tasks.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    /// Always-on memory map: the ephemeral backend, and the fallback
    /// mirror while the durable backend is active.
    memory: MemoryBackend,
    /// Active durable backend; swapped to `None` on first failure.
    durable: RwLock<Option<Arc<dyn TaskBackend>>>,
    retention: Duration,
    sweep_interval: Duration,
    /// Cancellation token for the sweep loop, present once started.
    sweeper: Mutex<Option<CancellationToken>>,
}

impl TaskStore {
    /// Connect per `config`: durable when a URL is given and the server
    /// answers, ephemeral otherwise.
    pub async fn connect(config: StoreConfig) -> Self {
        let durable: Option<Arc<dyn TaskBackend>> = match &config.redis_url {
            Some(url) => match RedisBackend::connect(url, &config.namespace).await {
                Ok(backend) => {
                    tracing::info!(namespace = %config.namespace, "Task store connected to Redis");
                    Some(Arc::new(backend))
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Redis unavailable at startup, falling back to ephemeral task store"
                    );
                    None
                }
            },
            None => {
                tracing::info!("No durable backend configured, task store is ephemeral");
                None
            }
        };

        let store = Self::with_backend(durable, config.retention, SWEEP_INTERVAL);
        if store.mode().await == StoreMode::Ephemeral {
            store.start_sweeper().await;
        }
        store
    }

    /// Assemble a store around an explicit durable backend (or none).
    fn with_backend(
        durable: Option<Arc<dyn TaskBackend>>,
        retention: Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                memory: MemoryBackend::new(),
                durable: RwLock::new(durable),
                retention,
                sweep_interval,
                sweeper: Mutex::new(None),
            }),
        }
    }

    // -- public operations --------------------------------------------------

    /// Create a new task record.
    ///
    /// Never fails observably: a durable write error downgrades the store
    /// and the record lives on in memory.
    pub async fn create(&self, new: NewTask) -> Task {
        let task = Task::new(new, Utc::now());

        self.inner.memory.insert(task.clone()).await;
        if let Some(backend) = self.active_durable().await {
            if let Err(e) = backend.put(&task, None).await {
                self.downgrade("create", e).await;
            }
        }

        tracing::debug!(task_id = %task.id, task_type = %task.task_type, "Task created");
        task
    }

    /// Fetch a task by id. `None` when missing or already expired.
    pub async fn get(&self, id: TaskId) -> Option<Task> {
        if let Some(backend) = self.active_durable().await {
            match backend.get(id).await {
                Ok(found) => return found,
                Err(e) => self.downgrade("get", e).await,
            }
        }
        self.inner.memory.fetch(id).await
    }

    /// Merge `patch` over an existing task.
    ///
    /// No-op returning `None` when the task does not exist. A terminal
    /// merged status installs the retention expiry on the durable record.
    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> Option<Task> {
        let mut task = self.get(id).await?;
        let requested = patch.status;

        if task.apply(patch, Utc::now()) == PatchOutcome::StatusRejected {
            tracing::warn!(
                task_id = %id,
                current = %task.status,
                requested = ?requested,
                "Ignoring status transition the state machine forbids"
            );
        }

        let expire_after = task.status.is_terminal().then_some(self.inner.retention);

        self.inner.memory.insert(task.clone()).await;
        if let Some(backend) = self.active_durable().await {
            if let Err(e) = backend.put(&task, expire_after).await {
                self.downgrade("update", e).await;
            }
        }
        Some(task)
    }

    /// List tasks matching `filter`, newest first.
    pub async fn list(&self, filter: TaskFilter) -> Vec<Task> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT);

        let mut tasks = match self.active_durable().await {
            Some(backend) => match self.list_durable(backend.as_ref()).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    self.downgrade("list", e).await;
                    self.inner.memory.fetch_all().await
                }
            },
            None => self.inner.memory.fetch_all().await,
        };

        tasks.retain(|task| {
            filter.status.is_none_or(|status| task.status == status)
                && filter.task_type.is_none_or(|ty| task.task_type == ty)
        });
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit);
        tasks
    }

    /// Remove a record and its index entry. Idempotent.
    pub async fn delete(&self, id: TaskId) {
        self.inner.memory.discard(id).await;
        if let Some(backend) = self.active_durable().await {
            if let Err(e) = backend.remove(id).await {
                self.downgrade("delete", e).await;
            }
        }
        tracing::debug!(task_id = %id, "Task deleted");
    }

    /// Which backend currently serves this store.
    pub async fn mode(&self) -> StoreMode {
        if self.inner.durable.read().await.is_some() {
            StoreMode::Durable
        } else {
            StoreMode::Ephemeral
        }
    }

    /// Stop the sweep loop. Called during graceful shutdown.
    pub async fn shutdown(&self) {
        if let Some(cancel) = self.inner.sweeper.lock().await.take() {
            cancel.cancel();
        }
    }

    // -- internals -----------------------------------------------------------

    /// Clone of the active durable backend, if any.
    async fn active_durable(&self) -> Option<Arc<dyn TaskBackend>> {
        self.inner.durable.read().await.clone()
    }

    /// Durable listing: enumerate the index, batch-fetch the records, and
    /// opportunistically prune ids whose records have already expired.
    async fn list_durable(&self, backend: &dyn TaskBackend) -> Result<Vec<Task>, BackendError> {
        let ids = backend.ids().await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = backend.get_many(&ids).await?;
        let mut tasks = Vec::with_capacity(records.len());
        let mut stale = Vec::new();
        for (id, record) in ids.into_iter().zip(records) {
            match record {
                Some(task) => tasks.push(task),
                None => stale.push(id),
            }
        }

        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), "Pruning expired ids from task index");
            backend.prune_ids(&stale).await?;
        }
        Ok(tasks)
    }

    /// One-way switch to the ephemeral backend.
    ///
    /// Drops the durable reference so every subsequent call serves from
    /// memory, then starts the sweep loop.
    async fn downgrade(&self, operation: &str, err: BackendError) {
        {
            let mut durable = self.inner.durable.write().await;
            if durable.take().is_some() {
                tracing::error!(
                    operation,
                    error = %err,
                    "Durable task store failed, downgrading to ephemeral mode"
                );
            }
        }
        self.start_sweeper().await;
    }

    /// Spawn the periodic retention sweep. Subsequent calls are no-ops.
    async fn start_sweeper(&self) {
        let mut sweeper = self.inner.sweeper.lock().await;
        if sweeper.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        *sweeper = Some(cancel.clone());

        let store = self.clone();
        let interval = self.inner.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // interval fires immediately on the first tick.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let swept = store
                            .inner
                            .memory
                            .sweep_expired(store.inner.retention, Utc::now())
                            .await;
                        if swept > 0 {
                            tracing::info!(count = swept, "Swept expired terminal tasks");
                        }
                    }
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex as TestMutex;

    use super::*;

    fn new_task(task_type: TaskType) -> NewTask {
        NewTask {
            task_type,
            status: None,
            callback_url: None,
            model: None,
            prompt: None,
        }
    }

    fn ephemeral_store() -> TaskStore {
        TaskStore::with_backend(None, Duration::from_secs(3600), Duration::from_secs(300))
    }

    /// Durable backend whose every operation fails, for downgrade tests.
    struct FailingBackend;

    fn simulated_error() -> BackendError {
        BackendError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "simulated backend failure",
        )))
    }

    #[async_trait]
    impl TaskBackend for FailingBackend {
        async fn put(&self, _: &Task, _: Option<Duration>) -> Result<(), BackendError> {
            Err(simulated_error())
        }
        async fn get(&self, _: TaskId) -> Result<Option<Task>, BackendError> {
            Err(simulated_error())
        }
        async fn get_many(&self, _: &[TaskId]) -> Result<Vec<Option<Task>>, BackendError> {
            Err(simulated_error())
        }
        async fn remove(&self, _: TaskId) -> Result<(), BackendError> {
            Err(simulated_error())
        }
        async fn ids(&self) -> Result<Vec<TaskId>, BackendError> {
            Err(simulated_error())
        }
        async fn prune_ids(&self, _: &[TaskId]) -> Result<(), BackendError> {
            Err(simulated_error())
        }
    }

    /// Delegates to a [`MemoryBackend`] but reports extra stale ids and
    /// records what gets pruned.
    struct StaleIndexBackend {
        records: MemoryBackend,
        stale_id: TaskId,
        pruned: TestMutex<Vec<TaskId>>,
    }

    #[async_trait]
    impl TaskBackend for StaleIndexBackend {
        async fn put(&self, task: &Task, ttl: Option<Duration>) -> Result<(), BackendError> {
            self.records.put(task, ttl).await
        }
        async fn get(&self, id: TaskId) -> Result<Option<Task>, BackendError> {
            self.records.get(id).await
        }
        async fn get_many(&self, ids: &[TaskId]) -> Result<Vec<Option<Task>>, BackendError> {
            self.records.get_many(ids).await
        }
        async fn remove(&self, id: TaskId) -> Result<(), BackendError> {
            self.records.remove(id).await
        }
        async fn ids(&self) -> Result<Vec<TaskId>, BackendError> {
            let mut ids = self.records.ids().await?;
            ids.push(self.stale_id);
            Ok(ids)
        }
        async fn prune_ids(&self, stale: &[TaskId]) -> Result<(), BackendError> {
            self.pruned.lock().await.extend_from_slice(stale);
            Ok(())
        }
    }

    // -- create / get / update ------------------------------------------------

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = ephemeral_store();

        let created = store.create(new_task(TaskType::Image)).await;
        let fetched = store.get(created.id).await.unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn get_unknown_id_returns_none() {
        let store = ephemeral_store();

        assert_matches!(store.get(TaskId::new_v4()).await, None);
    }

    #[tokio::test]
    async fn update_completed_round_trips_result() {
        let store = ephemeral_store();
        let task = store.create(new_task(TaskType::Video)).await;

        store
            .update(task.id, TaskPatch::completed(json!({"outputs": ["u1"]})))
            .await
            .unwrap();

        let fetched = store.get(task.id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Completed);
        assert_eq!(fetched.result, Some(json!({"outputs": ["u1"]})));
        assert!(fetched.error.is_none());
        assert!(fetched.completed_at.is_some());
    }

    #[tokio::test]
    async fn update_unknown_id_is_noop() {
        let store = ephemeral_store();

        let updated = store
            .update(TaskId::new_v4(), TaskPatch::status(TaskStatus::Processing))
            .await;

        assert_matches!(updated, None);
    }

    #[tokio::test]
    async fn terminal_status_survives_later_updates() {
        let store = ephemeral_store();
        let task = store.create(new_task(TaskType::Image)).await;
        store
            .update(task.id, TaskPatch::failed("out of VRAM"))
            .await
            .unwrap();

        // A racing processing update must not resurrect the task.
        let after = store
            .update(task.id, TaskPatch::status(TaskStatus::Processing))
            .await
            .unwrap();

        assert_eq!(after.status, TaskStatus::Failed);
        assert_eq!(after.error.as_deref(), Some("out of VRAM"));
    }

    // -- list -----------------------------------------------------------------

    #[tokio::test]
    async fn list_filters_by_status_and_type() {
        let store = ephemeral_store();
        let image = store.create(new_task(TaskType::Image)).await;
        let video = store.create(new_task(TaskType::Video)).await;
        store
            .update(video.id, TaskPatch::status(TaskStatus::Processing))
            .await;

        let images = store
            .list(TaskFilter {
                task_type: Some(TaskType::Image),
                ..TaskFilter::default()
            })
            .await;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, image.id);

        let processing = store
            .list(TaskFilter {
                status: Some(TaskStatus::Processing),
                ..TaskFilter::default()
            })
            .await;
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, video.id);
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_truncates() {
        let store = ephemeral_store();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(store.create(new_task(TaskType::Image)).await.id);
        }

        let listed = store
            .list(TaskFilter {
                limit: Some(2),
                ..TaskFilter::default()
            })
            .await;

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, ids[2]);
        assert_eq!(listed[1].id, ids[1]);
    }

    #[tokio::test]
    async fn list_prunes_stale_index_entries() {
        let stale_id = TaskId::new_v4();
        let backend = Arc::new(StaleIndexBackend {
            records: MemoryBackend::new(),
            stale_id,
            pruned: TestMutex::new(Vec::new()),
        });
        let store = TaskStore::with_backend(
            Some(backend.clone()),
            Duration::from_secs(3600),
            Duration::from_secs(300),
        );
        let task = store.create(new_task(TaskType::Image)).await;

        let listed = store.list(TaskFilter::default()).await;

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, task.id);
        assert_eq!(backend.pruned.lock().await.as_slice(), &[stale_id]);
    }

    // -- delete ---------------------------------------------------------------

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = ephemeral_store();
        let task = store.create(new_task(TaskType::Image)).await;

        store.delete(task.id).await;
        store.delete(task.id).await;

        assert_matches!(store.get(task.id).await, None);
    }

    // -- downgrade ------------------------------------------------------------

    #[tokio::test]
    async fn backend_failure_downgrades_to_ephemeral() {
        let store = TaskStore::with_backend(
            Some(Arc::new(FailingBackend)),
            Duration::from_secs(3600),
            Duration::from_secs(300),
        );
        assert_eq!(store.mode().await, StoreMode::Durable);

        // The durable write fails, but the create still succeeds.
        let task = store.create(new_task(TaskType::Image)).await;

        assert_eq!(store.mode().await, StoreMode::Ephemeral);
        // The record stayed reachable through the memory mirror.
        assert!(store.get(task.id).await.is_some());

        // Subsequent operations keep working without a durable backend.
        let second = store.create(new_task(TaskType::Video)).await;
        assert!(store.get(second.id).await.is_some());
        assert_eq!(store.list(TaskFilter::default()).await.len(), 2);
    }

    #[tokio::test]
    async fn connect_without_url_is_ephemeral() {
        let store = TaskStore::connect(StoreConfig::default()).await;

        assert_eq!(store.mode().await, StoreMode::Ephemeral);
        store.shutdown().await;
    }

    // -- sweep ----------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_expired_terminal_tasks() {
        let store = TaskStore::with_backend(
            None,
            // Zero retention: terminal tasks expire at the next sweep.
            Duration::from_secs(0),
            Duration::from_millis(50),
        );
        store.start_sweeper().await;

        let task = store.create(new_task(TaskType::Image)).await;
        store
            .update(task.id, TaskPatch::completed(json!({"outputs": []})))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_matches!(store.get(task.id).await, None);
        store.shutdown().await;
    }
}
