//! Admission-controlled FIFO executor.
//!
//! Up to `max_concurrent` job bodies run at once; excess submissions wait
//! in a FIFO list and are promoted one at a time as running jobs finish.
//! All accounting happens under a single mutex and never suspends while
//! holding it; job bodies themselves only ever run outside the lock, on
//! their own spawned tasks.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Mutex;

use genflow_core::TaskId;

/// Default concurrency budget when none is configured.
pub const DEFAULT_MAX_CONCURRENT: usize = 50;

/// A job body: an opaque future owning all of its context.
type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// One entry in the FIFO waiting list.
struct QueuedJob {
    task_id: TaskId,
    job: JobFuture,
}

// ---------------------------------------------------------------------------
// Admission / stats
// ---------------------------------------------------------------------------

/// Outcome of [`TaskQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was free; the job is already running.
    Started,
    /// The queue was at capacity; the job waits at this 1-based position.
    Queued { position: usize },
}

/// Instantaneous queue counters for observability.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStats {
    pub running: usize,
    pub queued: usize,
    pub max_concurrent: usize,
}

// ---------------------------------------------------------------------------
// TaskQueue
// ---------------------------------------------------------------------------

/// Admission-controlled executor for task job bodies.
///
/// Cheaply cloneable; one instance per process, created at startup and
/// threaded to every submitter.
///
/// Invariants:
///
/// - the running count never exceeds `max_concurrent`;
/// - waiting jobs are promoted strictly in arrival order;
/// - a job body that returns, errors internally, or panics always
///   releases its slot and triggers the next promotion.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    max_concurrent: usize,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    running: usize,
    waiting: VecDeque<QueuedJob>,
}

impl TaskQueue {
    /// Create a queue running at most `max_concurrent` jobs at once.
    ///
    /// A zero budget is clamped to 1.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Admit or park the job body for `task_id`.
    ///
    /// The admission decision is made before this call returns; an
    /// admitted job executes independently on its own spawned task. The
    /// caller is responsible for reflecting an [`Admission::Queued`]
    /// outcome onto the task record.
    pub async fn enqueue<F>(&self, task_id: TaskId, job: F) -> Admission
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let job: JobFuture = Box::pin(job);
        let mut state = self.inner.state.lock().await;

        if state.running < self.inner.max_concurrent {
            state.running += 1;
            drop(state);
            self.spawn_job(task_id, job);
            tracing::debug!(task_id = %task_id, "Job admitted immediately");
            Admission::Started
        } else {
            state.waiting.push_back(QueuedJob { task_id, job });
            let position = state.waiting.len();
            tracing::debug!(task_id = %task_id, position, "Queue at capacity, job parked");
            Admission::Queued { position }
        }
    }

    /// Remove a not-yet-started job from the waiting list.
    ///
    /// Returns `false` when the job already started, already finished, or
    /// was never enqueued -- running jobs cannot be cancelled here.
    pub async fn cancel_queued(&self, task_id: TaskId) -> bool {
        let mut state = self.inner.state.lock().await;
        match state.waiting.iter().position(|item| item.task_id == task_id) {
            Some(index) => {
                state.waiting.remove(index);
                tracing::info!(task_id = %task_id, "Queued job cancelled");
                true
            }
            None => false,
        }
    }

    /// Snapshot of the current counters.
    pub async fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock().await;
        QueueStats {
            running: state.running,
            queued: state.waiting.len(),
            max_concurrent: self.inner.max_concurrent,
        }
    }

    /// Run a job body on its own task.
    ///
    /// The slot is released and the next waiter promoted on every exit
    /// path, panics included.
    fn spawn_job(&self, task_id: TaskId, job: JobFuture) {
        let queue = self.clone();
        tokio::spawn(async move {
            if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                tracing::error!(task_id = %task_id, "Job body panicked");
            }
            queue.release_slot().await;
        });
    }

    /// Free one running slot and promote the FIFO head, if any.
    async fn release_slot(&self) {
        let mut state = self.inner.state.lock().await;
        state.running = state.running.saturating_sub(1);

        if let Some(next) = state.waiting.pop_front() {
            state.running += 1;
            drop(state);
            tracing::debug!(task_id = %next.task_id, "Promoting queued job");
            self.spawn_job(next.task_id, next.job);
        }
    }
}

impl Default for TaskQueue {
    /// Queue with the standard budget of [`DEFAULT_MAX_CONCURRENT`] jobs.
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}
