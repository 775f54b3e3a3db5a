use std::sync::Arc;

use genflow_events::WebhookNotifier;
use genflow_provider::GenerationProvider;
use genflow_queue::TaskQueue;
use genflow_store::TaskStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is the single process-wide context: one store, one queue, one
/// notifier, constructed once in `main` and threaded to every caller.
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Task repository (durable or ephemeral).
    pub store: TaskStore,
    /// Bounded-admission job queue.
    pub queue: TaskQueue,
    /// Webhook delivery for terminal snapshots.
    pub notifier: Arc<WebhookNotifier>,
    /// Generation service the job bodies call into.
    pub provider: Arc<dyn GenerationProvider>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
