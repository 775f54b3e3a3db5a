//! Shared helpers for API integration tests.
//!
//! Builds the full application router (same middleware stack as
//! production) around an ephemeral task store and a test-controlled
//! generation provider, plus small request/response conveniences.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::{mpsc, oneshot};
use tower::ServiceExt;

use genflow_api::config::ServerConfig;
use genflow_api::router::build_app_router;
use genflow_api::state::AppState;
use genflow_events::WebhookNotifier;
use genflow_provider::{GenerationProvider, GenerationRequest, ProviderError};
use genflow_queue::TaskQueue;
use genflow_store::{StoreConfig, TaskStore};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        redis_url: None,
        task_namespace: "genflow-test".to_string(),
        task_retention_hours: 1,
        max_concurrent_jobs: 50,
        provider_url: "http://localhost:8188".to_string(),
        provider_api_key: None,
        provider_timeout_secs: 5,
    }
}

/// Build the full application router with all middleware layers, using an
/// ephemeral store, the given provider, and a queue of `max_concurrent`.
///
/// Mirrors the wiring in `main.rs` so integration tests exercise the same
/// stack (CORS, request ID, timeout, tracing, panic recovery) that
/// production uses.
pub async fn build_test_app(
    provider: Arc<dyn GenerationProvider>,
    max_concurrent: usize,
) -> Router {
    let config = test_config();

    let store = TaskStore::connect(StoreConfig {
        redis_url: None,
        namespace: config.task_namespace.clone(),
        retention: config.task_retention(),
    })
    .await;

    let state = AppState {
        store,
        queue: TaskQueue::new(max_concurrent),
        notifier: Arc::new(WebhookNotifier::new()),
        provider,
        config: Arc::new(config.clone()),
    };

    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Test providers
// ---------------------------------------------------------------------------

/// Provider that immediately succeeds with fixed outputs.
pub struct StaticProvider {
    pub outputs: Vec<String>,
}

#[async_trait]
impl GenerationProvider for StaticProvider {
    async fn generate(&self, _request: GenerationRequest) -> Result<Vec<String>, ProviderError> {
        Ok(self.outputs.clone())
    }
}

/// Provider that always fails with an upstream service error.
pub struct FailingProvider;

#[async_trait]
impl GenerationProvider for FailingProvider {
    async fn generate(&self, _request: GenerationRequest) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Service {
            status: 502,
            message: "upstream exploded".to_string(),
        })
    }
}

/// A release handle for one in-flight gated generation.
pub struct GenerationGate {
    pub prompt: Option<String>,
    pub release: oneshot::Sender<Vec<String>>,
}

/// Provider whose generations block until the test releases them.
///
/// Every call sends a [`GenerationGate`] on the channel (in start order)
/// and waits for the test to answer it.
pub struct GatedProvider {
    started: mpsc::UnboundedSender<GenerationGate>,
}

impl GatedProvider {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<GenerationGate>) {
        let (started, gates) = mpsc::unbounded_channel();
        (Arc::new(Self { started }), gates)
    }
}

#[async_trait]
impl GenerationProvider for GatedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<String>, ProviderError> {
        let (release, gate) = oneshot::channel();
        let _ = self.started.send(GenerationGate {
            prompt: request.prompt.clone(),
            release,
        });
        // A dropped gate just completes with no outputs.
        Ok(gate.await.unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a POST request with a JSON body against the app.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a bodyless POST request against the app.
pub async fn post_empty(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a DELETE request against the app.
pub async fn delete(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Decode a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `GET /api/v1/tasks/{id}` until `predicate` holds on the task
/// payload or a 2-second deadline passes. Returns the final payload.
pub async fn poll_task_until(
    app: &Router,
    id: &str,
    predicate: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let response = get(app.clone(), &format!("/api/v1/tasks/{id}")).await;
        let json = body_json(response).await;
        if predicate(&json["data"]) {
            return json["data"].clone();
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for task state, last seen: {json}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
