use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genflow_api::config::ServerConfig;
use genflow_api::router::build_app_router;
use genflow_api::state::AppState;
use genflow_events::WebhookNotifier;
use genflow_provider::HttpGenerationProvider;
use genflow_queue::TaskQueue;
use genflow_store::{StoreConfig, TaskStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genflow_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Task store ---
    let store = TaskStore::connect(StoreConfig {
        redis_url: config.redis_url.clone(),
        namespace: config.task_namespace.clone(),
        retention: config.task_retention(),
    })
    .await;
    tracing::info!(mode = ?store.mode().await, "Task store ready");

    // --- Queue / notifier / provider ---
    let queue = TaskQueue::new(config.max_concurrent_jobs);
    tracing::info!(
        max_concurrent = config.max_concurrent_jobs,
        "Task queue created"
    );

    let notifier = Arc::new(WebhookNotifier::new());

    let provider = Arc::new(HttpGenerationProvider::new(
        config.provider_url.clone(),
        config.provider_api_key.clone(),
        config.provider_timeout(),
    ));
    tracing::info!(provider_url = %config.provider_url, "Generation provider configured");

    // --- App state ---
    let state = AppState {
        store: store.clone(),
        queue,
        notifier,
        provider,
        config: Arc::new(config.clone()),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Stop the store's retention sweep.
    store.shutdown().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
