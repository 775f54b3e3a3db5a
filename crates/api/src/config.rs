use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Durable task store URL; unset selects ephemeral-only mode.
    pub redis_url: Option<String>,
    /// Key prefix for durable task records.
    pub task_namespace: String,
    /// Retention window for terminal tasks, in hours.
    pub task_retention_hours: u64,
    /// Queue admission budget.
    pub max_concurrent_jobs: usize,
    /// Generation service base URL.
    pub provider_url: String,
    /// Optional bearer token for the generation service.
    pub provider_api_key: Option<String>,
    /// Per-generation request timeout in seconds.
    pub provider_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `REDIS_URL`             | *(unset)*                  |
    /// | `TASK_NAMESPACE`        | `genflow`                  |
    /// | `TASK_RETENTION_HOURS`  | `1`                        |
    /// | `MAX_CONCURRENT_JOBS`   | `50`                       |
    /// | `PROVIDER_URL`          | `http://localhost:8188`    |
    /// | `PROVIDER_API_KEY`      | *(unset)*                  |
    /// | `PROVIDER_TIMEOUT_SECS` | `600`                      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let redis_url = std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty());

        let task_namespace =
            std::env::var("TASK_NAMESPACE").unwrap_or_else(|_| "genflow".into());

        let task_retention_hours: u64 = std::env::var("TASK_RETENTION_HOURS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("TASK_RETENTION_HOURS must be a valid u64");

        let max_concurrent_jobs: usize = std::env::var("MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .expect("MAX_CONCURRENT_JOBS must be a positive integer");

        let provider_url =
            std::env::var("PROVIDER_URL").unwrap_or_else(|_| "http://localhost:8188".into());

        let provider_api_key = std::env::var("PROVIDER_API_KEY")
            .ok()
            .filter(|s| !s.is_empty());

        let provider_timeout_secs: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("PROVIDER_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            redis_url,
            task_namespace,
            task_retention_hours,
            max_concurrent_jobs,
            provider_url,
            provider_api_key,
            provider_timeout_secs,
        }
    }

    /// Retention window for terminal tasks as a `Duration`.
    pub fn task_retention(&self) -> Duration {
        Duration::from_secs(self.task_retention_hours * 3600)
    }

    /// Per-generation request timeout as a `Duration`.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}
