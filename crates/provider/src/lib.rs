//! Generation provider boundary.
//!
//! The queue and store treat generation as an opaque asynchronous
//! operation. This crate defines the narrow interface a job body calls
//! ([`GenerationProvider`]) and ships the HTTP implementation used in
//! production ([`HttpGenerationProvider`]).

pub mod http;

use async_trait::async_trait;
use serde::Serialize;

use genflow_core::TaskType;

pub use http::HttpGenerationProvider;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for generation attempts.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The generation service answered with a non-success status.
    #[error("Generation service returned HTTP {status}: {message}")]
    Service { status: u16, message: String },

    /// The generation service answered 2xx but the body was unusable.
    #[error("Malformed provider response: {0}")]
    Response(String),
}

// ---------------------------------------------------------------------------
// Request / trait
// ---------------------------------------------------------------------------

/// Parameters for one generation call, drawn from the task record.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// An asynchronous generation operation.
///
/// Implementations run one generation to completion and return its
/// output references (e.g. URLs). Timeout policy belongs to the
/// implementation; callers impose none of their own.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<String>, ProviderError>;
}
