//! HTTP client for a remote generation service.
//!
//! Speaks a minimal JSON protocol: `POST <base>/v1/generate` with the
//! request parameters, answered by `{ "outputs": ["<ref>", ...] }`.
//! Generation is slow, so the client carries its own generous request
//! timeout instead of sharing one with the rest of the platform.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{GenerationProvider, GenerationRequest, ProviderError};

/// Success body from `POST /v1/generate`.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    outputs: Vec<String>,
}

/// Client for a remote generation service.
pub struct HttpGenerationProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGenerationProvider {
    /// Create a client for the service at `base_url`.
    ///
    /// `api_key`, when present, is sent as a bearer token on every call.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build reqwest HTTP client");
        let base_url = base_url.into();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Base URL of the generation service.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/v1/generate", self.base_url);
        tracing::debug!(url = %url, task_type = %request.task_type, "Submitting generation request");

        let mut call = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Response(e.to_string()))?;
        if body.outputs.is_empty() {
            return Err(ProviderError::Response(
                "generation returned no outputs".to_string(),
            ));
        }
        Ok(body.outputs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use genflow_core::TaskType;

    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            task_type: TaskType::Image,
            model: Some("flux-dev".to_string()),
            prompt: Some("a red bicycle".to_string()),
        }
    }

    #[tokio::test]
    async fn returns_outputs_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(body_partial_json(json!({
                "type": "image",
                "model": "flux-dev",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"outputs": ["http://cdn/1.png"]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpGenerationProvider::new(server.uri(), None, Duration::from_secs(5));
        let outputs = provider.generate(request()).await.unwrap();

        assert_eq!(outputs, vec!["http://cdn/1.png".to_string()]);
    }

    #[tokio::test]
    async fn sends_bearer_token_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"outputs": ["u"]})))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpGenerationProvider::new(
            server.uri(),
            Some("sekrit".to_string()),
            Duration::from_secs(5),
        );
        provider.generate(request()).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_becomes_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider = HttpGenerationProvider::new(server.uri(), None, Duration::from_secs(5));
        let err = provider.generate(request()).await.unwrap_err();

        match err {
            ProviderError::Service { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected Service error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_outputs_become_response_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"outputs": []})))
            .mount(&server)
            .await;

        let provider = HttpGenerationProvider::new(server.uri(), None, Duration::from_secs(5));
        let err = provider.generate(request()).await.unwrap_err();

        assert!(matches!(err, ProviderError::Response(_)));
    }
}
