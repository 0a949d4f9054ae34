//! The external reasoning service boundary.
//!
//! One call shape: prompt in, free text out, fallible. There is deliberately
//! no retry here — a failed completion is a hard failure of that agent's
//! turn, and retry policy belongs to the API layer above this crate.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ReasoningEndpoint;

/// Errors from reasoning-service calls.
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Service returned an empty completion")]
    EmptyCompletion,

    #[error("Response parse error: {0}")]
    ParseError(String),
}

/// Result type for reasoning calls.
pub type ReasoningResult<T> = Result<T, ReasoningError>;

/// The reasoning-service contract. Implementations must treat every call as
/// fallible and must not assume ordering between concurrent calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Request a completion for `prompt`.
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> ReasoningResult<String>;
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

/// HTTP client for an OpenAI-style completion proxy.
pub struct HttpReasoningService {
    endpoint: ReasoningEndpoint,
    client: reqwest::Client,
}

impl HttpReasoningService {
    /// Build a client for the configured endpoint.
    pub fn new(endpoint: ReasoningEndpoint) -> ReasoningResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .map_err(|e| ReasoningError::RequestFailed(e.to_string()))?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningService {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> ReasoningResult<String> {
        let body = serde_json::json!({
            "model": self.endpoint.model,
            "prompt": prompt,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let url = format!("{}/completions", self.endpoint.url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&body);
        if !self.endpoint.api_key.is_empty() {
            request = request.bearer_auth(&self.endpoint.api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ReasoningError::Timeout
            } else {
                ReasoningError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::ParseError(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ReasoningError::EmptyCompletion);
        }

        debug!(
            model = %self.endpoint.model,
            chars = text.len(),
            "Completion received"
        );

        Ok(text)
    }
}
