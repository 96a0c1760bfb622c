//! Generative model client.
//!
//! Sends a [`GenerationRequest`] to a `generateContent`-style endpoint and
//! returns the first candidate's text.
//!
//! # Retry Strategy
//!
//! Each call is a small state machine:
//!
//! ```text
//! Attempting(n) ──transport error / non-2xx──▶ Backoff(d·2^n) ──▶ Attempting(n+1)
//!      │                                                              │
//!      ├──2xx + candidate text──▶ Succeeded(text)                     │
//!      ├──2xx, no candidate────▶ MalformedResponse (terminal)         │
//!      └──────────────────────── max attempts reached ──▶ Exhausted ◀─┘
//! ```
//!
//! Every non-2xx status is retried, 4xx included. No wait follows the last
//! attempt. Dropping the returned future cancels any in-progress wait, so
//! callers can bound a call with `tokio::time::timeout`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};
use crate::prompt::GenerationRequest;
use crate::retry::RetryPolicy;

/// Answer returned when generation fails for any reason.
pub const INVALID_RESPONSE_ANSWER: &str =
    "I'm sorry, I received an invalid response from the AI model.";

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Connection, TLS, timeout, or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx response without `candidates[0].content.parts[0].text`. Not retried.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("gave up after {attempts} attempts; last error: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Produces an answer for a grounded request.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn try_generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<String, GenerationError>;

    /// Like [`try_generate`](Self::try_generate), but any failure becomes
    /// [`INVALID_RESPONSE_ANSWER`].
    async fn generate(&self, request: &GenerationRequest) -> String {
        match self.try_generate(request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "generation failed");
                INVALID_RESPONSE_ANSWER.to_string()
            }
        }
    }
}

// ============ Response shape ============

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Extract `candidates[0].content.parts[0].text` from a response body.
fn parse_response(body: &str) -> std::result::Result<String, GenerationError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| {
            GenerationError::MalformedResponse(format!(
                "no candidate text in response: {}",
                truncate(body, 200)
            ))
        })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

// ============ Gemini client ============

/// Client for the Gemini `models/{model}:generateContent` endpoint.
///
/// The API key travels as the `key` query parameter and is stripped from
/// every logged error.
pub struct GeminiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    /// `endpoint` is the API base (e.g. `https://generativelanguage.googleapis.com/v1beta`).
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: String,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!(
                "{}/models/{}:generateContent",
                endpoint.trim_end_matches('/'),
                model
            ),
            api_key,
            retry,
        })
    }

    /// Build a client from config, reading the API key from the environment.
    ///
    /// Fails with [`RagError::Configuration`] when the key is absent.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::new(
            &config.endpoint,
            &config.model,
            api_key,
            config.retry_policy(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn attempt(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<String, GenerationError> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate(&body, 500).to_string(),
            });
        }

        parse_response(&body)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn try_generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<String, GenerationError> {
        let mut last_err = None;

        for attempt in 0..self.retry.max_attempts() {
            if let Some(delay) = self.retry.delay_before(attempt) {
                tracing::info!(delay_ms = delay.as_millis() as u64, "retrying generation");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(request).await {
                Ok(text) => {
                    tracing::debug!(attempts = attempt + 1, "generation succeeded");
                    return Ok(text);
                }
                Err(e @ GenerationError::MalformedResponse(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "generation attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(GenerationError::Exhausted {
            attempts: self.retry.max_attempts(),
            last: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }
}
