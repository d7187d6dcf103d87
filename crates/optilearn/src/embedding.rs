//! HTTP embedding providers.
//!
//! Implements [`EmbeddingProvider`] for:
//! - **[`DisabledProvider`]**: always fails; used when `[embedding]` is unset.
//! - **[`OpenAIProvider`]**: `POST {base_url}/embeddings` (OpenAI or any
//!   compatible gateway).
//! - **[`OllamaProvider`]**: `POST {url}/api/embed` on a local Ollama.
//!
//! Use [`create_provider`] to pick one from configuration and
//! [`embed_query`] to embed requirement text under a deadline.
//!
//! # Retry Strategy
//!
//! - HTTP 408 (request timeout), 429 (rate limited) and 5xx → retry
//! - Other HTTP 4xx → fail immediately
//! - Network errors, per-request timeouts and truncated bodies → retry
//! - Backoff: `backoff_ms`, doubling per retry (capped at 2^5)
//! - `max_attempts` counts the first try; exhaustion is
//!   [`EmbeddingError::ProviderUnavailable`]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use optilearn_core::embedding::{prepare_input, Deadline, EmbeddingProvider};
use optilearn_core::error::EmbeddingError;

use crate::config::EmbeddingConfig;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// How many times to try and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Delay before `attempt` (1-based). No delay before the first.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.base_backoff * (1u32 << (attempt - 2).min(5))
    }
}

/// Outcome of one failed request.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth retrying (429, 5xx, connection failure, timeout).
    Transient(String),
    /// Retrying cannot help.
    Fatal(EmbeddingError),
}

/// Run `attempt` until it succeeds, fails fatally, exhausts the policy, or
/// the deadline passes.
pub async fn with_retry<F, Fut>(
    policy: RetryPolicy,
    deadline: Deadline,
    provider: &str,
    mut attempt: F,
) -> Result<Vec<f32>, EmbeddingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<f32>, AttemptError>>,
{
    let mut last_err = String::from("no attempt made");

    for n in 1..=policy.max_attempts {
        let delay = policy.delay_before(n);
        if !delay.is_zero() {
            if deadline.remaining().is_some_and(|left| left <= delay) {
                return Err(EmbeddingError::DeadlineExceeded);
            }
            tokio::time::sleep(delay).await;
        }

        let outcome = match deadline.remaining() {
            Some(left) if left.is_zero() => return Err(EmbeddingError::DeadlineExceeded),
            Some(left) => tokio::time::timeout(left, attempt())
                .await
                .map_err(|_| EmbeddingError::DeadlineExceeded)?,
            None => attempt().await,
        };

        match outcome {
            Ok(vector) => return Ok(vector),
            Err(AttemptError::Fatal(e)) => return Err(e),
            Err(AttemptError::Transient(msg)) => {
                tracing::warn!(
                    provider,
                    attempt = n,
                    max_attempts = policy.max_attempts,
                    error = %msg,
                    "embedding request failed"
                );
                last_err = msg;
            }
        }
    }

    Err(EmbeddingError::ProviderUnavailable {
        attempts: policy.max_attempts,
        last_error: last_err,
    })
}

/// Send one request and sort the outcome into success, transient, or fatal.
async fn send_once(
    request: reqwest::RequestBuilder,
    provider: &str,
    parse: fn(&serde_json::Value) -> Result<Vec<f32>, EmbeddingError>,
) -> Result<Vec<f32>, AttemptError> {
    let response = request
        .send()
        .await
        .map_err(|e| AttemptError::Transient(format!("{} connection error: {}", provider, e)))?;

    let status = response.status();
    if status.is_success() {
        // A body cut off mid-read is a transport failure, not a bad answer.
        let body = response.bytes().await.map_err(|e| {
            AttemptError::Transient(format!("{} response body error: {}", provider, e))
        })?;
        let json: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
            AttemptError::Fatal(EmbeddingError::InvalidResponse(format!(
                "{} returned non-JSON body: {}",
                provider, e
            )))
        })?;
        return parse(&json).map_err(AttemptError::Fatal);
    }

    let body_text = response.text().await.unwrap_or_default();

    if is_retryable_status(status) {
        return Err(AttemptError::Transient(format!(
            "{} API error {}: {}",
            provider, status, body_text
        )));
    }

    Err(AttemptError::Fatal(EmbeddingError::Rejected {
        status: status.as_u16(),
        message: body_text,
    }))
}

/// Request timeout (408), rate limiting (429) and server errors are worth retrying.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429) || status.is_server_error()
}

fn build_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn check_dims(vector: Vec<f32>, expected: usize) -> Result<Vec<f32>, EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} dimensions, provider returned {}",
            expected,
            vector.len()
        )));
    }
    Ok(vector)
}

// ============ Disabled Provider ============

/// Provider that refuses every request.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str, _deadline: Deadline) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Disabled)
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable unless constructed
/// with [`OpenAIProvider::with_api_key`].
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dims: usize,
    policy: RetryPolicy,
}

impl OpenAIProvider {
    /// Create a provider from configuration and `OPENAI_API_KEY`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

        Ok(Self {
            client: build_client(config)?,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dims,
            policy: RetryPolicy::from_config(config),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str, deadline: Deadline) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let vector = with_retry(self.policy, deadline, "OpenAI", || {
            let request = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body);
            send_once(request, "OpenAI", parse_openai_response)
        })
        .await?;

        check_dims(vector, self.dims)
    }
}

/// Extract the first `data[].embedding` array.
pub fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbeddingError::InvalidResponse("missing data array".into()))?;

    let embedding = data
        .first()
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| EmbeddingError::InvalidResponse("missing embedding".into()))?;

    parse_number_array(embedding)
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default `http://localhost:11434`).
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    policy: RetryPolicy,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());

        Ok(Self {
            client: build_client(config)?,
            url: url.trim_end_matches('/').to_string(),
            model,
            dims,
            policy: RetryPolicy::from_config(config),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str, deadline: Deadline) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/api/embed", self.url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let vector = with_retry(self.policy, deadline, "Ollama", || {
            let request = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body);
            send_once(request, "Ollama", parse_ollama_response)
        })
        .await?;

        check_dims(vector, self.dims)
    }
}

/// Extract the first entry of the `embeddings` array.
pub fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| EmbeddingError::InvalidResponse("missing embeddings array".into()))?
        .first()
        .ok_or_else(|| EmbeddingError::InvalidResponse("empty embeddings array".into()))?;

    let values = first
        .as_array()
        .ok_or_else(|| EmbeddingError::InvalidResponse("embedding is not an array".into()))?;

    parse_number_array(values)
}

fn parse_number_array(values: &[serde_json::Value]) -> Result<Vec<f32>, EmbeddingError> {
    if values.is_empty() {
        return Err(EmbeddingError::InvalidResponse("embedding is empty".into()));
    }
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| EmbeddingError::InvalidResponse("non-numeric embedding value".into()))
        })
        .collect()
}

// ============ Provider selection ============

/// Instantiate the provider named by `config.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed requirement text under `deadline`.
///
/// Blank text fails with [`EmbeddingError::EmptyInput`] before the provider
/// is called. The whole call, retries included, is bounded by the deadline.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    text: &str,
    deadline: Deadline,
) -> Result<Vec<f32>, EmbeddingError> {
    let cleaned = prepare_input(text)?;

    match deadline.remaining() {
        None => provider.embed(&cleaned, deadline).await,
        Some(left) if left.is_zero() => Err(EmbeddingError::DeadlineExceeded),
        Some(left) => tokio::time::timeout(left, provider.embed(&cleaned, deadline))
            .await
            .map_err(|_| EmbeddingError::DeadlineExceeded)?,
    }
}
