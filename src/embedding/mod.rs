//! Embedder abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete backends:
//! - **[`LocalEmbedder`]**: runs a sentence-embedding model locally via
//!   fastembed; no network calls after the first model download.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the backend named by
//! `[embedding].provider`.
//!
//! # Determinism
//!
//! Index reuse across restarts relies on the same text always producing
//! the same vector for a fixed model. Both backends satisfy this; swapping
//! models requires `sdrag index --rebuild`.
//!
//! # Retry Strategy
//!
//! The Ollama backend retries transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts; one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a batch and verify one vector came back per text.
pub async fn embed_documents(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let vectors = embedder.embed(texts).await?;
    if vectors.len() != texts.len() {
        return Err(RagError::Embedding(format!(
            "{} returned {} vectors for {} texts",
            embedder.model_name(),
            vectors.len(),
            texts.len()
        )));
    }
    Ok(vectors)
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embed_documents(embedder, &[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RagError::Embedding("Empty embedding response".to_string()))
}

// ============ Ollama Embedder ============

/// Embedder backed by a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default: `http://localhost:11434`).
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull all-minilm`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    dims: usize,
    url: String,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dims = config.dims.ok_or_else(|| {
            RagError::Configuration("embedding.dims required for Ollama provider".to_string())
        })?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            model: config.model.clone(),
            dims,
            url: url.trim_end_matches('/').to_string(),
            retry: config.retry_policy(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..self.retry.max_attempts() {
            if let Some(delay) = self.retry.delay_before(attempt) {
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            RagError::Embedding(format!("invalid Ollama response body: {}", e))
                        })?;
                        return parse_ollama_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = format!("Ollama API error {}: {}", status, body_text);
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(attempt = attempt + 1, %status, "embedding request failed");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(RagError::Embedding(err));
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "embedding request failed");
                    last_err = Some(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    ));
                }
            }
        }

        Err(RagError::Embedding(last_err.unwrap_or_else(|| {
            "Ollama embedding failed after retries".to_string()
        })))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            RagError::Embedding("Invalid Ollama response: missing embeddings array".to_string())
        })?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .ok_or_else(|| {
                    RagError::Embedding(
                        "Invalid Ollama response: embedding is not an array".to_string(),
                    )
                })
                .map(|values| {
                    values
                        .iter()
                        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                        .collect()
                })
        })
        .collect()
}

// ============ Local Embedder (fastembed) ============

/// Embedder running a sentence-embedding model in-process.
///
/// The model is downloaded from Hugging Face on first use and cached; it is
/// loaded once here and shared by every call.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub async fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config.model.clone();
        let dims = config.dims.unwrap_or_else(|| default_dims(&model_name));
        let fastembed_model = config_to_fastembed_model(&model_name)?;

        let model = tokio::task::spawn_blocking(move || {
            fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
            )
        })
        .await
        .map_err(|e| RagError::Embedding(format!("model loader panicked: {}", e)))?
        .map_err(|e| {
            RagError::Embedding(format!("Failed to initialize local embedding model: {}", e))
        })?;

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| RagError::Embedding("embedding model lock poisoned".to_string()))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| RagError::Embedding(format!("Local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| RagError::Embedding(format!("embedding task panicked: {}", e)))?
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => Err(RagError::Configuration(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text-v1.5",
            other
        ))),
    }
}

/// Known output widths for the supported local models.
pub fn default_dims(model_name: &str) -> usize {
    match model_name {
        "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => 768,
        _ => 384,
    }
}

/// Create the [`Embedder`] named by `[embedding].provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"local"` | [`LocalEmbedder`] (requires the `local-embeddings-fastembed` feature) |
/// | `"ollama"` | [`OllamaEmbedder`] |
pub async fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config).await?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(RagError::Configuration(
            "Local embedding provider requires --features local-embeddings-fastembed".to_string(),
        )),
        other => Err(RagError::Configuration(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}
