//! Embedding backend selection.
//!
//! The core crate ships [`HashEmbedder`], a deterministic offline embedder.
//! This module adds [`OllamaEmbedder`], which calls a local Ollama
//! instance, and [`create_embedder`] to pick one from configuration.
//!
//! # Retry Strategy
//!
//! Ollama requests use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{bail, Result};
use paper_rag_core::embedding::{l2_norm, l2_normalize, Embedder, HashEmbedder};
use paper_rag_core::RagError;
use tracing::warn;

use crate::config::EmbeddingConfig;

/// Build the embedder named by `config.provider`.
///
/// | Provider | Embedder |
/// |----------|----------|
/// | `"hash"` | [`HashEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(config.dims))),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Ollama ============

/// Embedder backed by `POST {url}/api/embed` on an Ollama server.
///
/// Uses a blocking HTTP client: callers in async code must run
/// [`Embedder::embed`] on a blocking thread (the pipeline is always driven
/// from `spawn_blocking`). The client is built on first use so it is never
/// created or dropped on an async worker thread.
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
    client: OnceLock<reqwest::blocking::Client>,
}

impl OllamaEmbedder {
    /// # Errors
    ///
    /// Returns an error if `embedding.model` is not set.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        Ok(Self {
            model,
            dims: config.dims,
            url: config.url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(1),
            client: OnceLock::new(),
        })
    }

    /// Override the first retry delay; later delays double from it.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, RagError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| RagError::Embedding(format!("building HTTP client failed: {}", e)))?;
        Ok(self.client.get_or_init(|| client))
    }

    fn request(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let client = self.client()?;
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let endpoint = format!("{}/api/embed", self.url);

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                std::thread::sleep(delay);
            }

            match client.post(&endpoint).json(&body).send() {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().map_err(|e| {
                            RagError::Embedding(format!("invalid Ollama response: {}", e))
                        })?;
                        return parse_ollama_response(&json);
                    }

                    let body_text = response.text().unwrap_or_default();
                    let err = format!("Ollama API error {}: {}", status, body_text);
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(attempt, status = %status, "Ollama request failed, retrying");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(RagError::Embedding(err));
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Ollama connection failed, retrying");
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

impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> paper_rag_core::Result<Vec<f32>> {
        let mut vector = self.request(text)?;
        if vector.len() != self.dims {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        if l2_norm(&vector) <= f32::EPSILON {
            return Err(RagError::Embedding(
                "Ollama returned a zero vector".to_string(),
            ));
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<f32>, RagError> {
    let invalid = |what: &str| RagError::Embedding(format!("invalid Ollama response: {}", what));

    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| invalid("missing embeddings array"))?
        .first()
        .ok_or_else(|| invalid("empty embeddings array"))?;

    first
        .as_array()
        .ok_or_else(|| invalid("embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .filter(|f| f.is_finite())
                .ok_or_else(|| invalid("embedding holds a non-numeric value"))
        })
        .collect()
}
