//! Configuration parsing and validation.
//!
//! Paper RAG is configured via a TOML file (default: `config/prag.toml`).
//! Only `[storage]` is required; every other section falls back to the
//! defaults below when omitted.
//!
//! # Example Configuration
//!
//! ```toml
//! [storage]
//! path = "./rag_storage/corpus.json"
//!
//! [chunking]
//! chunk_size = 1000
//! overlap = 200
//!
//! [retrieval]
//! top_k = 3
//!
//! [embedding]
//! provider = "hash"          # "hash" | "ollama"
//! dims = 384
//!
//! [generation]
//! provider = "openrouter"    # "openrouter" | "disabled"
//! model = "openai/gpt-oss-20b:free"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```
//!
//! # Validation
//!
//! [`load_config`] rejects:
//! - `chunking.chunk_size == 0` or `chunking.overlap >= chunking.chunk_size`
//! - `retrieval.top_k < 1`
//! - `embedding.dims == 0`, an unknown embedding provider, or
//!   `provider = "ollama"` without a model
//! - an unknown generation provider

use anyhow::{bail, Context, Result};
use paper_rag_core::chunk::{ChunkParams, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use paper_rag_core::embedding::DEFAULT_DIMS;
use paper_rag_core::pipeline::DEFAULT_TOP_K;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration, mirroring the TOML file structure.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Snapshot file holding the whole corpus.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// Embedding backend settings.
///
/// `"hash"` is the deterministic offline embedder from the core crate;
/// `"ollama"` calls a local Ollama instance.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            dims: DEFAULT_DIMS,
            model: None,
            url: default_ollama_url(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_dims() -> usize {
    DEFAULT_DIMS
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

/// Answer generation settings for `/chat` and `prag ask`.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_generation_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_provider() -> String {
    "openrouter".to_string()
}
fn default_generation_model() -> String {
    "openai/gpt-oss-20b:free".to_string()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// Validated chunking parameters for the pipeline.
    pub fn chunk_params(&self) -> Result<ChunkParams> {
        ChunkParams::new(self.chunking.chunk_size, self.chunking.overlap)
            .with_context(|| "invalid [chunking] section")
    }

    /// Check cross-field constraints. Called by [`load_config`]; call it
    /// yourself when building a `Config` by other means.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap,
                self.chunking.chunk_size
            );
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }

        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        match self.embedding.provider.as_str() {
            "hash" => {}
            "ollama" => {
                if self.embedding.model.is_none() {
                    bail!("embedding.model must be specified when provider is 'ollama'");
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hash or ollama.",
                other
            ),
        }

        match self.generation.provider.as_str() {
            "openrouter" | "disabled" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be openrouter or disabled.",
                other
            ),
        }

        Ok(())
    }
}

/// Read, parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
