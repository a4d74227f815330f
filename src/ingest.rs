//! Paper ingestion.
//!
//! Coordinates the upload flow shared by the CLI and the HTTP server:
//! source (PDF bytes, URL, plain text) → extraction → pipeline ingest.
//! Extraction and pipeline work are CPU-bound or touch the disk, so both
//! run on blocking threads.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use paper_rag_core::models::NewDocument;
use paper_rag_core::pipeline::RetrievalPipeline;
use paper_rag_core::store::file::FileStore;
use paper_rag_core::store::LoadStatus;
use paper_rag_core::RagError;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::{self, ExtractError, Extracted};

/// Open the corpus configured in `[storage]`.
///
/// A corrupt snapshot is reported at `warn` and the pipeline starts empty.
pub fn open_pipeline(config: &Config) -> anyhow::Result<Arc<RetrievalPipeline>> {
    let embedder = create_embedder(&config.embedding)?;
    let store = Arc::new(FileStore::new(&config.storage.path));
    let (pipeline, status) = RetrievalPipeline::open(embedder, store, config.chunk_params()?)
        .with_context(|| {
            format!(
                "Failed to open corpus at {}",
                config.storage.path.display()
            )
        })?;

    match status {
        LoadStatus::Fresh => info!(path = %config.storage.path.display(), "starting new corpus"),
        LoadStatus::Restored { documents } => {
            info!(path = %config.storage.path.display(), documents, "corpus loaded")
        }
        LoadStatus::Recovered {
            reason,
            quarantined,
        } => warn!(
            path = %config.storage.path.display(),
            reason = %reason,
            quarantined = ?quarantined,
            "snapshot was unreadable, starting with an empty corpus"
        ),
    }

    Ok(Arc::new(pipeline))
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Pipeline(#[from] RagError),

    #[error("ingest task failed: {0}")]
    Task(String),
}

/// Result of a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub paper_id: String,
    pub title: String,
    pub chunks: usize,
}

/// Extract a PDF held in memory and ingest it.
pub async fn ingest_pdf(
    pipeline: Arc<RetrievalPipeline>,
    bytes: Vec<u8>,
    source: Option<String>,
) -> Result<IngestReport, IngestError> {
    let extracted = extract::extract_pdf_task(bytes).await?;
    store(pipeline, extracted, source).await
}

/// Fetch a paper from a URL and ingest it.
pub async fn ingest_url(
    pipeline: Arc<RetrievalPipeline>,
    client: &reqwest::Client,
    url: &str,
) -> Result<IngestReport, IngestError> {
    let extracted = extract::fetch_url(client, url).await?;
    store(pipeline, extracted, Some(url.to_string())).await
}

/// Ingest plain text. Without a title, one is guessed from the text.
pub async fn ingest_text(
    pipeline: Arc<RetrievalPipeline>,
    text: String,
    title: Option<String>,
    source: Option<String>,
) -> Result<IngestReport, IngestError> {
    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| extract::extract_title(&text));
    store(pipeline, Extracted { text, title }, source).await
}

/// Ingest a local file: `.pdf` files are extracted, anything else is read
/// as UTF-8 text and cleaned.
pub async fn ingest_file(
    pipeline: Arc<RetrievalPipeline>,
    path: &Path,
) -> anyhow::Result<IngestReport> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let report = if is_pdf {
        ingest_pdf(pipeline, bytes, source).await?
    } else {
        let text = String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8 text", path.display()))?;
        let extracted = extract::extract_plain(&text)?;
        store(pipeline, extracted, source).await?
    };
    Ok(report)
}

async fn store(
    pipeline: Arc<RetrievalPipeline>,
    extracted: Extracted,
    source: Option<String>,
) -> Result<IngestReport, IngestError> {
    let title = extracted.title.clone();
    blocking(move || {
        let id = pipeline.ingest(NewDocument {
            text: extracted.text,
            title: Some(extracted.title),
            source,
        })?;
        let chunks = pipeline.get(&id)?.chunks.len();
        Ok(IngestReport {
            paper_id: id,
            title,
            chunks,
        })
    })
    .await
}

async fn blocking<T, F>(f: F) -> Result<T, IngestError>
where
    F: FnOnce() -> Result<T, IngestError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IngestError::Task(e.to_string()))?
}
