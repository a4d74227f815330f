//! Ingestion and query orchestration.
//!
//! [`RetrievalPipeline`] owns the corpus. Ingest runs
//! chunk → embed → index → save for one document and only publishes the
//! document once the snapshot containing it is durable. Query embeds the
//! question and searches the document's own index.
//!
//! # Concurrency
//!
//! Documents are immutable once published and shared as `Arc<Document>`,
//! so queries only hold the corpus read lock long enough to clone a
//! pointer. Ingests build their document without any lock, then take the
//! save lock, write a snapshot of the current corpus plus the new document,
//! and publish it. Saves therefore never interleave, and an ingest that
//! returns has been persisted before any query can see its id.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::chunk::{chunk_text, ChunkParams};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::models::{Document, DocumentSummary, NewDocument, RetrievedChunk};
use crate::store::{load_corpus, Corpus, LoadStatus, Snapshot, Store};

/// Number of chunks returned by a query when the caller has no preference.
pub const DEFAULT_TOP_K: usize = 3;

/// Orchestrates chunking, embedding, indexing and persistence.
pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn Store>,
    params: ChunkParams,
    documents: RwLock<Corpus>,
    save_lock: Mutex<()>,
}

impl std::fmt::Debug for RetrievalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalPipeline")
            .field("embedder", &self.embedder.model_name())
            .field("store", &self.store.describe())
            .field("params", &self.params)
            .field("documents", &self.documents.read().len())
            .finish()
    }
}

impl RetrievalPipeline {
    /// Load the corpus from `store` and build a pipeline around it.
    ///
    /// A corrupt snapshot does not fail this call: the pipeline starts
    /// empty and the returned [`LoadStatus`] says so.
    pub fn open(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn Store>,
        params: ChunkParams,
    ) -> Result<(Self, LoadStatus)> {
        if embedder.dims() == 0 {
            return Err(RagError::Validation(
                "embedder dimension must be > 0".to_string(),
            ));
        }
        let (corpus, status) = load_corpus(store.as_ref(), embedder.dims())?;
        let pipeline = Self {
            embedder,
            store,
            params,
            documents: RwLock::new(corpus),
            save_lock: Mutex::new(()),
        };
        Ok((pipeline, status))
    }

    /// Ingest bare text without metadata.
    pub fn ingest_text(&self, text: &str) -> Result<String> {
        self.ingest(NewDocument::from_text(text))
    }

    /// Chunk, embed, index and persist a new document, returning its id.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] if the text is empty or whitespace.
    /// - [`RagError::Ingestion`] if embedding, indexing or saving fails.
    ///   Nothing becomes queryable in that case.
    pub fn ingest(&self, new_doc: NewDocument) -> Result<String> {
        if new_doc.text.trim().is_empty() {
            return Err(RagError::Validation("document text is empty".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let doc = self.build_document(id.clone(), new_doc)?;
        let chunk_count = doc.chunks.len();

        {
            let _guard = self.save_lock.lock();
            let snapshot = {
                let documents = self.documents.read();
                Snapshot::capture(
                    self.embedder.dims(),
                    documents
                        .values()
                        .map(|d| d.as_ref())
                        .chain(std::iter::once(&doc)),
                )
            };
            self.store
                .save(&snapshot)
                .map_err(|e| RagError::Ingestion(format!("saving snapshot failed: {}", e)))?;
            self.documents.write().insert(id.clone(), Arc::new(doc));
        }

        info!(document = %id, chunks = chunk_count, "document ingested");
        Ok(id)
    }

    fn build_document(&self, id: String, new_doc: NewDocument) -> Result<Document> {
        let chunks = chunk_text(&new_doc.text, self.params);
        let mut index = VectorIndex::new(self.embedder.dims());

        for chunk in &chunks {
            let vector = self.embedder.embed(&chunk.text).map_err(|e| {
                RagError::Ingestion(format!("embedding chunk {} failed: {}", chunk.index, e))
            })?;
            index.insert(chunk.index, vector).map_err(|e| {
                RagError::Ingestion(format!("indexing chunk {} failed: {}", chunk.index, e))
            })?;
        }

        Ok(Document {
            id,
            title: new_doc.title,
            source: new_doc.source,
            created_at: Utc::now(),
            text: new_doc.text,
            chunks,
            index,
        })
    }

    /// The `k` chunks of document `id` nearest to `question`, nearest first.
    ///
    /// `k` is clamped to the document's chunk count. A document without
    /// chunks yields an empty result.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotFound`] if `id` is unknown.
    /// - [`RagError::Embedding`] if the question cannot be embedded.
    pub fn query(&self, id: &str, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let doc = self.get(id)?;
        if doc.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(question)
            .map_err(|e| RagError::Embedding(format!("embedding question failed: {}", e)))?;
        let hits = doc.index.search(&query_vec, k).map_err(|e| match e {
            RagError::DimensionMismatch { .. } => {
                RagError::Embedding(format!("embedding question failed: {}", e))
            }
            other => other,
        })?;
        debug!(document = %id, k, hits = hits.len(), "query");

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                doc.chunks.get(hit.ordinal).map(|chunk| RetrievedChunk {
                    index: chunk.index,
                    text: chunk.text.clone(),
                    distance: hit.distance,
                })
            })
            .collect())
    }

    /// Fetch a published document.
    pub fn get(&self, id: &str) -> Result<Arc<Document>> {
        self.documents
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RagError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.read().contains_key(id)
    }

    /// Summaries of all documents, oldest first.
    pub fn list(&self) -> Vec<DocumentSummary> {
        let mut summaries: Vec<DocumentSummary> =
            self.documents.read().values().map(|d| d.summary()).collect();
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        summaries
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

/// Join retrieved chunk texts, in ranked order, separated by a blank line.
pub fn join_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieved(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            index: 0,
            text: text.to_string(),
            distance: 0.0,
        }
    }

    #[test]
    fn test_join_context() {
        assert_eq!(join_context(&[]), "");
        assert_eq!(
            join_context(&[retrieved("first"), retrieved("second")]),
            "first\n\nsecond"
        );
    }
}
