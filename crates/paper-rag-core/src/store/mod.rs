//! Snapshot persistence for the corpus.
//!
//! The [`Store`] trait moves whole-corpus [`Snapshot`]s to and from a
//! backend. [`load_corpus`] turns a stored snapshot back into queryable
//! documents with rebuilt indexes, falling back to an empty corpus when the
//! stored bytes cannot be parsed or reconstructed.
//!
//! # Snapshot format
//!
//! ```json
//! { "version": 1, "dims": 384,
//!   "documents": { "<id>": { "title": "...", "source": "...",
//!       "created_at": "2026-01-01T00:00:00Z", "text": "...",
//!       "chunks": [ { "text": "...", "start": 0, "end": 1000,
//!                     "vector": "<base64 little-endian f32>" } ] } } }
//! ```
//!
//! Vectors are stored as raw `f32` bytes, so a reload reproduces the same
//! search results exactly.

pub mod file;
pub mod memory;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::models::{Chunk, Document};

/// Snapshot layout version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

/// All queryable documents, keyed by id.
pub type Corpus = BTreeMap<String, Arc<Document>>;

/// Serialized form of the whole corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub dims: usize,
    pub documents: BTreeMap<String, DocumentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub chunks: Vec<ChunkRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub vector: String,
}

impl Snapshot {
    /// Capture the given documents.
    pub fn capture<'a>(dims: usize, documents: impl IntoIterator<Item = &'a Document>) -> Self {
        let documents = documents
            .into_iter()
            .map(|doc| (doc.id.clone(), DocumentRecord::from(doc)))
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            dims,
            documents,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RagError::Serialization(e.to_string()))
    }

    /// Parse stored bytes. Any parse failure is [`RagError::Corrupt`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| RagError::Corrupt(e.to_string()))
    }

    /// Rebuild documents and their indexes.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] if the snapshot was written with a
    ///   different dimension than `dims` (a configuration change, not damage).
    /// - [`RagError::Corrupt`] for any inconsistency inside the snapshot.
    pub fn restore(self, dims: usize) -> Result<Corpus> {
        if self.version != SNAPSHOT_VERSION {
            return Err(RagError::Corrupt(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        if self.dims != dims {
            return Err(RagError::Validation(format!(
                "snapshot was written with {}-dimensional vectors but the embedder produces {}",
                self.dims, dims
            )));
        }

        let mut corpus = Corpus::new();
        for (id, record) in self.documents {
            let doc = record.into_document(id.clone(), dims)?;
            corpus.insert(id, Arc::new(doc));
        }
        Ok(corpus)
    }
}

impl From<&Document> for DocumentRecord {
    fn from(doc: &Document) -> Self {
        let chunks = doc
            .chunks
            .iter()
            .zip(doc.index.vectors())
            .map(|(chunk, vector)| ChunkRecord {
                text: chunk.text.clone(),
                start: chunk.start,
                end: chunk.end,
                vector: BASE64.encode(vec_to_blob(vector)),
            })
            .collect();
        Self {
            title: doc.title.clone(),
            source: doc.source.clone(),
            created_at: doc.created_at,
            text: doc.text.clone(),
            chunks,
        }
    }
}

impl DocumentRecord {
    fn into_document(self, id: String, dims: usize) -> Result<Document> {
        let mut index = VectorIndex::new(dims);
        let mut chunks = Vec::with_capacity(self.chunks.len());

        for (ordinal, record) in self.chunks.into_iter().enumerate() {
            if record.start > record.end {
                return Err(RagError::Corrupt(format!(
                    "document {} chunk {} has an inverted span",
                    id, ordinal
                )));
            }
            let bytes = BASE64.decode(record.vector.as_bytes()).map_err(|e| {
                RagError::Corrupt(format!("document {} chunk {}: {}", id, ordinal, e))
            })?;
            let vector = blob_to_vec(&bytes).ok_or_else(|| {
                RagError::Corrupt(format!(
                    "document {} chunk {}: truncated vector",
                    id, ordinal
                ))
            })?;
            index.insert(ordinal, vector).map_err(|e| {
                RagError::Corrupt(format!("document {} chunk {}: {}", id, ordinal, e))
            })?;
            chunks.push(Chunk {
                index: ordinal,
                text: record.text,
                start: record.start,
                end: record.end,
            });
        }

        Ok(Document {
            id,
            title: self.title,
            source: self.source,
            created_at: self.created_at,
            text: self.text,
            chunks,
            index,
        })
    }
}

/// Outcome of [`load_corpus`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    /// Nothing had been saved yet.
    Fresh,
    /// A snapshot was loaded.
    Restored { documents: usize },
    /// The stored snapshot was unusable and the corpus starts empty.
    Recovered {
        reason: String,
        quarantined: Option<PathBuf>,
    },
}

/// Durable backend for corpus snapshots.
///
/// Implementations must make [`save`](Store::save) all-or-nothing: a reader
/// sees either the previous snapshot or the new one, never a mix.
pub trait Store: Send + Sync {
    /// Persist a complete snapshot, replacing the previous one.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Read the last snapshot. `Ok(None)` when nothing was ever saved,
    /// [`RagError::Corrupt`] when the stored bytes do not parse.
    fn read(&self) -> Result<Option<Snapshot>>;

    /// Move an unreadable snapshot out of the way so the next save cannot
    /// overwrite it. Returns where it went, if anywhere.
    fn quarantine(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Load and rebuild the corpus, recovering from corruption.
///
/// A snapshot that fails to parse or reconstruct is quarantined, logged at
/// `warn`, and replaced by an empty corpus; the caller learns about it via
/// [`LoadStatus::Recovered`]. I/O failures and dimension mismatches are
/// returned as errors.
pub fn load_corpus(store: &dyn Store, dims: usize) -> Result<(Corpus, LoadStatus)> {
    let restored = match store.read() {
        Ok(None) => {
            info!(store = %store.describe(), "no snapshot found, starting with an empty corpus");
            return Ok((Corpus::new(), LoadStatus::Fresh));
        }
        Ok(Some(snapshot)) => snapshot.restore(dims),
        Err(e) => Err(e),
    };

    match restored {
        Ok(corpus) => {
            info!(store = %store.describe(), documents = corpus.len(), "corpus restored");
            let documents = corpus.len();
            Ok((corpus, LoadStatus::Restored { documents }))
        }
        Err(RagError::Corrupt(reason)) => {
            let quarantined = match store.quarantine() {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "failed to quarantine corrupt snapshot");
                    None
                }
            };
            warn!(
                store = %store.describe(),
                reason = %reason,
                quarantined = ?quarantined,
                "corrupt snapshot, continuing with an empty corpus"
            );
            Ok((
                Corpus::new(),
                LoadStatus::Recovered {
                    reason,
                    quarantined,
                },
            ))
        }
        Err(e) => Err(e),
    }
}
