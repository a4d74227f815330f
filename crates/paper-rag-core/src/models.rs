//! Core data models for documents, chunks and retrieval results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::index::VectorIndex;

/// Input to an ingest: raw text plus optional metadata from extraction.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub text: String,
    pub title: Option<String>,
    pub source: Option<String>,
}

impl NewDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A contiguous, trimmed slice of a document.
///
/// `start` and `end` are character offsets of the chunk window in the
/// document text before trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// An ingested document. Immutable once it becomes queryable.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: Option<String>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub chunks: Vec<Chunk>,
    pub index: VectorIndex,
}

impl Document {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            source: self.source.clone(),
            chunk_count: self.chunks.len(),
            created_at: self.created_at,
        }
    }
}

/// Lightweight listing entry for a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: Option<String>,
    pub source: Option<String>,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// A chunk selected by a query, with its squared Euclidean distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub index: usize,
    pub text: String,
    pub distance: f32,
}
