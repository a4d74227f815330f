//! Error types for the retrieval core.
//!
//! Every failure is a [`RagError`]; [`RagError::kind`] folds the variants
//! into the four outcomes callers act on.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by chunking, embedding, indexing, persistence and the pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid parameters or input, rejected before anything is applied.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A vector's length does not match the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the index.
        expected: usize,
        /// Length of the rejected vector.
        actual: usize,
    },

    /// Unknown document id.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Chunking, embedding or indexing failed partway through an ingest.
    #[error("ingestion failed: {0}")]
    Ingestion(String),

    /// The embedding backend failed outside an ingest, e.g. on a question.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Reading or writing the snapshot failed.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        /// File being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Encoding a snapshot failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored snapshot could not be parsed or reconstructed.
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Ingestion,
    Embedding,
    Persistence,
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Validation(_) | RagError::DimensionMismatch { .. } => ErrorKind::Validation,
            RagError::NotFound(_) => ErrorKind::NotFound,
            RagError::Ingestion(_) => ErrorKind::Ingestion,
            RagError::Embedding(_) => ErrorKind::Embedding,
            RagError::Persistence { .. } | RagError::Serialization(_) | RagError::Corrupt(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, RagError>;
