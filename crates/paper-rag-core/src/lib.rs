//! # Paper RAG Core
//!
//! The retrieval subsystem of Paper RAG: text chunking, embedding,
//! per-document nearest-neighbor indexing, snapshot persistence, and the
//! query-time retrieval algorithm that selects context for generation.
//!
//! This crate has no async runtime, HTTP, or PDF dependencies. The only
//! filesystem access lives in [`store::file::FileStore`].
//!
//! ## Flow
//!
//! ```text
//! ingest:  text ──▶ Chunker ──▶ Embedder ──▶ VectorIndex ──▶ Store.save
//! query:   question ──▶ Embedder ──▶ VectorIndex.search ──▶ ranked chunks
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use paper_rag_core::chunk::ChunkParams;
//! use paper_rag_core::embedding::HashEmbedder;
//! use paper_rag_core::pipeline::RetrievalPipeline;
//! use paper_rag_core::store::memory::InMemoryStore;
//!
//! let (pipeline, _status) = RetrievalPipeline::open(
//!     Arc::new(HashEmbedder::new(64)),
//!     Arc::new(InMemoryStore::new()),
//!     ChunkParams::default(),
//! )
//! .unwrap();
//!
//! let id = pipeline.ingest_text("Transformers use attention.").unwrap();
//! let hits = pipeline.query(&id, "What do transformers use?", 3).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod store;

pub use error::{ErrorKind, RagError, Result};
