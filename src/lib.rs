//! # Paper RAG
//!
//! Question answering over research papers, backed by a local retrieval
//! index.
//!
//! Papers arrive as PDFs, arXiv or PDF links, web pages, or plain text.
//! Their text is extracted, chunked, embedded and stored per paper by the
//! [`paper_rag_core`] retrieval pipeline; questions retrieve the nearest
//! chunks of one paper and a language model answers from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌───────────────┐
//! │  Extract    │──▶│  RetrievalPipeline   │──▶│ JSON snapshot │
//! │ PDF/URL/TXT │   │ chunk+embed+index    │   │  (FileStore)  │
//! └─────────────┘   └──────────┬───────────┘   └───────────────┘
//!                              │
//!                  ┌───────────┴───────────┐
//!                  ▼                       ▼
//!             ┌──────────┐           ┌──────────┐
//!             │   CLI    │           │   HTTP   │
//!             │  (prag)  │           │  (axum)  │
//!             └──────────┘           └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! prag ingest paper.pdf                   # prints the paper id
//! prag ingest --url https://arxiv.org/abs/1706.03762
//! prag search <id> "what is multi-head attention?"
//! prag ask <id> "what is multi-head attention?"
//! prag serve                              # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF, arXiv, URL and HTML text extraction |
//! | [`embedding`] | Embedder selection and the Ollama backend |
//! | [`ingest`] | Upload flow shared by CLI and server |
//! | [`get`] | Paper lookup and listing |
//! | [`search`] | Retrieval and question answering from the CLI |
//! | [`generate`] | Answer generation via OpenRouter |
//! | [`server`] | HTTP API server |

pub mod config;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod get;
pub mod ingest;
pub mod search;
pub mod server;
