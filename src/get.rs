//! Paper retrieval by ID.
//!
//! Used by both the `prag get` CLI command and `GET /papers/{id}`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use paper_rag_core::models::Document;
use paper_rag_core::pipeline::RetrievalPipeline;
use serde::Serialize;

use crate::config::Config;
use crate::ingest::open_pipeline;

/// Paper metadata plus its chunks, as returned by `GET /papers/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct PaperResponse {
    pub id: String,
    pub title: Option<String>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub chunk_count: usize,
    pub chunks: Vec<ChunkResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkResponse {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl From<&Document> for PaperResponse {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            source: doc.source.clone(),
            created_at: doc.created_at,
            chunk_count: doc.chunks.len(),
            chunks: doc
                .chunks
                .iter()
                .map(|c| ChunkResponse {
                    index: c.index,
                    start: c.start,
                    end: c.end,
                    text: c.text.clone(),
                })
                .collect(),
        }
    }
}

/// Look up a paper. Unknown ids are [`paper_rag_core::RagError::NotFound`].
pub fn get_paper(pipeline: &RetrievalPipeline, id: &str) -> paper_rag_core::Result<PaperResponse> {
    let doc = pipeline.get(id)?;
    Ok(PaperResponse::from(doc.as_ref()))
}

/// CLI entry point for `prag get <id>`.
pub fn run_get(config: &Config, id: &str) -> Result<()> {
    let pipeline = open_pipeline(config)?;
    let paper = get_paper(&pipeline, id)?;

    println!("--- Paper ---");
    println!("id:         {}", paper.id);
    println!("title:      {}", paper.title.as_deref().unwrap_or("(none)"));
    println!("source:     {}", paper.source.as_deref().unwrap_or("(none)"));
    println!("created_at: {}", paper.created_at.to_rfc3339());
    println!("chunks:     {}", paper.chunk_count);

    for chunk in &paper.chunks {
        println!();
        println!("--- chunk {} [{}..{}] ---", chunk.index, chunk.start, chunk.end);
        println!("{}", chunk.text);
    }

    Ok(())
}

/// CLI entry point for `prag list`.
pub fn run_list(config: &Config) -> Result<()> {
    let pipeline = open_pipeline(config)?;
    let papers = pipeline.list();

    if papers.is_empty() {
        println!("No papers ingested.");
        return Ok(());
    }

    for paper in papers {
        println!(
            "{}  {:>4} chunks  {}  {}",
            paper.id,
            paper.chunk_count,
            paper.created_at.format("%Y-%m-%d %H:%M"),
            paper.title.as_deref().unwrap_or("(untitled)")
        );
    }

    Ok(())
}
