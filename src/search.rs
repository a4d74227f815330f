//! Retrieval and question answering from the CLI.
//!
//! `prag search` prints the ranked chunks of one paper; `prag ask` also
//! sends them to the configured generator.

use anyhow::{bail, Result};
use paper_rag_core::models::RetrievedChunk;
use paper_rag_core::pipeline::RetrievalPipeline;
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::generate::{answer, create_generator};
use crate::ingest::open_pipeline;

/// Ranked chunks for one query, as returned by `POST /search/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub paper_id: String,
    pub query: String,
    pub results: Vec<RetrievedChunk>,
}

/// Run a query on a blocking thread.
pub async fn search_paper(
    pipeline: Arc<RetrievalPipeline>,
    id: String,
    query: String,
    k: usize,
) -> Result<SearchResponse> {
    tokio::task::spawn_blocking(move || -> Result<SearchResponse> {
        let results = pipeline.query(&id, &query, k)?;
        Ok(SearchResponse {
            paper_id: id,
            query,
            results,
        })
    })
    .await?
}

/// CLI entry point for `prag search <id> "<question>"`.
pub async fn run_search(config: &Config, id: &str, query: &str, k: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    let pipeline = open_pipeline(config)?;
    let k = k.unwrap_or(config.retrieval.top_k);
    let response = search_paper(pipeline, id.to_string(), query.to_string(), k).await?;

    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, hit) in response.results.iter().enumerate() {
        println!(
            "{}. chunk {}  distance={:.4}",
            rank + 1,
            hit.index,
            hit.distance
        );
        println!("    {}", hit.text.replace('\n', "\n    "));
        println!();
    }

    Ok(())
}

/// CLI entry point for `prag ask <id> "<question>"`.
pub async fn run_ask(config: &Config, id: &str, question: &str, k: Option<usize>) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }
    if !config.generation.is_enabled() {
        bail!("answer generation is disabled; set [generation].provider to use `ask`");
    }
    let pipeline = open_pipeline(config)?;
    let generator = create_generator(&config.generation)?;
    let k = k.unwrap_or(config.retrieval.top_k);

    let reply = answer(pipeline, generator.as_ref(), id, question, k).await?;

    println!("{}", reply.response);
    if !reply.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &reply.sources {
            println!("  chunk {} (distance {:.4})", source.index, source.distance);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper_rag_core::chunk::ChunkParams;
    use paper_rag_core::embedding::HashEmbedder;
    use paper_rag_core::store::memory::InMemoryStore;

    #[tokio::test]
    async fn test_search_paper() {
        let (pipeline, _) = RetrievalPipeline::open(
            Arc::new(HashEmbedder::new(8)),
            Arc::new(InMemoryStore::new()),
            ChunkParams::new(30, 5).unwrap(),
        )
        .unwrap();
        let pipeline = Arc::new(pipeline);
        let id = pipeline
            .ingest_text("First sentence is here. Second sentence follows it. Third.")
            .unwrap();

        let response = search_paper(pipeline.clone(), id.clone(), "First sentence is here.".into(), 2)
            .await
            .unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].index, 0);

        assert!(search_paper(pipeline, "missing".into(), "q".into(), 2)
            .await
            .is_err());
    }
}
