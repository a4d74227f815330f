//! Answer generation over retrieved context.
//!
//! [`answer`] retrieves the chunks of one paper nearest to a question and
//! hands them to a [`Generator`] together with a prompt that restricts the
//! model to that context. [`OpenRouterGenerator`] talks to any
//! OpenAI-compatible `/chat/completions` endpoint (OpenRouter by default).
//!
//! Transient API failures (429, 5xx, network) are retried with exponential
//! backoff; other 4xx responses fail immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use paper_rag_core::models::RetrievedChunk;
use paper_rag_core::pipeline::{join_context, RetrievalPipeline};
use paper_rag_core::RagError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GenerationConfig;

/// Reply used when retrieval finds nothing to answer from.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found for your query.";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("answer generation is disabled")]
    Disabled,

    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("generation API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("generation request failed: {0}")]
    Network(String),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),
}

/// A language model that answers a question from supplied context.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    async fn generate(&self, question: &str, context: &str) -> Result<String, GenerateError>;
}

/// Build the generator named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> anyhow::Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openrouter" => Ok(Arc::new(OpenRouterGenerator::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}

/// The prompt sent to the model.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "Based on the following context from a research paper, please answer the question.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Please provide a comprehensive answer based only on the information provided in the \
         context. If the context doesn't contain enough information to answer the question, \
         please say so."
    )
}

// ============ Disabled ============

/// Generator that always fails; retrieval still works.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _question: &str, _context: &str) -> Result<String, GenerateError> {
        Err(GenerateError::Disabled)
    }
}

// ============ OpenRouter ============

/// Chat-completions client for OpenRouter and compatible APIs.
pub struct OpenRouterGenerator {
    model: String,
    endpoint: String,
    api_key_env: String,
    api_key: Option<String>,
    max_retries: u32,
    backoff_base: Duration,
    client: reqwest::Client,
}

impl OpenRouterGenerator {
    /// The API key is read from `config.api_key_env` now; a missing key only
    /// fails once a request is made, so retrieval-only use keeps working.
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key_env: config.api_key_env.clone(),
            api_key: std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty()),
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(1),
            client,
        })
    }

    /// Use `key` instead of the environment variable.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the first retry delay; later delays double from it.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[async_trait]
impl Generator for OpenRouterGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String, GenerateError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GenerateError::MissingApiKey(self.api_key_env.clone()))?;

        let prompt = build_prompt(question, context);
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_base * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(api_key)
                .header("X-Title", "Paper RAG")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| GenerateError::InvalidResponse(e.to_string()))?;
                        debug!(model = %self.model, "generation complete");
                        return parse_completion(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = GenerateError::Api {
                        status: status.as_u16(),
                        body: body_text,
                    };
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(attempt, status = %status, "generation request failed, retrying");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "generation request failed, retrying");
                    last_err = Some(GenerateError::Network(e.to_string()));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| GenerateError::Network("generation failed after retries".into())))
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String, GenerateError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|c| c.to_string())
        .ok_or_else(|| GenerateError::InvalidResponse("missing choices[0].message.content".into()))
}

// ============ answer ============

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error(transparent)]
    Retrieval(#[from] RagError),

    #[error(transparent)]
    Generation(#[from] GenerateError),

    #[error("retrieval task failed: {0}")]
    Task(String),
}

/// A generated answer and the chunks it was generated from.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub response: String,
    pub sources: Vec<RetrievedChunk>,
}

/// Retrieve the `k` nearest chunks of paper `id` and answer from them.
///
/// Retrieval runs on a blocking thread. When it yields nothing the model
/// is not called and [`NO_RELEVANT_INFORMATION`] is returned.
pub async fn answer(
    pipeline: Arc<RetrievalPipeline>,
    generator: &dyn Generator,
    id: &str,
    question: &str,
    k: usize,
) -> Result<Answer, AnswerError> {
    let sources = {
        let (id, question) = (id.to_string(), question.to_string());
        tokio::task::spawn_blocking(move || pipeline.query(&id, &question, k))
            .await
            .map_err(|e| AnswerError::Task(e.to_string()))??
    };

    if sources.is_empty() {
        return Ok(Answer {
            response: NO_RELEVANT_INFORMATION.to_string(),
            sources,
        });
    }

    let context = join_context(&sources);
    let response = generator.generate(question, &context).await?;
    Ok(Answer { response, sources })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use paper_rag_core::chunk::ChunkParams;
    use paper_rag_core::embedding::HashEmbedder;
    use paper_rag_core::store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the prompt back as the completion.
    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, question: &str, context: &str) -> Result<String, GenerateError> {
            Ok(build_prompt(question, context))
        }
    }

    fn pipeline() -> Arc<RetrievalPipeline> {
        let (pipeline, _) = RetrievalPipeline::open(
            Arc::new(HashEmbedder::new(16)),
            Arc::new(InMemoryStore::new()),
            ChunkParams::default(),
        )
        .unwrap();
        Arc::new(pipeline)
    }

    fn generation_config(base_url: String) -> GenerationConfig {
        GenerationConfig {
            base_url,
            api_key_env: "PAPER_RAG_TEST_UNSET_KEY".to_string(),
            max_retries: 2,
            ..GenerationConfig::default()
        }
    }

    async fn fake_completions(failures: usize) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/api/v1/chat/completions",
                post(
                    move |State(calls): State<Arc<AtomicUsize>>,
                          headers: HeaderMap,
                          Json(body): Json<serde_json::Value>| async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        if headers.get("authorization").and_then(|v| v.to_str().ok())
                            != Some("Bearer test-key")
                        {
                            return Err(StatusCode::UNAUTHORIZED);
                        }
                        if n < failures {
                            return Err(StatusCode::TOO_MANY_REQUESTS);
                        }
                        let prompt = body["messages"][0]["content"].as_str().unwrap_or("");
                        let reply = format!("model {} saw {} chars", body["model"], prompt.len());
                        Ok(Json(serde_json::json!({
                            "choices": [{ "message": { "role": "assistant", "content": reply } }]
                        })))
                    },
                ),
            )
            .with_state(calls.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/api/v1", addr), calls)
    }

    #[test]
    fn test_prompt_contains_context_and_question() {
        let prompt = build_prompt("What is attention?", "Attention weighs tokens.");
        assert!(prompt.contains("Context:\nAttention weighs tokens.\n"));
        assert!(prompt.contains("Question: What is attention?"));
        assert!(prompt.contains("based only on the information provided in the context"));
    }

    #[test]
    fn test_parse_completion() {
        let json = serde_json::json!({ "choices": [{ "message": { "content": "42" } }] });
        assert_eq!(parse_completion(&json).unwrap(), "42");
        assert!(parse_completion(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[tokio::test]
    async fn test_answer_passes_ranked_context() {
        let pipeline = pipeline();
        let id = pipeline
            .ingest_text("Transformers rely on self-attention.")
            .unwrap();

        let answer = answer(pipeline, &EchoGenerator, &id, "What do transformers use?", 3)
            .await
            .unwrap();
        assert_eq!(answer.sources.len(), 1);
        assert!(answer.response.contains("Transformers rely on self-attention."));
        assert!(answer.response.contains("Question: What do transformers use?"));
    }

    #[tokio::test]
    async fn test_answer_without_chunks_skips_generation() {
        let pipeline = pipeline();
        let id = pipeline.ingest_text("Some text.").unwrap();

        let answer = answer(pipeline, &DisabledGenerator, &id, "anything", 0)
            .await
            .unwrap();
        assert_eq!(answer.response, NO_RELEVANT_INFORMATION);
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_answer_unknown_paper() {
        let err = answer(pipeline(), &EchoGenerator, "missing", "q", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AnswerError::Retrieval(RagError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_disabled_generator_fails() {
        let pipeline = pipeline();
        let id = pipeline.ingest_text("Some text.").unwrap();
        let err = answer(pipeline, &DisabledGenerator, &id, "q", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AnswerError::Generation(GenerateError::Disabled)));
    }

    #[tokio::test]
    async fn test_openrouter_missing_key() {
        let generator = OpenRouterGenerator::new(&generation_config(
            "http://127.0.0.1:9".to_string(),
        ))
        .unwrap();
        let err = generator.generate("q", "c").await.unwrap_err();
        assert!(matches!(err, GenerateError::MissingApiKey(ref var) if var == "PAPER_RAG_TEST_UNSET_KEY"));
    }

    #[tokio::test]
    async fn test_openrouter_retries_rate_limits() {
        let (base_url, calls) = fake_completions(2).await;
        let generator = OpenRouterGenerator::new(&generation_config(base_url))
            .unwrap()
            .with_api_key("test-key")
            .with_backoff_base(Duration::from_millis(5));

        let reply = generator.generate("q", "ctx").await.unwrap();
        assert!(reply.starts_with("model \"openai/gpt-oss-20b:free\" saw"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_openrouter_client_error_is_not_retried() {
        let (base_url, calls) = fake_completions(0).await;
        let generator = OpenRouterGenerator::new(&generation_config(base_url))
            .unwrap()
            .with_api_key("wrong-key")
            .with_backoff_base(Duration::from_millis(5));

        let err = generator.generate("q", "ctx").await.unwrap_err();
        assert!(matches!(err, GenerateError::Api { status: 401, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
