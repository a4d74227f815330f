//! HTTP API server.
//!
//! Exposes paper upload, retrieval and question answering as a JSON API.
//! Pipeline calls are CPU-bound and may touch the disk, so every handler
//! runs them on `tokio::task::spawn_blocking`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner with the number of ingested papers |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/upload-paper` | Multipart `file` (PDF) or `url` field |
//! | `POST` | `/papers/text` | Ingest plain text: `{text, title?, source?}` |
//! | `GET`  | `/papers` | List ingested papers |
//! | `GET`  | `/papers/{id}` | Paper metadata and chunks |
//! | `POST` | `/chat/{id}` | Answer `{query, k?}` from the paper |
//! | `POST` | `/search/{id}` | Ranked chunks for `{query, k?}`, no generation |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `ingestion_failed` (422), `generation_failed` (502),
//! `embedding_unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend
//! can call the API directly.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use paper_rag_core::models::{DocumentSummary, RetrievedChunk};
use paper_rag_core::pipeline::RetrievalPipeline;
use paper_rag_core::{ErrorKind, RagError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::extract;
use crate::generate::{answer, create_generator, AnswerError, Generator};
use crate::get::{get_paper, PaperResponse};
use crate::ingest::{self, open_pipeline, IngestError, IngestReport};
use crate::search::{search_paper, SearchResponse};

/// Largest accepted request body (uploaded PDFs).
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RetrievalPipeline>,
    generator: Arc<dyn Generator>,
    http: reqwest::Client,
    top_k: usize,
}

impl AppState {
    pub fn new(
        pipeline: Arc<RetrievalPipeline>,
        generator: Arc<dyn Generator>,
        top_k: usize,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            pipeline,
            generator,
            http: extract::http_client()?,
            top_k,
        })
    }
}

/// Build the router over `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/upload-paper", post(handle_upload))
        .route("/papers", get(handle_list))
        .route("/papers/text", post(handle_ingest_text))
        .route("/papers/{id}", get(handle_get))
        .route("/chat/{id}", post(handle_chat))
        .route("/search/{id}", post(handle_search))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = open_pipeline(config)?;
    let generator = create_generator(&config.generation)?;
    let state = AppState::new(pipeline, generator, config.retrieval.top_k)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        generation = config.generation.is_enabled(),
        "server listening"
    );

    axum::serve(listener, router(state)).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: &'static str,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn ingestion_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "ingestion_failed",
        message: message.into(),
    }
}

fn generation_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "generation_failed",
        message: message.into(),
    }
}

/// Logs the backend failure and returns a generic 503.
fn embedding_unavailable(err: impl std::fmt::Display) -> AppError {
    error!(error = %err, "embedding backend failed");
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "embedding_unavailable",
        message: "embedding service unavailable".to_string(),
    }
}

/// Logs the underlying error and returns a generic 500.
fn internal(err: impl std::fmt::Display) -> AppError {
    error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: "internal server error".to_string(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        match err.kind() {
            ErrorKind::Validation => bad_request(err.to_string()),
            ErrorKind::NotFound => not_found(err.to_string()),
            ErrorKind::Ingestion => ingestion_failed(err.to_string()),
            ErrorKind::Embedding => embedding_unavailable(err),
            ErrorKind::Persistence => internal(err),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Extract(e) => ingestion_failed(e.to_string()),
            IngestError::Pipeline(e) => e.into(),
            IngestError::Task(e) => internal(e),
        }
    }
}

impl From<AnswerError> for AppError {
    fn from(err: AnswerError) -> Self {
        match err {
            AnswerError::Retrieval(e) => e.into(),
            AnswerError::Generation(e) => generation_failed(e.to_string()),
            AnswerError::Task(e) => internal(e),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<RagError>() {
            Ok(rag) => rag.into(),
            Err(other) => internal(other),
        }
    }
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    documents: usize,
}

async fn handle_root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Paper RAG API is running",
        documents: state.pipeline.len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Handler for `GET /health`, used by load balancers and the test suite.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ Ingestion ============

#[derive(Serialize)]
struct UploadResponse {
    #[serde(flatten)]
    report: IngestReport,
    message: &'static str,
}

impl From<IngestReport> for UploadResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            report,
            message: "Paper processed successfully",
        }
    }
}

/// Handler for `POST /upload-paper`.
///
/// Accepts a multipart form with either a `file` part (PDF bytes) or a
/// `url` field. A file wins when both are present.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file: Option<(Vec<u8>, Option<String>)> = None;
    let mut url: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read file: {}", e)))?;
                if !bytes.is_empty() {
                    file = Some((bytes.to_vec(), name));
                }
            }
            Some("url") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("failed to read url: {}", e)))?;
                let value = value.trim();
                if !value.is_empty() {
                    url = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    let report = match (file, url) {
        (Some((bytes, name)), _) => ingest::ingest_pdf(state.pipeline.clone(), bytes, name).await?,
        (None, Some(url)) => ingest::ingest_url(state.pipeline.clone(), &state.http, &url).await?,
        (None, None) => return Err(bad_request("Either file or URL must be provided")),
    };

    Ok(Json(report.into()))
}

#[derive(Deserialize)]
struct TextUpload {
    text: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

/// Handler for `POST /papers/text`.
async fn handle_ingest_text(
    State(state): State<AppState>,
    Json(body): Json<TextUpload>,
) -> Result<Json<UploadResponse>, AppError> {
    let report =
        ingest::ingest_text(state.pipeline.clone(), body.text, body.title, body.source).await?;
    Ok(Json(report.into()))
}

// ============ Papers ============

#[derive(Serialize)]
struct ListResponse {
    papers: Vec<DocumentSummary>,
}

async fn handle_list(State(state): State<AppState>) -> Json<ListResponse> {
    Json(ListResponse {
        papers: state.pipeline.list(),
    })
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaperResponse>, AppError> {
    Ok(Json(get_paper(&state.pipeline, &id)?))
}

// ============ Chat and search ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

impl QueryRequest {
    fn validate(&self, default_k: usize) -> Result<usize, AppError> {
        if self.query.trim().is_empty() {
            return Err(bad_request("query must not be empty"));
        }
        match self.k {
            Some(0) => Err(bad_request("k must be >= 1")),
            Some(k) => Ok(k),
            None => Ok(default_k),
        }
    }
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    sources: Vec<RetrievedChunk>,
}

/// Handler for `POST /chat/{id}`.
///
/// Returns 404 for an unknown paper and 502 when the generator fails.
async fn handle_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let k = body.validate(state.top_k)?;
    let reply = answer(
        state.pipeline.clone(),
        state.generator.as_ref(),
        &id,
        &body.query,
        k,
    )
    .await?;
    Ok(Json(ChatResponse {
        response: reply.response,
        sources: reply.sources,
    }))
}

/// Handler for `POST /search/{id}`.
async fn handle_search(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let k = body.validate(state.top_k)?;
    let response = search_paper(state.pipeline.clone(), id, body.query, k).await?;
    Ok(Json(response))
}
