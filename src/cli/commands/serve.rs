//! HTTP API server for integration with other systems.
//!
//! Exposes summarization and the summary catalog as JSON endpoints.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::{ErrorKind, RecapError};
use crate::orchestrator::Orchestrator;
use crate::source::{parse_video_id, Language, VideoMetadata};
use crate::store::{normalize_tags, CatalogEntry, SummaryKey, SummaryRecord, SummaryStore};
use crate::summary::SummaryLength;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    store: Arc<dyn SummaryStore>,
    settings: Settings,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(&settings)?;

    let state = Arc::new(AppState {
        store: orchestrator.store(),
        orchestrator,
        settings,
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Recap API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Summarize", "POST   /summaries");
    Output::kv("List", "GET    /summaries");
    Output::kv("Search", "GET    /summaries/search?q=&tags=");
    Output::kv("Get", "GET    /summaries/{video_id}/{language}/{length}");
    Output::kv("Tags", "PUT    /summaries/{video_id}/{language}/{length}/tags");
    Output::kv("Delete", "DELETE /videos/{video_id}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/summaries", post(summarize).get(list_summaries))
        .route("/summaries/search", get(search_summaries))
        .route("/summaries/{video_id}/{language}/{length}", get(get_summary))
        .route("/summaries/{video_id}/{language}/{length}/tags", put(set_tags))
        .route("/videos/{video_id}", delete(delete_video))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SummarizeRequest {
    /// YouTube URL or video ID
    input: String,
    #[serde(default)]
    language: Option<Language>,
    #[serde(default)]
    length: Option<SummaryLength>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    /// Comma-separated tags that must all be present.
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct TagsRequest {
    tags: Vec<String>,
}

#[derive(Serialize)]
struct ListResponse {
    summaries: Vec<CatalogEntry>,
    total: usize,
}

#[derive(Serialize)]
struct DeleteResponse {
    video_id: String,
    deleted: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

/// Error response carrying the HTTP status for a pipeline error.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl From<RecapError> for ApiError {
    fn from(err: RecapError) -> Self {
        let (status, code) = match (&err, err.kind()) {
            (RecapError::InvalidInput(_), _) => (StatusCode::BAD_REQUEST, "invalid_input"),
            (RecapError::RateLimited(_), _) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            (RecapError::Timeout(_), _) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            (RecapError::NoTranscript(_), _) => (StatusCode::NOT_FOUND, "no_transcript"),
            (RecapError::LlmUnavailable(_), _) => (StatusCode::BAD_GATEWAY, "llm_unavailable"),
            (_, ErrorKind::NotFound) => (StatusCode::NOT_FOUND, "not_found"),
            (_, ErrorKind::Unavailable) => (StatusCode::UNPROCESSABLE_ENTITY, "video_unavailable"),
            (_, ErrorKind::Transient) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            (_, ErrorKind::Fatal) => (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable"),
            (_, ErrorKind::Internal) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.code,
                message: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn key_from_path(video_id: &str, language: &str, length: &str) -> std::result::Result<SummaryKey, ApiError> {
    let video_id = parse_video_id(video_id)
        .ok_or_else(|| RecapError::InvalidInput(format!("Invalid video id: {}", video_id)))?;
    let language: Language = language.parse().map_err(RecapError::InvalidInput)?;
    let length: SummaryLength = length.parse().map_err(RecapError::InvalidInput)?;
    Ok(SummaryKey::new(video_id, language, length))
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeRequest>,
) -> ApiResult<CatalogEntry> {
    let language = req.language.unwrap_or(state.settings.summary.default_language);
    let length = req.length.unwrap_or(state.settings.summary.default_length);

    let record = state
        .orchestrator
        .process_video(&req.input, language, length, &req.tags)
        .await?;

    Ok(Json(with_video(&state, record).await?))
}

async fn with_video(state: &AppState, record: SummaryRecord) -> crate::error::Result<CatalogEntry> {
    Ok(match state.store.get(&record.key()).await? {
        Some(entry) => entry,
        None => CatalogEntry {
            video: VideoMetadata::unknown(record.video_id.clone()),
            summary: record,
        },
    })
}

async fn list_summaries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<ListResponse> {
    let entries = state.store.list().await?;
    let total = entries.len();
    Ok(Json(ListResponse {
        summaries: entries.into_iter().take(params.limit.unwrap_or(usize::MAX)).collect(),
        total,
    }))
}

async fn search_summaries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<ListResponse> {
    let tags = normalize_tags(params.tags.as_deref().unwrap_or("").split(','));
    let entries = state.store.search(&params.q, &tags).await?;
    let total = entries.len();
    Ok(Json(ListResponse {
        summaries: entries.into_iter().take(params.limit.unwrap_or(usize::MAX)).collect(),
        total,
    }))
}

async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path((video_id, language, length)): Path<(String, String, String)>,
) -> ApiResult<CatalogEntry> {
    let key = key_from_path(&video_id, &language, &length)?;
    match state.store.get(&key).await? {
        Some(entry) => Ok(Json(entry)),
        None => Err(RecapError::NotFound(format!("No summary for {}", key)).into()),
    }
}

async fn set_tags(
    State(state): State<Arc<AppState>>,
    Path((video_id, language, length)): Path<(String, String, String)>,
    Json(req): Json<TagsRequest>,
) -> ApiResult<SummaryRecord> {
    let key = key_from_path(&video_id, &language, &length)?;
    let record = state.store.update_tags(&key, normalize_tags(&req.tags)).await?;
    Ok(Json(record))
}

async fn delete_video(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> ApiResult<DeleteResponse> {
    let deleted = state.store.delete_video(&video_id).await?;
    Ok(Json(DeleteResponse { video_id, deleted }))
}
