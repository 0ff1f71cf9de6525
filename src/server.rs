//! JSON HTTP server.
//!
//! Exposes the retrieval engine to agent frameworks and UIs.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Per-capability health, mode, and version |
//! | `POST` | `/tools/search` | Run a search request |
//! | `POST` | `/tools/get` | Fetch one document by id |
//! | `POST` | `/tools/list_documents` | Page through the corpus |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid request: query must not be empty" } }
//! ```
//!
//! Messages carry the classification only (`"graph store unavailable"`);
//! the underlying adapter error is logged, never returned.
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `not_found` | 404 |
//! | `embedding_unavailable` | 503 |
//! | `store_unavailable` | 503 |
//! | `all_sources_unavailable` | 503 |
//! | `internal` | 500 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based research
//! UIs can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use research_harness_core::error::RetrievalError;
use research_harness_core::models::{
    Document, MetadataFilter, RetrievalRequest, SearchResponse, Strategy,
};

use crate::config::Config;
use crate::orchestrator::{HealthReport, HealthStatus, RetrievalOrchestrator};

#[derive(Clone)]
struct AppState {
    engine: Arc<RetrievalOrchestrator>,
}

/// Build the router. Exposed separately from [`run_server`] so callers can
/// mount it on their own listener.
pub fn router(engine: Arc<RetrievalOrchestrator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/search", post(handle_search))
        .route("/tools/get", post(handle_get))
        .route("/tools/list_documents", post(handle_list_documents))
        .layer(cors)
        .with_state(AppState { engine })
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(RetrievalOrchestrator::from_config(config).await?);
    let mode = engine.mode();
    let app = router(engine);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, %mode, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
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
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        let status = match &err {
            RetrievalError::Validation(_) => StatusCode::BAD_REQUEST,
            RetrievalError::StoreUnavailable { .. }
            | RetrievalError::EmbeddingUnavailable(_)
            | RetrievalError::AllSourcesUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RetrievalError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.public_message(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    #[serde(flatten)]
    report: HealthReport,
    version: String,
}

/// 200 while at least one capability answers; 503 when none do.
async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let report = state.engine.health().await;
    let status = match report.status {
        HealthStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };
    (
        status,
        Json(HealthResponse {
            report,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

// ============ POST /tools/search ============

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    strategy: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    text_weight: Option<f64>,
    #[serde(default)]
    include_timeline: bool,
}

async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<SearchParams>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(params) = payload?;

    let strategy = match params.strategy.as_deref() {
        Some(s) => s.parse::<Strategy>()?,
        None => Strategy::Hybrid,
    };
    let mut request = RetrievalRequest::new(params.query, strategy)
        .with_limit(
            params
                .limit
                .unwrap_or(state.engine.settings().default_limit),
        )
        .with_timeline(params.include_timeline);
    request.text_weight = params.text_weight;

    let response = state.engine.search(request).await?;
    Ok(Json(response))
}

// ============ POST /tools/get ============

#[derive(Deserialize)]
struct GetParams {
    id: String,
}

async fn handle_get(
    State(state): State<AppState>,
    payload: Result<Json<GetParams>, JsonRejection>,
) -> Result<Json<Document>, AppError> {
    let Json(params) = payload?;
    match state.engine.get_document(&params.id).await? {
        Some(doc) => Ok(Json(doc)),
        None => Err(not_found(format!("document not found: {}", params.id))),
    }
}

// ============ POST /tools/list_documents ============

#[derive(Deserialize)]
struct ListParams {
    #[serde(default = "default_list_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    filter: Option<MetadataFilter>,
}

fn default_list_limit() -> usize {
    10
}

#[derive(Serialize)]
struct ListResponse {
    documents: Vec<Document>,
    limit: usize,
    offset: usize,
}

async fn handle_list_documents(
    State(state): State<AppState>,
    payload: Result<Json<ListParams>, JsonRejection>,
) -> Result<Json<ListResponse>, AppError> {
    let Json(params) = payload?;
    let documents = state
        .engine
        .list_documents(params.limit, params.offset, params.filter.as_ref())
        .await?;
    Ok(Json(ListResponse {
        documents,
        limit: params.limit,
        offset: params.offset,
    }))
}
