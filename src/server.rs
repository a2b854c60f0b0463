//! HTTP API server.
//!
//! Exposes the analysis operations as a JSON HTTP API. Authentication is
//! handled upstream: a trusted proxy resolves the caller and forwards the
//! identity in the `x-caller-identity` header. Requests without it are
//! rejected with 401.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/uploads/{file_name}` | Upload a `.txt` / `.csv` file (raw body) |
//! | `GET`  | `/uploads` | List the caller's files |
//! | `GET`  | `/uploads/{file_id}` | Get one file record |
//! | `DELETE` | `/uploads/{file_id}` | Delete a file |
//! | `POST` | `/analysis/per-unit/{file_id}` | Per-unit analysis |
//! | `POST` | `/analysis/whole-document/{file_id}` | Whole-document analysis |
//! | `GET`  | `/analysis/results` | List the caller's results |
//! | `GET`  | `/analysis/download/{result_id}?format=csv\|json` | Download a result (default `csv`) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_input", "message": "no text to analyze" } }
//! ```
//!
//! Error codes: `unauthenticated` (401), `bad_input` (400), `not_found` (404),
//! `upstream` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use sentiment_harness_core::analysis::{Analyzer, PerUnitResponse, WholeDocumentResponse};
use sentiment_harness_core::error::AnalysisError;
use sentiment_harness_core::models::{ResultSummary, SourceFile};

use crate::config::Config;
use crate::service;

/// Header carrying the authenticated caller identity.
pub const IDENTITY_HEADER: &str = "x-caller-identity";

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    analyzer: Arc<Analyzer>,
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let analyzer = Arc::new(service::build_analyzer(config).await?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;

    info!(bind = %config.server.bind, "server listening");
    println!("Sentiment Harness listening on http://{}", config.server.bind);

    axum::serve(listener, router(analyzer)).await?;
    Ok(())
}

/// Build the API router around an analyzer.
pub fn router(analyzer: Arc<Analyzer>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/uploads", get(handle_list_files))
        .route(
            "/uploads/{key}",
            post(handle_upload)
                .get(handle_get_file)
                .delete(handle_delete_file),
        )
        .route("/analysis/per-unit/{file_id}", post(handle_per_unit))
        .route("/analysis/whole-document/{file_id}", post(handle_whole_document))
        .route("/analysis/results", get(handle_list_results))
        .route("/analysis/download/{result_id}", get(handle_download))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(AppState { analyzer })
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

/// Internal error type that converts into an Axum HTTP response.
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

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        let status = match err {
            AnalysisError::NotFoundOrUnauthorized(_) => StatusCode::NOT_FOUND,
            AnalysisError::BadInput(_) => StatusCode::BAD_REQUEST,
            AnalysisError::Upstream { .. } => {
                warn!("upstream failure: {}", err);
                StatusCode::BAD_GATEWAY
            }
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ Caller identity ============

/// The caller identity forwarded by the auth proxy.
struct Caller(String);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Caller(v.to_string()))
            .ok_or_else(|| AppError {
                status: StatusCode::UNAUTHORIZED,
                code: "unauthenticated".to_string(),
                message: format!("missing {} header", IDENTITY_HEADER),
            })
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /uploads ============

#[derive(Serialize)]
struct FileListResponse {
    files: Vec<SourceFile>,
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: String,
}

async fn handle_upload(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(file_name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<SourceFile>), AppError> {
    let file = state
        .analyzer
        .upload(&file_name, body.to_vec(), &caller)
        .await?;
    Ok((StatusCode::CREATED, Json(file)))
}

async fn handle_list_files(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<FileListResponse>, AppError> {
    let files = state.analyzer.list_files(&caller).await?;
    Ok(Json(FileListResponse { files }))
}

async fn handle_get_file(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(file_id): Path<String>,
) -> Result<Json<SourceFile>, AppError> {
    Ok(Json(state.analyzer.get_file(&file_id, &caller).await?))
}

async fn handle_delete_file(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(file_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    state.analyzer.delete_file(&file_id, &caller).await?;
    Ok(Json(DeleteResponse { deleted: file_id }))
}

// ============ /analysis ============

#[derive(Serialize)]
struct ResultListResponse {
    results: Vec<ResultSummary>,
}

#[derive(Deserialize)]
struct DownloadParams {
    format: Option<String>,
}

async fn handle_per_unit(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(file_id): Path<String>,
) -> Result<Json<PerUnitResponse>, AppError> {
    Ok(Json(
        state
            .analyzer
            .run_per_unit_analysis(&file_id, &caller)
            .await?,
    ))
}

async fn handle_whole_document(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(file_id): Path<String>,
) -> Result<Json<WholeDocumentResponse>, AppError> {
    Ok(Json(
        state
            .analyzer
            .run_whole_document_analysis(&file_id, &caller)
            .await?,
    ))
}

async fn handle_list_results(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<ResultListResponse>, AppError> {
    let results = state.analyzer.list_results(&caller).await?;
    Ok(Json(ResultListResponse { results }))
}

async fn handle_download(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(result_id): Path<String>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, AppError> {
    let format = params.format.as_deref().unwrap_or("csv");
    let export = state
        .analyzer
        .download_result(&result_id, format, &caller)
        .await?;

    let disposition = format!("attachment; filename=\"{}\"", export.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, export.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.bytes,
    )
        .into_response())
}
