//! HTTP surface over [`RagService`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/upload` | Multipart upload, one or more `files` fields |
//! | `POST` | `/query`  | `{"query": "..."}` → `{"response": "...", "sources": [...]}` |
//! | `GET`  | `/static/*` | Snapshot JSON and saved page images |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "detail": "Could not parse PDF 'x.pdf': missing %PDF header", "code": "bad_request" }
//! ```
//!
//! `bad_request` (400) for unusable input, `upstream_error` (502) when a model
//! server failed, `internal` (500) for everything else.
//!
//! # CORS
//!
//! All origins, methods and headers are permitted so a browser UI served from
//! another port can call the API.

use crate::error::RagError;
use crate::output::{IngestDocument, QueryAnswer, INGEST_ACK};
use crate::service::RagService;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

/// Default upload body limit: 64 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Multipart field name carrying the PDFs.
pub const UPLOAD_FIELD: &str = "files";

/// Build the application router.
pub fn router(service: Arc<RagService>, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files: Router = Router::new()
        .fallback_service(ServeDir::new(service.static_dir()))
        .layer(middleware::from_fn(hide_dotfiles));

    Router::new()
        .route("/upload", post(handle_upload))
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(service)
}

/// 404 for any `/static` path with a dot-prefixed segment (staged snapshots).
async fn hide_dotfiles(req: Request, next: Next) -> Response {
    if req.uri().path().split('/').any(|seg| seg.starts_with('.')) {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(req).await
}

/// Bind `bind_addr` and serve until the process is stopped.
pub async fn serve(
    service: Arc<RagService>,
    bind_addr: &str,
    body_limit: usize,
) -> std::io::Result<()> {
    let app = router(service, body_limit);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    code: &'static str,
}

/// An error that converts into a JSON HTTP response.
struct ApiError {
    status: StatusCode,
    code: &'static str,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            detail: detail.into(),
        }
    }
}

impl From<RagError> for ApiError {
    fn from(e: RagError) -> Self {
        let detail = e.to_string();
        if e.is_client_error() {
            warn!("Rejected request: {}", detail);
            ApiError::bad_request(detail)
        } else if e.is_upstream_error() {
            error!("Model failure: {}", detail);
            ApiError {
                status: StatusCode::BAD_GATEWAY,
                code: "upstream_error",
                detail,
            }
        } else {
            error!("Internal failure: {}", detail);
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                detail,
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.detail,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
}

async fn handle_upload(
    State(service): State<Arc<RagService>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("reading '{filename}': {e}")))?;
        documents.push(IngestDocument::new(filename, bytes.to_vec()));
    }

    service.ingest(documents).await?;
    Ok(Json(UploadResponse {
        message: INGEST_ACK,
    }))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

async fn handle_query(
    State(service): State<Arc<RagService>>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryAnswer>, ApiError> {
    let Json(req) = body.map_err(|e| {
        warn!("Rejected /query body: {}", e.body_text());
        ApiError::bad_request(e.body_text())
    })?;
    Ok(Json(service.query(&req.query).await?))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
