//! HTTP API for the prep pipeline.
//!
//! A thin transport wrapper around the core operations: client and file
//! listing, document upload (saved then ingested inline), and brief
//! generation. Raw documents are served straight from the data directory
//! so a frontend can open the cited source pages.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/clients` | List client ids |
//! | `GET`  | `/api/clients/{client_id}/files` | List a client's documents |
//! | `POST` | `/api/upload/{client_id}` | Upload + ingest one document (multipart `file`) |
//! | `POST` | `/api/generate_prep/{client_id}` | Generate the structured prep brief |
//! | `GET`  | `/api/documents/...` | Raw document files |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error contract
//!
//! ```json
//! { "error": { "code": "no_context", "message": "..." } }
//! ```
//!
//! Codes: `bad_request` (400), `no_context` (404), `generation_failed` (500),
//! `internal` (500).

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::brief::PrepError;
use crate::clients;
use crate::config::Config;
use crate::genai::GeminiClient;
use crate::ingest;
use crate::pipeline;
use crate::store::ChunkStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<ChunkStore>,
    genai: Arc<GeminiClient>,
}

/// Starts the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(
    config: &Config,
    store: Arc<ChunkStore>,
    genai: Arc<GeminiClient>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let data_dir = config.data.dir.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        genai,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/clients", get(handle_list_clients))
        .route("/api/clients/{client_id}/files", get(handle_list_files))
        .route("/api/upload/{client_id}", post(handle_upload))
        .route("/api/generate_prep/{client_id}", post(handle_generate_prep))
        .nest_service("/api/documents", ServeDir::new(data_dir))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!("prep server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
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

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Client ids arrive as path parameters and are used as path segments under
/// the data directory; reject anything that could traverse out of it.
fn require_valid_client_id(client_id: &str) -> Result<(), AppError> {
    if clients::valid_client_id(client_id) {
        Ok(())
    } else {
        Err(bad_request("invalid client id"))
    }
}

/// Maps prep-flow failures to the HTTP contract: no material for the client
/// is a 404 distinct from a failed generation.
fn classify_prep_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<PrepError>() {
        Some(PrepError::NoContext) => AppError {
            status: StatusCode::NOT_FOUND,
            code: "no_context".to_string(),
            message: err.to_string(),
        },
        Some(PrepError::Generation(_)) => AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "generation_failed".to_string(),
            message: err.to_string(),
        },
        None => internal(err.to_string()),
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

// ============ GET /api/clients ============

#[derive(Serialize)]
struct ClientsResponse {
    clients: Vec<String>,
}

async fn handle_list_clients(
    State(state): State<AppState>,
) -> Result<Json<ClientsResponse>, AppError> {
    let clients =
        clients::list_clients(&state.config.data.dir).map_err(|e| internal(e.to_string()))?;
    Ok(Json(ClientsResponse { clients }))
}

// ============ GET /api/clients/{client_id}/files ============

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<String>,
}

async fn handle_list_files(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<FilesResponse>, AppError> {
    require_valid_client_id(&client_id)?;
    let files = clients::list_files(&state.config.data.dir, &client_id)
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(FilesResponse { files }))
}

// ============ POST /api/upload/{client_id} ============

#[derive(Serialize)]
struct UploadResponse {
    filename: String,
    status: String,
}

async fn handle_upload(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    require_valid_client_id(&client_id)?;
    let field = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
        .ok_or_else(|| bad_request("multipart field 'file' missing"))?;

    let filename = field
        .file_name()
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("filename missing"))?;

    // Document names key store partitions; never let them traverse paths.
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(bad_request("invalid filename"));
    }

    let bytes = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;

    let client_dir = clients::client_dir(&state.config.data.dir, &client_id);
    std::fs::create_dir_all(&client_dir).map_err(|e| internal(e.to_string()))?;
    let file_path = client_dir.join(&filename);
    std::fs::write(&file_path, &bytes).map_err(|e| internal(e.to_string()))?;

    // Best-effort inline ingestion; the upload itself has succeeded.
    if let Err(e) = ingest::ingest_file(
        &state.store,
        state.genai.as_ref(),
        &client_id,
        &filename,
        &file_path,
    )
    .await
    {
        tracing::warn!(%client_id, %filename, error = %e, "uploaded file failed ingestion");
    }

    Ok(Json(UploadResponse {
        filename,
        status: "Uploaded and ingested successfully".to_string(),
    }))
}

// ============ POST /api/generate_prep/{client_id} ============

async fn handle_generate_prep(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<crate::models::PrepBrief>, AppError> {
    require_valid_client_id(&client_id)?;
    let client_dir = clients::client_dir(&state.config.data.dir, &client_id);
    let brief = pipeline::generate_prep(
        &state.store,
        state.genai.as_ref(),
        state.genai.as_ref(),
        &client_id,
        &client_dir,
        state.config.retrieval.top_k,
        state.genai.temperature(),
    )
    .await
    .map_err(classify_prep_error)?;

    Ok(Json(brief))
}
