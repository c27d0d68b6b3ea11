//! HTTP API for the shared report dataset
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /api/upload-csv - Parse and filter a CSV, preview only
//! - POST /api/reports/save - Replace the dataset with the given rows
//! - PUT /api/reports/data - Same as save
//! - GET /api/reports/data - One page of rows plus the dataset version
//! - PATCH /api/reports/row - Edit cells of one row
//! - GET /api/reports/version - Dataset version only
//!
//! Anything else is served from the static directory.

pub mod config;
pub mod error;
pub mod logging;

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    routing::{get, patch, post},
    Json, Router,
};
use dataset::{
    pipeline::{self, Preview},
    store::{whitelisted_changes, DatasetStore, Page, PageRequest, DEFAULT_PAGE_SIZE},
    ColumnSelection, RowId,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::error::ApiError;

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<dyn DatasetStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn DatasetStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Serialize)]
struct VersionResponse {
    version: i64,
}

#[derive(Serialize)]
struct DataResponse {
    #[serde(flatten)]
    page: Page,
    version: i64,
}

#[derive(Deserialize)]
struct RowsRequest {
    #[serde(default)]
    rows: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
struct PatchRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    changes: Map<String, Value>,
}

#[derive(Deserialize, Default)]
struct UploadQuery {
    columns: Option<String>,
    only_pertinentes: Option<String>,
}

#[derive(Deserialize)]
struct DataQuery {
    page: Option<u32>,
    page_size: Option<u32>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn upload_csv_handler(
    query: Result<Query<UploadQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Preview>, ApiError> {
    let Query(mut options) = query?;
    let mut multipart = multipart?;
    let mut file = None;

    // Form fields win over query parameters.
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => file = Some(field.bytes().await?),
            "columns" => options.columns = Some(field.text().await?),
            "only_pertinentes" => options.only_pertinentes = Some(field.text().await?),
            _ => {}
        }
    }

    let bytes = file.ok_or_else(|| ApiError::BadRequest("Arquivo CSV ausente.".to_string()))?;
    let selection = upload_selection(&options)?;
    tracing::info!(bytes = bytes.len(), "previewing uploaded CSV");

    let preview = tokio::task::spawn_blocking(move || pipeline::preview_csv(&bytes, &selection))
        .await
        .map_err(|e| ApiError::Internal(format!("Erro ao processar CSV: {}", e)))?
        .map_err(|e| ApiError::dataset(e, "Erro ao processar CSV"))?;

    Ok(Json(preview))
}

async fn save_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RowsRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(body) = body?;
    let count = replace_dataset(&state, &body.rows, "Erro ao salvar").await?;
    Ok(Json(MessageResponse {
        message: format!("Salvo {} linha(s) em dados_filtrados.", count),
    }))
}

async fn replace_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RowsRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(body) = body?;
    let count = replace_dataset(&state, &body.rows, "Erro ao atualizar").await?;
    Ok(Json(MessageResponse {
        message: format!("Atualizado com {} linha(s).", count),
    }))
}

async fn data_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DataQuery>, QueryRejection>,
) -> Result<Json<DataResponse>, ApiError> {
    let Query(params) = query?;
    let request = PageRequest::new(
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )
    .map_err(|e| ApiError::dataset(e, "Erro ao ler"))?;

    let page = state
        .store
        .paginated_read(request)
        .await
        .map_err(|e| ApiError::dataset(e, "Erro ao ler"))?;
    let version = state
        .store
        .version()
        .await
        .map_err(|e| ApiError::dataset(e, "Erro ao ler"))?;

    Ok(Json(DataResponse { page, version }))
}

async fn patch_row_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PatchRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Json(body) = body?;
    let id = body
        .id
        .as_deref()
        .and_then(RowId::parse)
        .ok_or_else(|| ApiError::BadRequest("ID ausente.".to_string()))?;

    let changes = whitelisted_changes(&body.changes);
    state
        .store
        .patch_row(&id, changes)
        .await
        .map_err(|e| ApiError::dataset(e, "Erro ao atualizar"))?;

    Ok(Json(OkResponse { ok: true }))
}

async fn version_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<VersionResponse>, ApiError> {
    let version = state
        .store
        .version()
        .await
        .map_err(|e| ApiError::dataset(e, "Erro ao ler"))?;
    Ok(Json(VersionResponse { version }))
}

// ============================================================================
// Helpers
// ============================================================================

async fn replace_dataset(
    state: &AppState,
    rows: &[Map<String, Value>],
    context: &str,
) -> Result<usize, ApiError> {
    let records = pipeline::prepare_rows(rows).map_err(|e| ApiError::dataset(e, context))?;
    let count = records.len();
    state
        .store
        .replace_all(records)
        .await
        .map_err(|e| ApiError::dataset(e, context))?;
    Ok(count)
}

fn upload_selection(options: &UploadQuery) -> Result<ColumnSelection, ApiError> {
    let columns = match options.columns.as_deref().map(str::trim) {
        None | Some("") | Some("null") => None,
        Some(raw) => Some(serde_json::from_str::<Vec<String>>(raw).map_err(|e| {
            ApiError::BadRequest(format!("Parâmetro columns inválido: {}", e))
        })?),
    };
    let only_pertinent = match options.only_pertinentes.as_deref() {
        None => true,
        Some(raw) => parse_flag(raw).ok_or_else(|| {
            ApiError::BadRequest(format!("Parâmetro only_pertinentes inválido: {}", raw))
        })?,
    };
    Ok(ColumnSelection::from_options(columns, only_pertinent))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "" | "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: Arc<AppState>, static_dir: Option<&Path>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/upload-csv", post(upload_csv_handler))
        .route("/api/reports/save", post(save_handler))
        .route("/api/reports/data", get(data_handler).put(replace_handler))
        .route("/api/reports/row", patch(patch_row_handler))
        .route("/api/reports/version", get(version_handler))
        .with_state(state);

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
