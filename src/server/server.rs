//! # Stand-in Backend
//!
//! An `axum` application speaking the same HTTP contract as the PharmStock
//! backend, running in its test mode: no vision model is configured, so every
//! accepted image yields the same test medication.
//!
//! ## Routes
//!
//! - `GET /` and `GET /health`: service status
//! - `POST /analyze-medication`: multipart upload, part `file`
//! - `GET /medications`, `DELETE /medications`: session storage
//! - `GET /medications/export`: session storage as CSV
//!
//! Every route taking a session reads it from the `session_id` query
//! parameter and falls back to `"default"`.

use anyhow::Result;
use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::common::config::ServerConfig;
use crate::common::messages::{
    AnalysisResponse, ApiError, ClearResponse, HealthStatus, MedicationInfo, StorageResponse,
    DEFAULT_SESSION_ID,
};
use crate::server::storage::{export_csv, MedicationStore};

/// Largest accepted upload. Phone photos routinely exceed axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

type ApiRejection = (StatusCode, Json<ApiError>);

/// Shared state of the backend: the session storage.
#[derive(Debug, Default)]
pub struct AppState {
    store: Mutex<MedicationStore>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(MedicationStore::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: Option<String>,
}

impl SessionQuery {
    fn session_id(&self) -> &str {
        self.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID)
    }
}

/// The medication returned for every accepted image in test mode.
pub fn test_medication() -> MedicationInfo {
    MedicationInfo {
        name: "Doliprane 1000mg (TEST)".to_string(),
        manufacturer: "Sanofi (TEST)".to_string(),
        expiration_date: "12/2025".to_string(),
        lot_number: "TEST123".to_string(),
        unit_count: 8,
        confidence: 0.90,
    }
}

/// Build the backend router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/analyze-medication", post(analyze_medication))
        .route("/medications", get(list_medications).delete(clear_medications))
        .route("/medications/export", get(export_medications))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the backend on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Bind the configured address and serve the backend.
pub async fn run(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.server.address).await?;
    info!("🌐 Backend running on http://{}", listener.local_addr()?);
    info!("🧪 Test mode: no vision model configured");
    serve(listener, Arc::new(AppState::new())).await
}

fn reject(status: StatusCode, detail: impl Into<String>) -> ApiRejection {
    let detail = detail.into();
    warn!("❌ {} {}", status.as_u16(), detail);
    (status, Json(ApiError { detail }))
}

async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let total = state.store.lock().await.len();
    Json(serde_json::json!({
        "message": "PharmStock Backend API",
        "version": env!("CARGO_PKG_VERSION"),
        "gemini_available": false,
        "total_medications": total,
    }))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let stored = state.store.lock().await.len();
    Json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: chrono::Local::now().to_rfc3339(),
        gemini_available: false,
        stored_medications: Some(stored),
    })
}

async fn analyze_medication(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiRejection> {
    let mut upload: Option<(String, Option<String>, usize)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        reject(
            StatusCode::BAD_REQUEST,
            format!("Requête multipart invalide: {}", e),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("image").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            reject(
                StatusCode::BAD_REQUEST,
                format!("Lecture du fichier impossible: {}", e),
            )
        })?;
        upload = Some((file_name, content_type, data.len()));
    }

    let (file_name, content_type, size) = upload
        .ok_or_else(|| reject(StatusCode::UNPROCESSABLE_ENTITY, "Aucun fichier fourni"))?;

    if !content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"))
    {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "Le fichier doit être une image",
        ));
    }

    info!(
        "📥 Received {} ({} bytes) for session '{}'",
        file_name,
        size,
        query.session_id()
    );

    let medications = vec![test_medication()];
    {
        let mut store = state.store.lock().await;
        for medication in &medications {
            store.add(query.session_id(), medication.clone());
        }
    }

    info!("✅ Analysis done: {} medication(s)", medications.len());
    Ok(Json(AnalysisResponse {
        message: format!(
            "Analyse terminée. {} médicament(s) ajouté(s) au stockage.",
            medications.len()
        ),
        medications,
        success: true,
    }))
}

async fn list_medications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Json<StorageResponse> {
    Json(state.store.lock().await.summary(query.session_id()))
}

async fn clear_medications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Json<ClearResponse> {
    let mut store = state.store.lock().await;
    let cleared = store.clear_session(query.session_id());
    info!(
        "🗑️  Cleared {} medication(s) from session '{}'",
        cleared,
        query.session_id()
    );
    Json(ClearResponse {
        message: format!("{} médicament(s) supprimé(s)", cleared),
        remaining: store.len(),
    })
}

async fn export_medications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, ApiRejection> {
    let medications = state.store.lock().await.session(query.session_id());
    if medications.is_empty() {
        return Err(reject(StatusCode::NOT_FOUND, "Aucun médicament à exporter"));
    }

    let disposition = format!(
        "attachment; filename=\"medicaments_{}_{}.csv\"",
        filename_safe(query.session_id()),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export_csv(&medications),
    ))
}

/// Keep ASCII letters, digits, `-` and `_`; anything else becomes `_`.
fn filename_safe(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
