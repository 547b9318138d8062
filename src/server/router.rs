use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{documents, files, health, query, stores};
use crate::state::AppState;

/// Room for multipart boundaries and the small text fields around the file.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Creates the main application router with all routes and middleware.
///
/// This function sets up:
/// - CORS middleware
/// - Health check endpoint
/// - Store, upload, query and document endpoints
/// - Static front-end files when `server.static_dir` exists
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_allowed_origins);
    let upload_limit = upload_body_limit(state.settings.upload.max_upload_bytes);
    let static_dir = resolve_static_dir(&state);

    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/api/stores/create", post(stores::create_store))
        .route("/api/stores/list", get(stores::list_stores))
        .route("/api/stores/:store_id", delete(stores::delete_store))
        .route(
            "/api/files/upload",
            post(files::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/query", post(query::query_documents))
        .route("/api/documents/:store_id", get(documents::list_documents))
        .with_state(state);

    if let Some(dir) = static_dir {
        tracing::info!("Serving static files from {}", dir.display());
        app = app
            .nest_service("/static", ServeDir::new(&dir))
            .fallback_service(ServeDir::new(dir));
    }

    app.layer(cors_layer).layer(TraceLayer::new_for_http())
}

fn upload_body_limit(max_upload_bytes: u64) -> usize {
    usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
}

fn resolve_static_dir(state: &AppState) -> Option<PathBuf> {
    let configured = state.settings.server.static_dir.as_ref()?;
    let dir = if configured.is_absolute() {
        configured.clone()
    } else {
        state.paths.project_root.join(configured)
    };
    dir.is_dir().then_some(dir)
}

fn build_cors_layer(configured: &[String]) -> CorsLayer {
    let allowed_origins = resolve_allowed_origins(configured)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn resolve_allowed_origins(configured: &[String]) -> Vec<String> {
    let origins = configured
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return default_local_origins();
    }

    origins
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://localhost:8000".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}
