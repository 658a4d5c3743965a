//! HTTP surface for Couchcast
//!
//! Maps routes onto the session manager, catalog browser, and thumbnail
//! service. Media files are served under `/media` with range support so the
//! receiver can stream the exact URL a cast composed.

pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::session::SessionManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Cast session manager
    pub session: Arc<SessionManager>,
    /// Root folder of the media library
    pub library_root: PathBuf,
    /// Path to the ffmpeg binary for thumbnail extraction
    pub ffmpeg_path: PathBuf,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let media_dir = ServeDir::new(&state.library_root);

    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Receiver selection
                .route("/receivers", get(handlers::list_receivers))
                .route("/connect", post(handlers::connect))
                .route("/disconnect", post(handlers::disconnect))
                // Transport control
                .route("/cast", post(handlers::cast))
                .route("/playpause", post(handlers::play_pause))
                .route("/seek", post(handlers::seek))
                .route("/stop", post(handlers::stop))
                // Status polling
                .route("/status", get(handlers::status))
                .route("/position", get(handlers::position))
                .route("/duration", get(handlers::duration))
                // Catalog
                .route("/browse", get(handlers::browse_root))
                .route("/browse/", get(handlers::browse_root))
                .route("/browse/*path", get(handlers::browse)),
        )
        // Thumbnails
        .route("/thumb/*path", get(handlers::thumbnail))
        // Media streaming for receivers (range requests)
        .nest_service("/media", media_dir)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "couchcast-srv",
        "version": env!("CARGO_PKG_VERSION"),
        "library_root": state.library_root.to_string_lossy(),
    }))
}
