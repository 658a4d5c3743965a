//! HTTP request handlers
//!
//! Error mapping: discovery failures are 502, connect timeouts 504, casting
//! without a receiver 409, malformed seek positions 400. Status polling
//! endpoints always answer 200 so the browser UI can poll while idle.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::AppState;
use crate::error::CastError;
use crate::library;
use crate::thumbs;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
pub struct ReceiversResponse {
    receivers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
pub struct CastRequest {
    path: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    action: String,
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    position: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct DurationResponse {
    duration: u64,
}

#[derive(Debug, Deserialize)]
pub struct SeekParams {
    time: String,
}

#[derive(Debug, Serialize)]
pub struct SeekResponse {
    time: u64,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    receiver: Option<String>,
    now_playing: Option<String>,
    playing: bool,
    position: Option<f64>,
    duration: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct BrowseResponse {
    path: String,
    entries: Vec<library::Entry>,
}

type ErrorReply = (StatusCode, Json<ErrorResponse>);

fn cast_error(err: CastError) -> ErrorReply {
    let status = match &err {
        CastError::Discovery(_) | CastError::Receiver(_) => StatusCode::BAD_GATEWAY,
        CastError::ConnectionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CastError::Precondition(_) => StatusCode::CONFLICT,
        CastError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn common_error(err: couchcast_common::Error) -> ErrorReply {
    let status = match &err {
        couchcast_common::Error::NotFound(_) => StatusCode::NOT_FOUND,
        couchcast_common::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Receiver Selection
// ============================================================================

/// GET /api/v1/receivers - fresh discovery scan
pub async fn list_receivers(
    State(state): State<AppState>,
) -> Result<Json<ReceiversResponse>, ErrorReply> {
    let receivers = state.session.list_receivers().await.map_err(|e| {
        error!("Receiver discovery failed: {}", e);
        cast_error(e)
    })?;
    Ok(Json(ReceiversResponse { receivers }))
}

/// POST /api/v1/connect - bind the session to a named receiver
pub async fn connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<StatusCode, ErrorReply> {
    info!("Connect request: {}", req.name);
    state.session.connect(&req.name).await.map_err(|e| {
        error!("Connect to {} failed: {}", req.name, e);
        cast_error(e)
    })?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/disconnect - release the receiver, always safe
pub async fn disconnect(State(state): State<AppState>) -> Result<StatusCode, ErrorReply> {
    state.session.disconnect().await.map_err(cast_error)?;
    Ok(StatusCode::OK)
}

// ============================================================================
// Transport Control
// ============================================================================

/// POST /api/v1/cast - load and play a library item on the bound receiver
pub async fn cast(
    State(state): State<AppState>,
    Json(req): Json<CastRequest>,
) -> Result<StatusCode, ErrorReply> {
    info!("Cast request: {}", req.path);
    state.session.cast(&req.path).await.map_err(|e| {
        error!("Cast of {} failed: {}", req.path, e);
        cast_error(e)
    })?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/playpause - toggle and report the action taken
pub async fn play_pause(State(state): State<AppState>) -> Result<Json<ActionResponse>, ErrorReply> {
    let action = state
        .session
        .toggle_play_pause()
        .await
        .map_err(cast_error)?;
    Ok(Json(ActionResponse {
        action: action.to_string(),
    }))
}

/// POST /api/v1/seek?time=N - seek to a whole-second offset
///
/// The position must parse as a non-negative integer; anything else is
/// rejected before any receiver command is issued.
pub async fn seek(
    State(state): State<AppState>,
    Query(params): Query<SeekParams>,
) -> Result<Json<SeekResponse>, ErrorReply> {
    let time: u64 = params.time.parse().map_err(|_| {
        cast_error(CastError::InvalidArgument(format!(
            "seek position must be an integer, got {:?}",
            params.time
        )))
    })?;
    state.session.seek(time as f64).await.map_err(cast_error)?;
    Ok(Json(SeekResponse { time }))
}

/// POST /api/v1/stop - stop playback, clear now_playing
pub async fn stop(State(state): State<AppState>) -> Result<StatusCode, ErrorReply> {
    state.session.stop().await.map_err(cast_error)?;
    Ok(StatusCode::OK)
}

// ============================================================================
// Status Polling
// ============================================================================

/// GET /api/v1/status - one-shot session snapshot for the browser UI
pub async fn status(State(state): State<AppState>) -> Json<SessionStatusResponse> {
    let snapshot = state.session.snapshot().await;
    Json(SessionStatusResponse {
        receiver: snapshot.receiver,
        now_playing: snapshot.now_playing,
        playing: snapshot.playing,
        position: snapshot.position,
        duration: snapshot.duration,
    })
}

/// GET /api/v1/position - current playback offset; null while idle
pub async fn position(State(state): State<AppState>) -> Json<PositionResponse> {
    Json(PositionResponse {
        position: state.session.position().await,
    })
}

/// GET /api/v1/duration - whole seconds, 404 while nothing is loaded
pub async fn duration(
    State(state): State<AppState>,
) -> Result<Json<DurationResponse>, ErrorReply> {
    match state.session.duration().await {
        Some(secs) => Ok(Json(DurationResponse {
            duration: secs.floor() as u64,
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "duration unavailable".to_string(),
            }),
        )),
    }
}

// ============================================================================
// Catalog and Thumbnails
// ============================================================================

/// GET /api/v1/browse - library root listing
pub async fn browse_root(state: State<AppState>) -> Result<Json<BrowseResponse>, ErrorReply> {
    browse_at(state, String::new()).await
}

/// GET /api/v1/browse/{path} - subdirectory listing
pub async fn browse(
    state: State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<BrowseResponse>, ErrorReply> {
    browse_at(state, path).await
}

async fn browse_at(
    State(state): State<AppState>,
    path: String,
) -> Result<Json<BrowseResponse>, ErrorReply> {
    let entries = library::browse(&state.library_root, &path).map_err(common_error)?;
    Ok(Json(BrowseResponse { path, entries }))
}

/// GET /thumb/{path} - cached still frame for a media file
pub async fn thumbnail(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ErrorReply> {
    let bytes = thumbs::thumbnail(&state.ffmpeg_path, &state.library_root, &path)
        .await
        .map_err(|e| {
            error!("Thumbnail for {} failed: {}", path, e);
            common_error(e)
        })?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes))
}
