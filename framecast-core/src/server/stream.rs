//! `/api/stream/*` handlers

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::AppState;
use super::response::ApiError;
use crate::capture::StopAck;
use crate::error::FramecastError;
use crate::types::MULTIPART_CONTENT_TYPE;

/// Path viewers are sent to after a successful start
pub const VIDEO_PATH: &str = "/api/stream/video";

/// `POST /api/stream/start`
pub(super) async fn start(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let url = body
        .ok()
        .and_then(|Json(body)| body.get("rtsp_url").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();

    if url.trim().is_empty() {
        return Err(FramecastError::validation("RTSP URL is required").into());
    }

    let session = state.default_session();
    tokio::task::spawn_blocking(move || session.start(&url)).await??;

    Ok(Json(json!({
        "success": true,
        "message": "Stream started successfully",
        "stream_url": VIDEO_PATH,
    })))
}

/// `POST /api/stream/stop`
pub(super) async fn stop(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let session = state.default_session();
    let ack = tokio::task::spawn_blocking(move || session.stop()).await?;
    if ack == StopAck::AlreadyStopped {
        debug!("Stop requested with no stream running");
    }

    Ok(Json(json!({
        "success": true,
        "message": "Stream stopped successfully",
    })))
}

/// `GET /api/stream/video`
///
/// A `multipart/x-mixed-replace` body of JPEG parts. Empty when no stream
/// is running.
pub(super) async fn video(State(state): State<AppState>) -> Response {
    let session = state.default_session();
    let viewer = state.publisher.attach(&session);
    debug!("{} connected to {}", viewer.id, VIDEO_PATH);

    let parts = ReceiverStream::new(viewer.chunks).map(Ok::<_, Infallible>);

    (
        [
            (header::CONTENT_TYPE, MULTIPART_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, no-store"),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

/// `GET /api/stream/status`
pub(super) async fn status(State(state): State<AppState>) -> Json<Value> {
    let session = state.default_session();
    let status = session.status();
    let stats = session.metrics().snapshot();

    Json(json!({
        "success": true,
        "data": {
            "active": status.is_active(),
            "state": status.state.name(),
            "source": status.source(),
            "generation": status.generation,
            "viewers": stats.viewers,
            "stats": stats,
        }
    }))
}
