//! `/api/overlays` handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};

use super::AppState;
use super::response::{ApiError, json_body};

/// `GET /api/overlays`
pub(super) async fn list(State(state): State<AppState>) -> Json<Value> {
    let overlays = state.overlays.list();
    Json(json!({
        "success": true,
        "count": overlays.len(),
        "data": overlays,
    }))
}

/// `GET /api/overlays/:id`
pub(super) async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let overlay = state.overlays.get(&id)?;
    Ok(Json(json!({
        "success": true,
        "data": overlay,
    })))
}

/// `POST /api/overlays`
pub(super) async fn create(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body = json_body(body)?;
    let overlay = state.overlays.create(&body)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Overlay created successfully",
            "data": overlay,
        })),
    ))
}

/// `PUT /api/overlays/:id`
pub(super) async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    let overlay = state.overlays.update(&id, &body)?;
    Ok(Json(json!({
        "success": true,
        "message": "Overlay updated successfully",
        "data": overlay,
    })))
}

/// `DELETE /api/overlays/:id`
pub(super) async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.overlays.delete(&id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Overlay deleted successfully",
    })))
}
