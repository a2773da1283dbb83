//! `/api/settings` handlers

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde_json::{Value, json};

use super::AppState;
use super::response::{ApiError, json_body};

/// `GET /api/settings`
pub(super) async fn get(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": state.settings.get(),
    }))
}

/// `POST /api/settings`
pub(super) async fn update(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    let saved = state.settings.upsert(&body)?;
    Ok(Json(json!({
        "success": true,
        "message": "Settings updated successfully",
        "data": saved,
    })))
}
