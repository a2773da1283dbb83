//! JSON envelopes and error mapping for the HTTP API

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::error::FramecastError;

/// Error message returned when a stream cannot be opened
pub const STREAM_OPEN_FAILED: &str = "Failed to open RTSP stream";

/// An error rendered as `{ success: false, error }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    error: String,
}

impl ApiError {
    /// Create an error response
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    /// 400 response
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// 500 response
    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    /// HTTP status
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<FramecastError> for ApiError {
    fn from(err: FramecastError) -> Self {
        match err.root() {
            FramecastError::Validation(msg) => Self::bad_request(msg.clone()),
            FramecastError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err.root().to_string()),
            FramecastError::StreamOpen { .. } => {
                warn!("{}", err);
                Self::bad_request(STREAM_OPEN_FAILED)
            }
            _ => {
                error!("Request failed: {}", err);
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!("Blocking task failed: {}", err);
        Self::internal(format!("Internal task failed: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "success": false,
                "error": self.error,
            })),
        )
            .into_response()
    }
}

/// Unwrap a JSON request body, rejecting bad bodies with the usual envelope
pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}
