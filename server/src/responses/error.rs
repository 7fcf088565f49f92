//! Override Update Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Rejections of an administrative override update. The stored override is
/// never touched when one of these is returned.
#[derive(Debug, Error)]
pub enum OverrideError {
    /// The body is not a valid update document.
    #[error("Malformed update: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The requested status code cannot be sent.
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u16),
}

/// JSON body for rejected updates.
#[derive(Debug, Serialize)]
pub struct OverrideErrorResponse {
    /// Always `"error"`.
    pub status: &'static str,
    /// Human-readable reason.
    pub message: String,
}

impl IntoResponse for OverrideError {
    fn into_response(self) -> Response {
        let body = Json(OverrideErrorResponse {
            status: "error",
            message: self.to_string(),
        });
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}
