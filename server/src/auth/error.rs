//! Authentication Error Types

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Diagnostic header naming why a request was rejected.
pub static ERROR_HEADER: HeaderName = HeaderName::from_static("x-hooktap-err");

/// Shared-secret check failures.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No Authorization header was sent.
    #[error("Missing authorization header")]
    MissingAuthHeader,

    /// The Authorization header does not carry the configured token.
    #[error("Incorrect authorization header")]
    IncorrectAuthHeader,
}

impl AuthError {
    /// Pair this failure with the status code the server answers it with.
    pub const fn with_status(self, status: StatusCode) -> AuthRejection {
        AuthRejection {
            error: self,
            status,
        }
    }
}

/// Error body for rejected requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `"error"`.
    pub status: &'static str,
}

/// An [`AuthError`] ready to be sent, using the configured status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRejection {
    /// What failed.
    pub error: AuthError,
    /// Status to answer with.
    pub status: StatusCode,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(ErrorResponse { status: "error" })).into_response();
        response.headers_mut().insert(
            ERROR_HEADER.clone(),
            HeaderValue::from_static(match self.error {
                AuthError::MissingAuthHeader => "Missing authorization header",
                AuthError::IncorrectAuthHeader => "Incorrect authorization header",
            }),
        );
        response
    }
}

/// Result type for auth checks.
pub type AuthResult<T> = Result<T, AuthError>;
