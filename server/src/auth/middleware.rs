//! Authentication Middleware

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::warn;

use super::error::{AuthError, AuthRejection, AuthResult};
use crate::api::AppState;

/// Check that `headers` carry `Authorization: Bearer <token>`.
///
/// The comparison runs in constant time over the whole header value.
pub fn check_bearer(headers: &HeaderMap, token: &str) -> AuthResult<()> {
    let presented = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?;

    let expected = format!("Bearer {token}");
    if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(AuthError::IncorrectAuthHeader)
    }
}

/// Check a request against the configured shared secret, if any.
pub fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AuthRejection> {
    let Some(token) = state.config.auth_token.as_deref() else {
        return Ok(());
    };

    check_bearer(headers, token).map_err(|e| {
        warn!(error = %e, "Rejected request with bad credentials");
        e.with_status(state.config.auth_failure_status)
    })
}

/// Middleware to require the shared secret on a route.
///
/// A no-op when no `AUTH_TOKEN` is configured.
///
/// # Usage
///
/// ```ignore
/// Router::new()
///     .route("/api/{channel}/update", post(handler))
///     .layer(axum::middleware::from_fn_with_state(state, require_token))
/// ```
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    authorize(&state, request.headers())?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    #[test]
    fn matching_token_passes() {
        assert_eq!(check_bearer(&headers(Some("Bearer X")), "X"), Ok(()));
    }

    #[test]
    fn wrong_token_fails() {
        assert_eq!(
            check_bearer(&headers(Some("Bearer Y")), "X"),
            Err(AuthError::IncorrectAuthHeader)
        );
        assert_eq!(
            check_bearer(&headers(Some("Bearer XX")), "X"),
            Err(AuthError::IncorrectAuthHeader)
        );
        assert_eq!(
            check_bearer(&headers(Some("X")), "X"),
            Err(AuthError::IncorrectAuthHeader)
        );
    }

    #[test]
    fn missing_header_fails() {
        assert_eq!(
            check_bearer(&headers(None), "X"),
            Err(AuthError::MissingAuthHeader)
        );
    }
}
