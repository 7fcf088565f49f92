//! Shared-Secret Authentication
//!
//! Optional bearer token guarding webhook ingress and the override API.

mod error;
mod middleware;

pub use error::{AuthError, AuthRejection, AuthResult, ErrorResponse, ERROR_HEADER};
pub use middleware::{authorize, check_bearer, require_token};
