//! Response Override Handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::error::OverrideError;
use crate::api::AppState;

/// Body returned after a successful update.
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    /// Always `"ok"`.
    pub status: &'static str,
}

/// Change the reply webhook senders get for a channel.
///
/// POST /api/{channel}/update
#[instrument(skip(state, body))]
pub async fn update_response(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    body: Bytes,
) -> Result<Json<UpdateResponse>, OverrideError> {
    match state.responses.update(&channel, &body) {
        Ok(applied) => {
            info!(
                channel = %channel,
                status_code = applied.status_code,
                echo = applied.echo,
                "Response override updated"
            );
            Ok(Json(UpdateResponse { status: "ok" }))
        }
        Err(e) => {
            warn!(channel = %channel, error = %e, "Rejected response override update");
            Err(e)
        }
    }
}
