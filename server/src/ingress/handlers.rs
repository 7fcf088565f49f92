//! Webhook Ingress Handlers

use std::collections::HashMap;

use axum::{
    body::{to_bytes, Bytes},
    extract::{Path, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use super::capture::capture;
use crate::api::AppState;
use crate::{auth, pages};

/// Resolve the channel a `Host` header addresses: `<channel>.<hook_domain>`.
///
/// The port is ignored. Anything else, including the bare domain, is not a
/// webhook host.
pub fn channel_from_host(host: &str, hook_domain: &str) -> Option<String> {
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    let channel = host.strip_suffix(hook_domain)?.strip_suffix('.')?;
    (!channel.is_empty()).then(|| channel.to_string())
}

/// Path-addressed ingress.
///
/// ANY /hook/{channel}
/// ANY /hook/{channel}/{*rest}
pub async fn hook_by_path(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
) -> Response {
    let Some(channel) = params.get("channel").cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    ingest(&state, channel, request).await
}

/// Router fallback: webhook hosts go to ingress, `GET /` gets the landing
/// page, everything else is a 404.
pub async fn fallback(State(state): State<AppState>, request: Request) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(ToString::to_string));

    if let Some(channel) = host
        .as_deref()
        .and_then(|h| channel_from_host(h, &state.config.hook_domain))
    {
        return ingest(&state, channel, request).await;
    }

    if request.method() == Method::GET && request.uri().path() == "/" {
        return pages::landing(State(state)).await.into_response();
    }

    StatusCode::NOT_FOUND.into_response()
}

/// Capture one webhook, hand it to the channel's observer and reply.
#[instrument(skip(state, request), fields(method = %request.method()))]
pub async fn ingest(state: &AppState, channel: String, request: Request) -> Response {
    if !state.hub.contains(&channel).await {
        debug!(channel = %channel, "Webhook for a channel nobody observes");
        return listener_missing(state, &channel);
    }

    if let Err(rejection) = auth::authorize(state, request.headers()) {
        return rejection.into_response();
    }

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, state.config.max_body_size).await {
        Ok(body) => body,
        Err(e) => {
            warn!(channel = %channel, error = %e, "Failed to read webhook body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let payload = capture(&channel, &parts, &body, Utc::now());

    match serde_json::to_string(&payload) {
        Ok(json) => {
            if !state.hub.deliver(&channel, json).await {
                debug!(channel = %channel, "Observer left before delivery");
                return listener_missing(state, &channel);
            }
        }
        Err(e) => error!(channel = %channel, error = %e, "Failed to encode webhook payload"),
    }

    log_webhook(state, &channel, &parts.headers, &body, &payload.dump);

    let reply = state.responses.get(&channel);
    let status = StatusCode::from_u16(reply.status_code).unwrap_or(StatusCode::OK);
    if reply.echo {
        (status, payload.dump).into_response()
    } else {
        (status, reply.body).into_response()
    }
}

/// Reply for webhooks addressed to a channel with no observer.
pub fn listener_missing(state: &AppState, channel: &str) -> Response {
    (
        StatusCode::OK,
        format!(
            "Please create the listener first by visiting {}/_/{}\n",
            state.config.public_url, channel
        ),
    )
        .into_response()
}

fn log_webhook(state: &AppState, channel: &str, headers: &HeaderMap, body: &Bytes, dump: &str) {
    if !is_json(headers) {
        info!(channel = %channel, dump = %dump, "Webhook received");
        return;
    }

    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(channel = %channel, error = %e, "Webhook body is not valid JSON");
            return;
        }
    };

    match &state.formatter {
        Some(formatter) => match formatter.render(&value) {
            Ok(output) => info!(channel = %channel, output = %output, "Webhook received"),
            Err(e) => warn!(channel = %channel, error = %e, "Failed to render webhook body"),
        },
        None => info!(channel = %channel, body = %value, "Webhook received"),
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("application/json"))
}
