//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{any, get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    auth,
    config::Config,
    format::{FormatError, Formatter},
    ingress, pages,
    responses::{self, ResponseStore},
    ws::{self, Hub, ListenerInfo},
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Channel registry
    pub hub: Hub,
    /// Per-channel replies to webhook senders
    pub responses: Arc<ResponseStore>,
    /// Parsed `OUTPUT_FORMAT` template (optional)
    pub formatter: Option<Arc<Formatter>>,
}

impl AppState {
    /// Create new application state around a running hub.
    pub fn new(config: Config, hub: Hub) -> Result<Self, FormatError> {
        let formatter = config
            .output_format
            .as_deref()
            .map(Formatter::parse)
            .transpose()?
            .map(Arc::new);

        Ok(Self {
            config: Arc::new(config),
            hub,
            responses: Arc::new(ResponseStore::new()),
            formatter,
        })
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_body_size = state.config.max_body_size;

    // Override updates need the shared secret when one is configured
    let admin_routes = Router::new()
        .route("/api/{channel}/update", post(responses::update_response))
        .route_layer(from_fn_with_state(state.clone(), auth::require_token));

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/api/listeners", get(list_listeners))
        .merge(admin_routes)
        // WebSocket
        .route("/ws/{channel}", get(ws::handler))
        // Pages
        .route("/_/{channel}", get(pages::observer))
        // Path-addressed webhooks
        .route("/hook/{channel}", any(ingress::hook_by_path))
        .route("/hook/{channel}/{*rest}", any(ingress::hook_by_path))
        // Subdomain-addressed webhooks and the landing page
        .fallback(ingress::fallback)
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_size))
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Channels with a connected observer
    listeners: usize,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    let listeners = state
        .hub
        .listeners()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(HealthResponse {
        status: "ok",
        listeners: listeners.len(),
    }))
}

/// Currently observed channels.
///
/// GET /api/listeners
async fn list_listeners(
    State(state): State<AppState>,
) -> Result<Json<Vec<ListenerInfo>>, StatusCode> {
    state
        .hub
        .listeners()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}
