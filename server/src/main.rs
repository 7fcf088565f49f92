//! Hooktap Server - Main Entry Point

use anyhow::Result;
use std::net::SocketAddr;
use tracing::{info, warn};

use hooktap_server::{api, config, ws};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hooktap_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        hook_domain = %config.hook_domain,
        auth = config.has_auth(),
        "Starting Hooktap Server"
    );

    // Start the channel registry
    let (hub, hub_task) = ws::Hub::spawn(ws::DEFAULT_HUB_CAPACITY);

    // Build application state
    let state = api::AppState::new(config.clone(), hub.clone())?;

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_hub = hub.clone();
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, closing observers...");
        shutdown_hub.shutdown().await;
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    drop(hub);
    if let Err(e) = hub_task.await {
        warn!(error = %e, "Hub task ended abnormally");
    }

    info!("Server shutdown complete");

    Ok(())
}
