//! Sentinel Server - REST API for invoice red-flag detection
//!
//! Each client opens a session, uploads invoices (or pre-extracted records)
//! in order and downloads the flag report as JSON or CSV.

use std::net::SocketAddr;

use sentinel_core::{ExtractorConfig, ExtractorFactory};
use sentinel_server::{create_router_with_config, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("sentinel_server=info,sentinel_core=info,tower_http=info")
        }))
        .init();

    let config = Config::from_env()?;
    let extractor = ExtractorFactory::create(ExtractorConfig::from_env()?)?;

    let app = create_router_with_config(&config, extractor);
    let addr = config.socket_addr();

    tracing::info!(
        %addr,
        max_sessions = config.max_sessions,
        max_concurrent_extractions = config.max_concurrent_extractions,
        same_layout_threshold = config.engine.same_layout_threshold,
        different_layout_threshold = config.engine.different_layout_threshold,
        "Sentinel server listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    // Peer addresses are needed by the rate limiter's IP key extractor
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
