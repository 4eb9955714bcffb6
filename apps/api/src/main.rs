mod analysis_client;
mod config;
mod errors;
mod extraction;
mod routes;
mod session;
mod state;
mod workflow;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis_client::{AnalysisClient, HttpTransport};
use crate::config::Config;
use crate::extraction::TextExtractor;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV pipeline API v{}", env!("CARGO_PKG_VERSION"));

    // Analysis service client
    let transport = HttpTransport::new(&config.analysis_service_url, config.analysis_timeout)
        .context("Failed to build analysis service transport")?;
    let analysis = AnalysisClient::new(Arc::new(transport), config.shape_policy);
    info!(
        "Analysis client initialized ({}, timeout {}s, {:?} responses)",
        config.analysis_service_url,
        config.analysis_timeout.as_secs(),
        config.shape_policy
    );

    // Text extraction
    let extractor = if config.pdf_engine_enabled {
        TextExtractor::with_lopdf()
    } else {
        warn!("PDF engine disabled; PDF uploads will be rejected");
        TextExtractor::without_pdf_engine()
    };

    let state = AppState::new(analysis, extractor);

    // Abandoned sessions are closed once idle past the timeout
    let sweep_every = (config.session_idle_timeout / 4).max(Duration::from_secs(1));
    state
        .sessions
        .spawn_sweeper(config.session_idle_timeout, sweep_every);
    info!(
        "Session idle timeout {}s (sweep every {}s)",
        config.session_idle_timeout.as_secs(),
        sweep_every.as_secs()
    );

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
