//! apr-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints and,
//! when enabled, the recurring sync scheduler.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use apr_gateway::api;
use apr_gateway::app_state::AppState;
use apr_gateway::config::{GatewayConfig, LogFormat};
use apr_gateway::persistence;
use apr_gateway::sources::{self, SampleSource, YieldSource};
use apr_gateway::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting apr-gateway");

    // Build persistence and sources
    let store = persistence::open_store(&config).await;
    let mut yield_sources = sources::build_sources(&config)?;
    if yield_sources.is_empty() {
        tracing::warn!("no yield sources configured, serving the sample catalogue");
        yield_sources.push(Arc::new(SampleSource::default()) as Arc<dyn YieldSource>);
    }

    // Build application state
    let app_state = AppState::new(&config, store, yield_sources);

    if config.sync_enabled {
        app_state.scheduler.start(config.sync_interval).await;
    }

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(app_state.clone());

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.scheduler.stop().await;
    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
