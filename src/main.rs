//! Plaza server - real-time presence, proximity chat, and football
//!
//! One hub task owns all connection state; WebSocket sessions feed it
//! events and drain per-connection outboxes. The only HTTP surface is
//! the `/ws` upgrade and a health endpoint; identity, profiles, and
//! persistence belong to the platform API, which hands authenticated
//! identity over via signed tokens.

mod app;
mod config;
mod football;
mod http;
mod hub;
mod util;
mod world;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Plaza Server");
    info!("Server address: {}", config.server_addr);

    // Create application state and spawn the hub
    let (state, hub) = AppState::new(config.clone());
    tokio::spawn(hub.run());

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
