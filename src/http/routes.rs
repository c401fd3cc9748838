//! HTTP route definitions
//!
//! The real-time core exposes no REST surface beyond health; everything
//! else rides the WebSocket at `/ws`.

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::atomic::Ordering;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    connections: usize,
    plaza_players: usize,
    football_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        connections: state.gauges.connections.load(Ordering::Relaxed),
        plaza_players: state.gauges.plaza_players.load(Ordering::Relaxed),
        football_players: state.gauges.football_players.load(Ordering::Relaxed),
    })
}
