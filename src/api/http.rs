//! HTTP server setup with Axum

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::rest::{platforms, simulation};
use super::sse::sse_handler;
use super::websocket::{handler::ws_handler, state::AppState};

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - allow all origins for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Realtime transports
        .route("/ws", get(ws_handler))
        .route("/events", get(sse_handler))
        // Health check
        .route("/health", get(health_check))
        // REST API endpoints
        .route("/api/platforms", get(platforms::get_platforms))
        .route("/api/statistics", get(platforms::get_statistics))
        .route("/api/info", get(platforms::get_info))
        .route("/api/status", get(simulation::get_status))
        .route("/api/simulation/start", post(simulation::start))
        .route("/api/simulation/stop", post(simulation::stop))
        .route("/api/simulation/reset", post(simulation::reset))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
