//! Platform snapshot and hub info endpoints

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::websocket::state::AppState;
use crate::types::Statistics;

/// GET /api/platforms
///
/// Untagged `{platforms, timestamp}` body; subscribers read it like an update frame.
pub async fn get_platforms(State(state): State<Arc<AppState>>) -> Json<Value> {
    let batch = state.control.snapshot();
    Json(json!({
        "platforms": batch.platforms,
        "timestamp": batch.timestamp,
    }))
}

/// GET /api/statistics
pub async fn get_statistics(State(state): State<Arc<AppState>>) -> Json<Statistics> {
    Json(state.control.statistics())
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub sessions: usize,
    pub pending: usize,
    pub published: u64,
    pub displaced: u64,
}

/// GET /api/info
pub async fn get_info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let stats = state.hub.stats();
    Json(InfoResponse {
        name: crate::NAME.to_string(),
        version: crate::VERSION.to_string(),
        sessions: stats.sessions,
        pending: stats.pending,
        published: stats.published,
        displaced: stats.displaced,
    })
}
