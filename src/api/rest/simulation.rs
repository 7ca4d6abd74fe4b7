//! Simulation run-state endpoints

use std::sync::Arc;

use axum::{extract::State, Json};

use super::ApiError;
use crate::api::websocket::state::AppState;
use crate::types::SimulationStatus;

/// GET /api/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SimulationStatus> {
    Json(state.control.status())
}

/// POST /api/simulation/start
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<SimulationStatus>, ApiError> {
    Ok(Json(state.control.start()?))
}

/// POST /api/simulation/stop
pub async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<SimulationStatus>, ApiError> {
    Ok(Json(state.control.stop()?))
}

/// POST /api/simulation/reset
pub async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<SimulationStatus>, ApiError> {
    Ok(Json(state.control.reset()?))
}
