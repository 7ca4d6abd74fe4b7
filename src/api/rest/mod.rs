//! REST API module for non-realtime needs
//!
//! - `GET /api/platforms` - Full snapshot, used by stream subscribers after connecting
//! - `GET /api/status` - Simulation run state
//! - `GET /api/statistics` - Platform counts per category
//! - `POST /api/simulation/{start,stop,reset}` - Run-state control
//! - `GET /api/info` - Hub counters

pub mod platforms;
pub mod simulation;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::SourceError;

/// Error returned by the REST endpoints
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        let status = match e {
            SourceError::AlreadyRunning | SourceError::NotRunning => StatusCode::CONFLICT,
            SourceError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
