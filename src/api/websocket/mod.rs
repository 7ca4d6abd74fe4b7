//! WebSocket module for real-time platform updates
//!
//! Provides the WebSocket endpoint at `/ws` and the broadcast hub shared with the
//! event-stream fallback.
//!
//! ## Features
//! - Snapshot fan-out at a fixed 10 Hz cadence
//! - Bounded, drop-oldest queues end to end (freshest state wins)
//! - Liveness ping/pong with a rolling read deadline
//! - Out-of-cadence status messages on start/stop/reset

pub mod handler;
pub mod hub;
pub mod session;
pub mod state;

// Re-export commonly used items
pub use hub::{BroadcastHub, Publisher, Registration, SessionHandle, SessionKind};
pub use state::AppState;
