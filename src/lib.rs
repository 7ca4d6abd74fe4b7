//! Platform Feed
//!
//! Real-time distribution of simulated platform state (aircraft, ships, ground
//! vehicles, satellites) from one server to many subscribers.
//!
//! # Features
//!
//! - **Broadcast Hub**: 10 Hz snapshot fan-out over WebSocket and server-sent events
//! - **Bounded Queues**: drop-oldest everywhere, so slow subscribers never stall the hub
//! - **Resilient Client**: linear backoff, stream fallback, heartbeat latency
//! - **Update Batcher**: delta reconstruction and 16 ms throttled delivery
//! - **Visibility Manager**: viewport culling, clustering hysteresis and trails
//!
//! # Modules
//!
//! - `types`: Core data structures (PlatformSnapshot, SimulationStatus)
//! - `protocol`: Wire messages for both directions
//! - `source`: The snapshot source seam and an in-memory implementation
//! - `api`: Hub, sessions, control path and HTTP routes
//! - `client`: Subscriber connection state machine and tokio transport
//! - `batcher`: Throttled, delta-aware update delivery
//! - `visibility`: Spatial visibility manager
//! - `config`: Server, client and visibility settings
//! - `error`: Error types
//! - `utils`: Utility functions (timestamps, bounded queue)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use platform_feed::{create_router, AppState, InMemorySource, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = Arc::new(InMemorySource::with_demo_platforms(500));
//!     let config = ServerConfig::default();
//!     let state = Arc::new(AppState::new(source, config.clone()));
//!     state.spawn_tasks();
//!
//!     let listener = tokio::net::TcpListener::bind(config.addr()).await.unwrap();
//!     axum::serve(listener, create_router(state)).await.unwrap();
//! }
//! ```

pub mod api;
pub mod batcher;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod source;
pub mod types;
pub mod utils;
pub mod visibility;

// Re-export commonly used items at crate root
pub use api::websocket::{AppState, BroadcastHub};
pub use api::{create_router, Controller};
pub use batcher::UpdateBatcher;
pub use client::{ClientDriver, ClientEvent, ConnectionState, TokioTransport, TransportClient};
pub use config::{ClientConfig, ServerConfig, TransportMode, VisibilityConfig};
pub use error::{ConfigError, FeedError, FeedResult, SourceError};
pub use source::{InMemorySource, SnapshotSource};
pub use types::{Category, PlatformSnapshot, Position, SimulationStatus, SnapshotBatch, Statistics};
pub use visibility::{HeadlessBackend, Viewport, VisibilityManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
