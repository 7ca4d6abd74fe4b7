//! Subscriber client
//!
//! A resilient connection to the feed server that survives restarts and network
//! blips. The state machine in [`connection`] is pure and driven by events and a
//! virtual clock; [`net`] and [`driver`] bind it to tokio, tokio-tungstenite and
//! reqwest.
//!
//! ## Features
//! - Linear, capped reconnect backoff with a bounded attempt count
//! - One-time fallback from WebSocket to the event stream
//! - Heartbeat pings and a smoothed latency estimate
//! - Throttled, delta-aware delivery of platform updates

pub mod connection;
pub mod driver;
pub mod event_stream;
pub mod listeners;
pub mod net;
pub mod scheduler;
pub mod state;
pub mod transport;

pub use connection::{ClientEvent, TransportClient};
pub use driver::{ClientCommand, ClientDriver, ClientHandle};
pub use listeners::{ListenerId, Listeners};
pub use net::TokioTransport;
pub use scheduler::{Scheduler, TimerHandle, TimerQueue, TimerTask};
pub use state::{ConnectionId, ConnectionState, LatencyEstimator, ReconnectPolicy};
pub use transport::{Transport, TransportEvent};
