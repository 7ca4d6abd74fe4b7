//! API module for HTTP, WebSocket and event-stream endpoints
//!
//! This module is the server side of the feed: the broadcast hub, subscriber
//! sessions, the control path and the REST surface.

pub mod control;
pub mod http;
pub mod rest;
pub mod sse;
pub mod websocket;

pub use control::Controller;
pub use http::create_router;
