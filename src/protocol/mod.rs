//! Wire protocol for the feed
//!
//! JSON text frames tagged by a `type` field, shared by the WebSocket and
//! event-stream transports.

mod messages;

pub use messages::{ClientMessage, InboundMessage, OutboundFrame, ServerMessage};
