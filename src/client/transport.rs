//! The seam between the client state machine and the network

use crate::config::TransportMode;
use crate::error::FeedError;

use super::state::ConnectionId;

/// Something that happened on one connection attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established and delivering frames
    Opened,
    /// One text frame (or one event-stream `data` payload)
    Frame(String),
    /// Body of the initial-state request made in stream mode
    InitialState(String),
    /// Traffic that carries no frame (control frames, keep-alive comments)
    KeepAlive,
    /// The peer closed the connection
    Closed,
    /// The attempt or the established connection failed
    Failed(String),
}

/// Opens and drives connections on behalf of the client.
///
/// Implementations report progress as `(ConnectionId, TransportEvent)` pairs through
/// whatever channel they share with their driver. Every method returns without
/// waiting on the network.
pub trait Transport {
    /// Begin connecting. Exactly one of `Opened` or `Failed` follows, unless the
    /// attempt is closed first.
    fn open(&mut self, id: ConnectionId, mode: TransportMode);

    /// Queue a text frame on an open duplex connection
    fn send(&mut self, id: ConnectionId, text: String) -> Result<(), FeedError>;

    /// Tear down the connection. Events for `id` may still be in flight.
    fn close(&mut self, id: ConnectionId);

    /// Request the full current state over plain HTTP; answered with `InitialState`
    fn fetch_initial_state(&mut self, id: ConnectionId);
}
