//! Server-sent event fallback transport
//!
//! `GET /events` registers a stream session with the broadcast hub. Every message is
//! emitted as an event named after its `type`; a comment-only keep-alive goes out
//! when the stream is otherwise idle.

pub mod handler;

pub use handler::sse_handler;
