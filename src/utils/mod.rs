//! Utility functions and helpers
//!
//! Timestamp helpers and the drop-oldest bounded queue used on every realtime path.

pub mod queue;
pub mod time;

pub use queue::{bounded, Offer, QueueReceiver, QueueSender};
pub use time::{millis_since, now_millis};
