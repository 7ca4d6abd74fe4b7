//! Data types for the platform feed
//!
//! Platform snapshots and simulation status, shared by the server, the wire
//! protocol and the client.

mod platform;
mod status;

pub use platform::{heading_degrees, Category, PlatformSnapshot, Position, SnapshotBatch, Velocity};
pub use status::{SimulationStatus, Statistics};
