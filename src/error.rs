//! Error types for the feed pipeline.

use thiserror::Error;

/// Failures on the realtime path.
///
/// None of these are fatal to the process: transport failures drive the client
/// reconnect state machine, protocol failures discard one frame, capacity
/// failures drop one message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    /// Connection refused, reset or closed underneath us
    #[error("Transport error: {0}")]
    Transport(String),

    /// A frame that could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Bounded queue was full or closed
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// Connect or liveness deadline elapsed
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl FeedError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Timeouts are handled exactly like a dropped connection.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// Failures reported by a snapshot source control operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("Simulation is already running")]
    AlreadyRunning,

    #[error("Simulation is not running")]
    NotRunning,

    #[error("Source rejected the request: {0}")]
    Rejected(String),
}

/// Failures while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for binaries and top-level wiring
pub type FeedResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
