//! Runtime configuration.
//!
//! Every tunable of the pipeline lives here with its default. Server settings can be
//! loaded from a JSON file; missing keys fall back to the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Broadcast hub settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Snapshot cadence (100 ms = 10 Hz)
    pub tick_interval_ms: u64,
    /// Capacity of the hub's outbound queue in front of the dispatcher
    pub outbound_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            outbound_capacity: 64,
        }
    }
}

impl HubConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Per-session settings for both the duplex and the stream flavour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub queue_capacity: usize,
    /// Must stay below `read_deadline_secs` so a healthy peer never times out
    pub ping_interval_secs: u64,
    pub read_deadline_secs: u64,
    pub write_timeout_secs: u64,
    pub max_frame_bytes: usize,
    pub keep_alive_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            ping_interval_secs: 54,
            read_deadline_secs: 60,
            write_timeout_secs: 10,
            max_frame_bytes: 64 * 1024,
            keep_alive_secs: 30,
        }
    }
}

impl SessionConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn read_deadline(&self) -> Duration {
        Duration::from_secs(self.read_deadline_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Top-level server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub hub: HubConfig,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            hub: HubConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from a JSON file, or return defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                serde_json::from_str(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("hub.tick_interval_ms must be > 0".into()));
        }
        if self.hub.outbound_capacity == 0 || self.session.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue capacities must be > 0".into()));
        }
        if self.session.ping_interval_secs >= self.session.read_deadline_secs {
            return Err(ConfigError::Invalid(
                "session.ping_interval_secs must be below session.read_deadline_secs".into(),
            ));
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Which transport the client is using
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Persistent WebSocket connection
    Duplex,
    /// One-way server-sent event stream
    Stream,
}

/// Subscriber client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base HTTP URL of the feed server, e.g. `http://127.0.0.1:8080`
    pub url: String,
    pub reconnect_base_ms: u64,
    pub reconnect_cap_ms: u64,
    pub max_reconnect_attempts: u32,
    pub connect_timeout_ms: u64,
    pub heartbeat_ms: u64,
    /// Longest silence on an open connection before it is treated as dead
    pub liveness_timeout_ms: u64,
    pub preferred_mode: TransportMode,
    pub fallback_enabled: bool,
    pub batcher: BatcherConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            reconnect_base_ms: 5_000,
            reconnect_cap_ms: 30_000,
            max_reconnect_attempts: 10,
            connect_timeout_ms: 10_000,
            heartbeat_ms: 30_000,
            liveness_timeout_ms: 60_000,
            preferred_mode: TransportMode::Duplex,
            fallback_enabled: true,
            batcher: BatcherConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    /// WebSocket endpoint derived from the base URL
    pub fn ws_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/ws", base)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }
}

/// Update batcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Throttle window between the first enqueue and the flush
    pub throttle_ms: u64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self { throttle_ms: 16 }
    }
}

impl BatcherConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// Spatial visibility settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Fraction of the lat/lon span added on every side of the viewport
    pub padding_fraction: f64,
    pub cluster_upper: usize,
    pub cluster_lower: usize,
    pub trail_max_points: usize,
    pub trails_enabled: bool,
    pub base_marker_size: f64,
    pub scale_with_zoom: bool,
    /// Zoom level at which the base size applies unscaled
    pub reference_zoom: f64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            padding_fraction: 0.1,
            cluster_upper: 1000,
            cluster_lower: 500,
            trail_max_points: 20,
            trails_enabled: true,
            base_marker_size: 8.0,
            scale_with_zoom: true,
            reference_zoom: 6.0,
        }
    }
}

impl VisibilityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster_lower >= self.cluster_upper {
            return Err(ConfigError::Invalid(
                "cluster_lower must be below cluster_upper".into(),
            ));
        }
        if self.padding_fraction < 0.0 {
            return Err(ConfigError::Invalid("padding_fraction must be >= 0".into()));
        }
        if self.trail_max_points == 0 {
            return Err(ConfigError::Invalid("trail_max_points must be > 0".into()));
        }
        Ok(())
    }
}
