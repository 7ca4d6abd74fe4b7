//! Connection state, reconnect policy and latency estimate

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::config::ClientConfig;

/// Lifecycle of the subscriber connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// A failure was just observed; always followed by `Connecting` or `Failed`
    Error,
    /// Reconnect attempts exhausted; only `reset` leaves this state
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Generation number of one connection attempt.
///
/// Transport events carry it so events from a superseded attempt are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Linear backoff with a cap and a bounded number of attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_ms: u64,
    pub cap_ms: u64,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_ms: u64, cap_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_ms,
            cap_ms,
            max_attempts,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.reconnect_base_ms,
            config.reconnect_cap_ms,
            config.max_reconnect_attempts,
        )
    }

    /// `min(base * attempt, cap)` for 1-based `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = self
            .base_ms
            .saturating_mul(u64::from(attempt.max(1)))
            .min(self.cap_ms);
        Duration::from_millis(ms)
    }

    /// True once `failures` consecutive failures use up every attempt
    pub fn exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

/// Exponentially smoothed round-trip estimate in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyEstimator {
    average_ms: f64,
}

impl LatencyEstimator {
    const SMOOTHING: f64 = 0.1;

    pub fn record(&mut self, sample_ms: f64) -> f64 {
        self.average_ms = if self.average_ms == 0.0 {
            sample_ms
        } else {
            self.average_ms * (1.0 - Self::SMOOTHING) + sample_ms * Self::SMOOTHING
        };
        self.average_ms
    }

    pub fn average_ms(&self) -> f64 {
        self.average_ms
    }

    pub fn reset(&mut self) {
        self.average_ms = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff_with_cap() {
        let policy = ReconnectPolicy::new(1000, 5000, 10);
        let delays: Vec<u128> = (1..=5).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 3000, 4000, 5000]);
        assert_eq!(policy.delay_for(9).as_millis(), 5000);
    }

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::from_config(&ClientConfig::default());
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
        assert!(!policy.exhausted(9));
        assert!(policy.exhausted(10));
    }

    #[test]
    fn test_latency_smoothing() {
        let mut latency = LatencyEstimator::default();
        assert_eq!(latency.record(100.0), 100.0);
        assert!((latency.record(200.0) - 110.0).abs() < 1e-9);
        latency.reset();
        assert_eq!(latency.average_ms(), 0.0);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
        assert_eq!(
            serde_json::to_string(&ConnectionState::Connecting).unwrap(),
            r#""connecting""#
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_backoff_is_monotone_and_capped(
                base in 1u64..10_000,
                cap in 1u64..100_000,
                attempt in 1u32..1000
            ) {
                let policy = ReconnectPolicy::new(base, cap, 10);
                let here = policy.delay_for(attempt);
                let next = policy.delay_for(attempt + 1);
                prop_assert!(here <= next);
                prop_assert!(next <= Duration::from_millis(cap));
            }
        }
    }
}
