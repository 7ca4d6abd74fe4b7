//! Simulation control shared by sessions and the REST endpoints
//!
//! Holds the snapshot source and a publisher capability; every run-state change is
//! announced to all subscribers as a `simulation_status` message.

use std::sync::Arc;

use tracing::{info, warn};

use super::websocket::hub::Publisher;
use crate::error::SourceError;
use crate::protocol::ServerMessage;
use crate::source::SnapshotSource;
use crate::types::{SimulationStatus, SnapshotBatch, Statistics};

pub struct Controller {
    source: Arc<dyn SnapshotSource>,
    publisher: Publisher,
}

impl Controller {
    pub fn new(source: Arc<dyn SnapshotSource>, publisher: Publisher) -> Self {
        Self { source, publisher }
    }

    pub fn source(&self) -> Arc<dyn SnapshotSource> {
        self.source.clone()
    }

    pub fn start(&self) -> Result<SimulationStatus, SourceError> {
        self.source.start()?;
        info!("Simulation started");
        Ok(self.announce())
    }

    pub fn stop(&self) -> Result<SimulationStatus, SourceError> {
        self.source.stop()?;
        info!("Simulation stopped");
        Ok(self.announce())
    }

    pub fn reset(&self) -> Result<SimulationStatus, SourceError> {
        self.source.reset()?;
        info!("Simulation reset");
        Ok(self.announce())
    }

    pub fn status(&self) -> SimulationStatus {
        self.source.status()
    }

    pub fn statistics(&self) -> Statistics {
        self.source.statistics()
    }

    pub fn snapshot(&self) -> SnapshotBatch {
        self.source.snapshot()
    }

    /// Full current state for a subscriber that just connected
    pub fn initial_state(&self) -> ServerMessage {
        let batch = self.source.snapshot();
        ServerMessage::PlatformUpdate {
            platforms: batch.platforms,
            timestamp: batch.timestamp,
        }
    }

    fn announce(&self) -> SimulationStatus {
        let status = self.source.status();
        if let Err(e) = self.publisher.publish_status(status.clone()) {
            warn!("Failed to publish status change: {}", e);
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::websocket::hub::BroadcastHub;
    use crate::config::HubConfig;
    use crate::source::InMemorySource;

    fn controller() -> (Arc<BroadcastHub>, Controller) {
        let hub = BroadcastHub::new(HubConfig::default());
        let source = Arc::new(InMemorySource::with_demo_platforms(4));
        let controller = Controller::new(source, hub.publisher());
        (hub, controller)
    }

    #[test]
    fn test_start_announces_status() {
        let (hub, controller) = controller();
        let status = controller.start().unwrap();
        assert!(status.running);
        assert_eq!(status.platform_count, 4);
        assert_eq!(hub.pending(), 1);
    }

    #[test]
    fn test_failed_control_publishes_nothing() {
        let (hub, controller) = controller();
        assert_eq!(controller.stop(), Err(SourceError::NotRunning));
        assert_eq!(hub.pending(), 0);
    }

    #[test]
    fn test_initial_state_is_full_snapshot() {
        let (_hub, controller) = controller();
        match controller.initial_state() {
            ServerMessage::PlatformUpdate { platforms, .. } => assert_eq!(platforms.len(), 4),
            other => panic!("unexpected {:?}", other),
        }
    }
}
