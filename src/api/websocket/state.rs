//! Shared application state for the HTTP, WebSocket and event-stream endpoints

use std::sync::Arc;

use super::hub::BroadcastHub;
use crate::api::control::Controller;
use crate::config::ServerConfig;
use crate::source::SnapshotSource;

pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub control: Arc<Controller>,
    pub config: ServerConfig,
}

impl AppState {
    /// Build the hub and control path around a snapshot source.
    ///
    /// Background tasks are not started here; see [`AppState::spawn_tasks`].
    pub fn new(source: Arc<dyn SnapshotSource>, config: ServerConfig) -> Self {
        let hub = BroadcastHub::new(config.hub.clone());
        let control = Arc::new(Controller::new(source, hub.publisher()));
        Self {
            hub,
            control,
            config,
        }
    }

    /// Start the dispatcher and the snapshot ticker
    pub fn spawn_tasks(&self) {
        self.hub.spawn_dispatcher();
        self.hub.spawn_ticker(self.control.source());
    }
}
