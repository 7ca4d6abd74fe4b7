//! Subscriber connection state machine
//!
//! `TransportClient` owns one logical connection to the feed server. It is driven
//! from outside: transport events go in through [`TransportClient::handle`], time
//! goes in through [`TransportClient::advance`]. Everything else (reconnect
//! delays, connect timeouts, heartbeats, batcher flushes) is a timer on its own
//! [`TimerQueue`].
//!
//! ## Lifecycle
//! ```text
//! Disconnected -> Connecting -> Connected
//!                    ^  |          |
//!                    |  v          v
//!                    +- Error <----+
//!                          |
//!                          v
//!                        Failed   (until reset)
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::batcher::{BatchKind, PlatformBatch, UpdateBatcher};
use crate::config::{ClientConfig, TransportMode};
use crate::error::FeedError;
use crate::protocol::{ClientMessage, InboundMessage};
use crate::types::{Category, SimulationStatus};
use crate::utils::time::{millis_since, now_millis};
use crate::visibility::Viewport;

use super::listeners::{ListenerId, Listeners};
use super::scheduler::{Scheduler, TimerHandle, TimerQueue, TimerTask};
use super::state::{ConnectionId, ConnectionState, LatencyEstimator, ReconnectPolicy};
use super::transport::{Transport, TransportEvent};

/// Notifications for client observers
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// Switched transport after the preferred one proved unavailable
    ModeChanged(TransportMode),
    Status(SimulationStatus),
    /// Smoothed round-trip time in milliseconds
    Latency(f64),
    Error(FeedError),
}

pub struct TransportClient<T: Transport> {
    config: ClientConfig,
    policy: ReconnectPolicy,
    transport: T,
    timers: TimerQueue,
    batcher: UpdateBatcher,
    listeners: Listeners<ClientEvent>,

    state: ConnectionState,
    mode: TransportMode,
    fallback_used: bool,

    /// Attempt in flight or open; `None` between attempts
    connection: Option<ConnectionId>,
    next_connection: u64,
    /// Whether the current attempt reached `Opened`
    opened: bool,
    /// Consecutive failures since the last successful open
    failures: u32,

    connect_timer: Option<TimerHandle>,
    reconnect_timer: Option<TimerHandle>,
    heartbeat_timer: Option<TimerHandle>,
    liveness_timer: Option<TimerHandle>,
    /// Client clock at the last inbound traffic on the open connection
    last_inbound: Duration,

    latency: LatencyEstimator,
    last_status: Option<SimulationStatus>,
}

impl<T: Transport> TransportClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self {
            policy: ReconnectPolicy::from_config(&config),
            batcher: UpdateBatcher::new(&config.batcher),
            mode: config.preferred_mode,
            config,
            transport,
            timers: TimerQueue::new(),
            listeners: Listeners::new(),
            state: ConnectionState::Disconnected,
            fallback_used: false,
            connection: None,
            next_connection: 0,
            opened: false,
            failures: 0,
            connect_timer: None,
            reconnect_timer: None,
            heartbeat_timer: None,
            liveness_timer: None,
            last_inbound: Duration::ZERO,
            latency: LatencyEstimator::default(),
            last_status: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency.average_ms()
    }

    pub fn last_status(&self) -> Option<&SimulationStatus> {
        self.last_status.as_ref()
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn batcher(&self) -> &UpdateBatcher {
        &self.batcher
    }

    /// Earliest pending timer on the client clock
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    pub fn on_event(&mut self, listener: impl FnMut(&ClientEvent) + 'static) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn off_event(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Register a consumer of flushed platform batches
    pub fn on_platforms(
        &mut self,
        consumer: impl FnMut(&PlatformBatch) + 'static,
    ) -> ListenerId {
        self.batcher.subscribe(consumer)
    }

    pub fn off_platforms(&mut self, id: ListenerId) -> bool {
        self.batcher.unsubscribe(id)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start connecting. A no-op while connecting or connected, refused once failed.
    pub fn connect(&mut self) {
        match self.state {
            ConnectionState::Failed => {
                warn!("Connect refused: reconnect attempts exhausted, reset first");
            }
            ConnectionState::Connecting | ConnectionState::Connected => {}
            ConnectionState::Disconnected | ConnectionState::Error => {
                self.set_state(ConnectionState::Connecting);
                self.open_connection();
            }
        }
    }

    /// Close the connection and cancel every pending timer. Idempotent.
    pub fn disconnect(&mut self) {
        self.teardown();
        if self.state != ConnectionState::Failed {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Leave any state, including `Failed`, for a fresh `Disconnected`
    pub fn reset(&mut self) {
        self.teardown();
        self.failures = 0;
        self.fallback_used = false;
        self.latency.reset();
        if self.mode != self.config.preferred_mode {
            self.mode = self.config.preferred_mode;
            self.emit(ClientEvent::ModeChanged(self.mode));
        }
        self.batcher.clear(&mut self.timers);
        self.set_state(ConnectionState::Disconnected);
    }

    pub fn send_viewport(&mut self, bounds: Viewport, zoom: Option<f64>) -> Result<(), FeedError> {
        self.send(&ClientMessage::ViewportUpdate {
            bounds,
            zoom,
            timestamp: now_millis(),
        })
    }

    pub fn send_filter(&mut self, categories: Vec<Category>) -> Result<(), FeedError> {
        self.send(&ClientMessage::FilterUpdate {
            categories,
            timestamp: now_millis(),
        })
    }

    pub fn start_simulation(&mut self) -> Result<(), FeedError> {
        self.send(&ClientMessage::StartSimulation {
            timestamp: now_millis(),
        })
    }

    pub fn stop_simulation(&mut self) -> Result<(), FeedError> {
        self.send(&ClientMessage::StopSimulation {
            timestamp: now_millis(),
        })
    }

    /// Send a message on the open duplex connection
    pub fn send(&mut self, message: &ClientMessage) -> Result<(), FeedError> {
        let id = match self.connection {
            Some(id) if self.opened => id,
            _ => return Err(FeedError::transport("not connected")),
        };
        if self.mode != TransportMode::Duplex {
            return Err(FeedError::transport("stream transport is receive-only"));
        }
        let text = serde_json::to_string(message)?;
        self.transport.send(id, text)
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Feed one transport event. Events from superseded attempts are ignored.
    pub fn handle(&mut self, id: ConnectionId, event: TransportEvent) {
        if self.connection != Some(id) {
            debug!("Ignoring {:?} from stale connection {}", event, id);
            return;
        }
        if self.opened {
            self.last_inbound = self.timers.now();
        }
        match event {
            TransportEvent::Opened => self.on_open(id),
            TransportEvent::Frame(text) | TransportEvent::InitialState(text) => {
                self.on_frame(&text)
            }
            TransportEvent::KeepAlive => {}
            TransportEvent::Closed => self.on_failure(FeedError::transport("connection closed")),
            TransportEvent::Failed(reason) => self.on_failure(FeedError::Transport(reason)),
        }
    }

    /// Move the client clock to `now` and run every timer that came due
    pub fn advance(&mut self, now: Duration) {
        self.timers.set_now(now);
        while let Some((handle, task)) = self.timers.pop_due() {
            self.fire(handle, task);
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn open_connection(&mut self) {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connection = Some(id);
        self.opened = false;

        info!("Opening {:?} connection {}", self.mode, id);
        self.transport.open(id, self.mode);
        self.connect_timer = Some(
            self.timers
                .after(self.config.connect_timeout(), TimerTask::ConnectTimeout(id)),
        );
    }

    fn on_open(&mut self, id: ConnectionId) {
        if self.opened {
            return;
        }
        self.cancel(TimerSlot::Connect);
        self.opened = true;
        self.failures = 0;
        info!("Connection {} open ({:?})", id, self.mode);
        self.set_state(ConnectionState::Connected);
        self.heartbeat_timer = Some(
            self.timers
                .after(self.config.heartbeat(), TimerTask::Heartbeat(id)),
        );
        self.last_inbound = self.timers.now();
        self.liveness_timer = Some(
            self.timers
                .after(self.config.liveness_timeout(), TimerTask::Liveness(id)),
        );
        self.request_initial_data(id);
    }

    fn request_initial_data(&mut self, id: ConnectionId) {
        match self.mode {
            TransportMode::Duplex => {
                let request = ClientMessage::RequestInitialData {
                    timestamp: now_millis(),
                };
                if let Err(e) = self.send(&request) {
                    warn!("Initial data request failed: {}", e);
                }
            }
            TransportMode::Stream => self.transport.fetch_initial_state(id),
        }
    }

    fn on_frame(&mut self, text: &str) {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding malformed frame: {}", e);
                return;
            }
        };
        match message {
            InboundMessage::PlatformUpdate { records, .. } => {
                let kind = BatchKind::of(&records);
                self.batcher.enqueue(records, kind, &mut self.timers);
            }
            InboundMessage::Status { status, .. } => {
                self.last_status = Some(status.clone());
                self.emit(ClientEvent::Status(status));
            }
            InboundMessage::Pong { timestamp } => {
                let average = self.latency.record(millis_since(timestamp));
                self.emit(ClientEvent::Latency(average));
            }
            InboundMessage::Ping { timestamp } => {
                if self.mode == TransportMode::Duplex {
                    if let Err(e) = self.send(&ClientMessage::Pong { timestamp }) {
                        warn!("Could not answer ping: {}", e);
                    }
                }
            }
            InboundMessage::Unknown { kind } => debug!("Ignoring message type {}", kind),
        }
    }

    fn on_failure(&mut self, error: FeedError) {
        let Some(id) = self.connection.take() else {
            return;
        };
        let was_open = self.opened;
        self.opened = false;
        self.cancel(TimerSlot::Connect);
        self.cancel(TimerSlot::Heartbeat);
        self.cancel(TimerSlot::Liveness);
        self.transport.close(id);

        warn!("Connection {} failed: {}", id, error);
        self.emit(ClientEvent::Error(error));
        self.set_state(ConnectionState::Error);

        if !was_open
            && self.mode == TransportMode::Duplex
            && self.config.fallback_enabled
            && !self.fallback_used
        {
            self.fallback_used = true;
            self.mode = TransportMode::Stream;
            info!("Duplex transport unavailable, falling back to event stream");
            self.emit(ClientEvent::ModeChanged(self.mode));
            self.set_state(ConnectionState::Connecting);
            self.open_connection();
            return;
        }

        self.failures += 1;
        if self.policy.exhausted(self.failures) {
            warn!("Giving up after {} consecutive failures", self.failures);
            self.set_state(ConnectionState::Failed);
            return;
        }

        let delay = self.policy.delay_for(self.failures);
        info!(
            "Reconnecting in {:?} (attempt {}/{})",
            delay, self.failures, self.policy.max_attempts
        );
        self.set_state(ConnectionState::Connecting);
        self.reconnect_timer = Some(self.timers.after(delay, TimerTask::Reconnect));
    }

    fn fire(&mut self, handle: TimerHandle, task: TimerTask) {
        match task {
            TimerTask::ConnectTimeout(id) if self.connection == Some(id) && !self.opened => {
                self.connect_timer = None;
                self.on_failure(FeedError::Timeout(self.config.connect_timeout_ms));
            }
            TimerTask::Reconnect
                if self.reconnect_timer == Some(handle)
                    && self.state == ConnectionState::Connecting
                    && self.connection.is_none() =>
            {
                self.reconnect_timer = None;
                self.open_connection();
            }
            TimerTask::Heartbeat(id) if self.connection == Some(id) && self.opened => {
                self.heartbeat_timer = None;
                self.heartbeat(id);
            }
            TimerTask::Liveness(id) if self.connection == Some(id) && self.opened => {
                self.liveness_timer = None;
                self.check_liveness(id);
            }
            TimerTask::Flush => self.batcher.on_flush_timer(),
            other => debug!("Dropping stale timer {:?}", other),
        }
    }

    fn heartbeat(&mut self, id: ConnectionId) {
        if self.mode == TransportMode::Duplex {
            let ping = ClientMessage::Ping {
                timestamp: now_millis(),
            };
            if let Err(e) = self.send(&ping) {
                self.on_failure(e);
                return;
            }
        }
        self.heartbeat_timer = Some(
            self.timers
                .after(self.config.heartbeat(), TimerTask::Heartbeat(id)),
        );
    }

    /// Fail the connection once it has been silent for the whole liveness window
    fn check_liveness(&mut self, id: ConnectionId) {
        let window = self.config.liveness_timeout();
        let silence = self.timers.now().saturating_sub(self.last_inbound);
        if silence >= window {
            self.on_failure(FeedError::Timeout(self.config.liveness_timeout_ms));
            return;
        }
        self.liveness_timer = Some(
            self.timers
                .after(window - silence, TimerTask::Liveness(id)),
        );
    }

    /// Close the current attempt and cancel every timer
    fn teardown(&mut self) {
        self.cancel(TimerSlot::Connect);
        self.cancel(TimerSlot::Reconnect);
        self.cancel(TimerSlot::Heartbeat);
        self.cancel(TimerSlot::Liveness);
        self.batcher.flush_now(&mut self.timers);
        if let Some(id) = self.connection.take() {
            info!("Closing connection {}", id);
            self.transport.close(id);
        }
        self.opened = false;
    }

    fn cancel(&mut self, slot: TimerSlot) {
        let handle = match slot {
            TimerSlot::Connect => self.connect_timer.take(),
            TimerSlot::Reconnect => self.reconnect_timer.take(),
            TimerSlot::Heartbeat => self.heartbeat_timer.take(),
            TimerSlot::Liveness => self.liveness_timer.take(),
        };
        if let Some(handle) = handle {
            self.timers.cancel(handle);
        }
    }

    fn set_state(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!("Connection state {} -> {}", from, to);
        self.emit(ClientEvent::StateChanged { from, to });
    }

    fn emit(&mut self, event: ClientEvent) {
        self.listeners.emit(&event);
    }
}

#[derive(Debug, Clone, Copy)]
enum TimerSlot {
    Connect,
    Reconnect,
    Heartbeat,
    Liveness,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every call the client makes
    #[derive(Default)]
    struct FakeTransport {
        opened: Vec<(ConnectionId, TransportMode)>,
        sent: Vec<String>,
        closed: Vec<ConnectionId>,
        fetched: Vec<ConnectionId>,
    }

    impl Transport for FakeTransport {
        fn open(&mut self, id: ConnectionId, mode: TransportMode) {
            self.opened.push((id, mode));
        }

        fn send(&mut self, _id: ConnectionId, text: String) -> Result<(), FeedError> {
            self.sent.push(text);
            Ok(())
        }

        fn close(&mut self, id: ConnectionId) {
            self.closed.push(id);
        }

        fn fetch_initial_state(&mut self, id: ConnectionId) {
            self.fetched.push(id);
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            reconnect_base_ms: 1000,
            reconnect_cap_ms: 5000,
            max_reconnect_attempts: 3,
            connect_timeout_ms: 2000,
            heartbeat_ms: 30_000,
            fallback_enabled: false,
            ..ClientConfig::default()
        }
    }

    fn client(config: ClientConfig) -> (TransportClient<FakeTransport>, Rc<RefCell<Vec<ClientEvent>>>) {
        let mut client = TransportClient::new(config, FakeTransport::default());
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        client.on_event(move |event| sink.borrow_mut().push(event.clone()));
        (client, events)
    }

    fn current(client: &TransportClient<FakeTransport>) -> ConnectionId {
        client.connection().unwrap()
    }

    fn states(events: &RefCell<Vec<ClientEvent>>) -> Vec<ConnectionState> {
        events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ClientEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_open_requests_initial_data() {
        let (mut client, _) = client(config());
        client.connect();
        assert_eq!(client.state(), ConnectionState::Connecting);

        let id = current(&client);
        client.handle(id, TransportEvent::Opened);

        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(client.transport().sent.len(), 1);
        assert!(client.transport().sent[0].contains("request_initial_data"));
    }

    #[test]
    fn test_failure_schedules_linear_backoff() {
        let (mut client, events) = client(config());
        client.connect();
        client.handle(current(&client), TransportEvent::Failed("refused".into()));

        assert_eq!(client.state(), ConnectionState::Connecting);
        assert_eq!(client.next_deadline(), Some(Duration::from_millis(1000)));
        assert_eq!(
            states(&events),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Error,
                ConnectionState::Connecting
            ]
        );

        client.advance(Duration::from_millis(1000));
        assert_eq!(client.transport().opened.len(), 2);

        client.handle(current(&client), TransportEvent::Failed("refused".into()));
        assert_eq!(client.next_deadline(), Some(Duration::from_millis(3000)));
    }

    #[test]
    fn test_connect_timeout_counts_as_failure() {
        let (mut client, events) = client(config());
        client.connect();
        let first = current(&client);

        client.advance(Duration::from_millis(2000));
        assert_eq!(client.transport().closed, vec![first]);
        assert!(events
            .borrow()
            .iter()
            .any(|e| *e == ClientEvent::Error(FeedError::Timeout(2000))));
        assert_eq!(client.failures(), 1);
    }

    #[test]
    fn test_exhausted_attempts_fail_until_reset() {
        let (mut client, _) = client(config());
        client.connect();
        for attempt in 1..=3u64 {
            client.handle(current(&client), TransportEvent::Failed("down".into()));
            client.advance(Duration::from_secs(attempt * 10));
        }

        assert_eq!(client.state(), ConnectionState::Failed);
        assert_eq!(client.transport().opened.len(), 3);
        assert_eq!(client.pending_timers(), 0);

        client.connect();
        assert_eq!(client.transport().opened.len(), 3);

        client.reset();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        client.connect();
        assert_eq!(client.transport().opened.len(), 4);
    }

    #[test]
    fn test_successful_open_resets_attempts() {
        let (mut client, _) = client(config());
        client.connect();
        client.handle(current(&client), TransportEvent::Failed("down".into()));
        client.advance(Duration::from_secs(1));
        client.handle(current(&client), TransportEvent::Opened);
        assert_eq!(client.failures(), 0);

        client.handle(current(&client), TransportEvent::Closed);
        assert_eq!(client.failures(), 1);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_disconnect_cancels_pending_reconnect() {
        let (mut client, _) = client(config());
        client.connect();
        client.handle(current(&client), TransportEvent::Failed("down".into()));
        assert_eq!(client.pending_timers(), 1);

        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.pending_timers(), 0);

        client.advance(Duration::from_secs(60));
        assert_eq!(client.transport().opened.len(), 1);
    }

    #[test]
    fn test_stale_events_ignored() {
        let (mut client, _) = client(config());
        client.connect();
        let first = current(&client);
        client.handle(first, TransportEvent::Failed("down".into()));
        client.advance(Duration::from_secs(1));

        client.handle(first, TransportEvent::Opened);
        assert_eq!(client.state(), ConnectionState::Connecting);

        client.handle(current(&client), TransportEvent::Opened);
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_falls_back_to_stream_once() {
        let (mut client, events) = client(ClientConfig {
            fallback_enabled: true,
            ..config()
        });
        client.connect();
        client.handle(current(&client), TransportEvent::Failed("upgrade refused".into()));

        assert_eq!(client.mode(), TransportMode::Stream);
        assert_eq!(client.failures(), 0);
        assert_eq!(client.transport().opened[1].1, TransportMode::Stream);
        assert!(events
            .borrow()
            .contains(&ClientEvent::ModeChanged(TransportMode::Stream)));

        let id = current(&client);
        client.handle(id, TransportEvent::Opened);
        assert_eq!(client.transport().fetched, vec![id]);

        client.handle(id, TransportEvent::Closed);
        assert_eq!(client.mode(), TransportMode::Stream);
        assert_eq!(client.failures(), 1);

        client.reset();
        assert_eq!(client.mode(), TransportMode::Duplex);
    }

    #[test]
    fn test_no_fallback_after_duplex_opened() {
        let (mut client, _) = client(ClientConfig {
            fallback_enabled: true,
            ..config()
        });
        client.connect();
        client.handle(current(&client), TransportEvent::Opened);
        client.handle(current(&client), TransportEvent::Closed);
        assert_eq!(client.mode(), TransportMode::Duplex);
    }

    #[test]
    fn test_pong_updates_latency() {
        let (mut client, events) = client(config());
        client.connect();
        let id = current(&client);
        client.handle(id, TransportEvent::Opened);

        let sent_at = now_millis() - 40;
        client.handle(
            id,
            TransportEvent::Frame(format!(r#"{{"type":"pong","timestamp":{}}}"#, sent_at)),
        );
        assert!(client.latency_ms() >= 40.0);
        assert!(events
            .borrow()
            .iter()
            .any(|e| matches!(e, ClientEvent::Latency(_))));
    }

    #[test]
    fn test_server_ping_is_answered() {
        let (mut client, _) = client(config());
        client.connect();
        let id = current(&client);
        client.handle(id, TransportEvent::Opened);
        client.handle(id, TransportEvent::Frame(r#"{"type":"ping","timestamp":77}"#.into()));

        let reply: serde_json::Value =
            serde_json::from_str(client.transport().sent.last().unwrap()).unwrap();
        assert_eq!(reply["type"], "pong");
        assert_eq!(reply["timestamp"], 77);
    }

    #[test]
    fn test_heartbeat_sends_ping() {
        let (mut client, _) = client(config());
        client.connect();
        client.handle(current(&client), TransportEvent::Opened);

        client.advance(Duration::from_secs(30));
        assert!(client.transport().sent.last().unwrap().contains(r#""type":"ping""#));
        assert_eq!(client.next_deadline(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_platform_frames_flow_through_batcher() {
        let (mut client, _) = client(config());
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        client.on_platforms(move |batch| {
            sink.borrow_mut().extend(batch.iter().map(|p| p.id.clone()))
        });

        client.connect();
        let id = current(&client);
        client.handle(id, TransportEvent::Opened);
        client.handle(
            id,
            TransportEvent::Frame(
                r#"{"type":"platform_update","timestamp":1,"platforms":[{"id":"A","category":"land","position":{"lat":1,"lon":2}}]}"#
                    .into(),
            ),
        );
        assert!(received.borrow().is_empty());

        client.advance(Duration::from_millis(16));
        assert_eq!(*received.borrow(), vec!["A".to_string()]);
    }

    #[test]
    fn test_status_and_malformed_frames() {
        let (mut client, events) = client(config());
        client.connect();
        let id = current(&client);
        client.handle(id, TransportEvent::Opened);

        client.handle(id, TransportEvent::Frame("not json".into()));
        assert_eq!(client.state(), ConnectionState::Connected);

        client.handle(
            id,
            TransportEvent::Frame(
                r#"{"type":"simulation_status","timestamp":1,"data":{"running":true,"time":2.0,"platformCount":3,"speed":1.0}}"#
                    .into(),
            ),
        );
        assert!(client.last_status().unwrap().running);
        assert!(events
            .borrow()
            .iter()
            .any(|e| matches!(e, ClientEvent::Status(s) if s.platform_count == 3)));
    }

    #[test]
    fn test_send_requires_open_duplex() {
        let (mut client, _) = client(config());
        assert!(client.start_simulation().is_err());

        client.connect();
        client.handle(current(&client), TransportEvent::Opened);
        client.send_viewport(Viewport::new(-10.0, -10.0, 10.0, 10.0), Some(5.0)).unwrap();
        client.send_filter(vec![Category::Space]).unwrap();
        assert!(client.transport().sent.last().unwrap().contains("filter_update"));
    }

    fn update_frame(records: &str) -> TransportEvent {
        TransportEvent::Frame(format!(
            r#"{{"type":"platform_update","timestamp":1,"platforms":[{}]}}"#,
            records
        ))
    }

    #[test]
    fn test_full_frames_prune_and_deltas_do_not() {
        let (mut client, _) = client(config());
        let batches = Rc::new(RefCell::new(Vec::new()));
        let sink = batches.clone();
        client.on_platforms(move |batch| {
            let ids: Vec<String> = batch.iter().map(|p| p.id.clone()).collect();
            sink.borrow_mut().push((batch.kind, ids));
        });
        client.connect();
        let id = current(&client);
        client.handle(id, TransportEvent::Opened);

        let a = r#"{"id":"A","category":"land","position":{"lat":1,"lon":2}}"#;
        let b = r#"{"id":"B","category":"land","position":{"lat":3,"lon":4}}"#;
        client.handle(id, update_frame(&format!("{},{}", a, b)));
        client.advance(Duration::from_millis(16));
        assert_eq!(client.batcher().known_platforms(), 2);

        client.handle(id, update_frame(b));
        client.advance(Duration::from_millis(32));
        assert_eq!(client.batcher().known_platforms(), 1);

        client.handle(id, update_frame(r#"{"id":"B","delta":true,"speed":3}"#));
        client.advance(Duration::from_millis(48));
        assert_eq!(client.batcher().known_platforms(), 1);

        assert_eq!(
            *batches.borrow(),
            vec![
                (BatchKind::Full, vec!["A".to_string(), "B".to_string()]),
                (BatchKind::Full, vec!["B".to_string()]),
                (BatchKind::Partial, vec!["B".to_string()]),
            ]
        );
    }

    fn timeouts(events: &RefCell<Vec<ClientEvent>>) -> usize {
        events
            .borrow()
            .iter()
            .filter(|e| matches!(e, ClientEvent::Error(FeedError::Timeout(60_000))))
            .count()
    }

    #[test]
    fn test_silent_connection_is_failed() {
        let (mut client, events) = client(config());
        client.connect();
        let id = current(&client);
        client.handle(id, TransportEvent::Opened);

        client.advance(Duration::from_secs(59));
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(timeouts(&events), 0);

        client.advance(Duration::from_secs(60));
        assert_eq!(timeouts(&events), 1);
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert_eq!(client.transport().closed, vec![id]);
        assert_eq!(client.failures(), 1);
    }

    #[test]
    fn test_inbound_traffic_extends_liveness() {
        let (mut client, events) = client(config());
        client.connect();
        let id = current(&client);
        client.handle(id, TransportEvent::Opened);

        client.advance(Duration::from_secs(50));
        client.handle(id, TransportEvent::KeepAlive);
        client.advance(Duration::from_secs(100));
        assert_eq!(client.state(), ConnectionState::Connected);

        client.handle(id, TransportEvent::Frame(r#"{"type":"pong","timestamp":1}"#.into()));
        client.advance(Duration::from_secs(159));
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(timeouts(&events), 0);

        client.advance(Duration::from_secs(160));
        assert_eq!(timeouts(&events), 1);
    }

    #[test]
    fn test_long_silence_never_reports_connected() {
        let (mut client, events) = client(config());
        client.connect();
        client.handle(current(&client), TransportEvent::Opened);

        client.advance(Duration::from_secs(600));
        assert_ne!(client.state(), ConnectionState::Connected);
        assert_eq!(timeouts(&events), 1);
    }
}
