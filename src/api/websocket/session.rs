//! Duplex subscriber session
//!
//! Each connected WebSocket gets two loops:
//! - outbound: drains the session's private queue and sends a liveness ping on its
//!   own timer; every write carries a deadline
//! - inbound: reads control messages under a rolling read deadline that only a
//!   liveness pong refreshes

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, Stream, StreamExt};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::hub::SessionId;
use crate::api::control::Controller;
use crate::config::SessionConfig;
use crate::error::FeedError;
use crate::protocol::{ClientMessage, OutboundFrame, ServerMessage};
use crate::types::Category;
use crate::utils::queue::{QueueReceiver, QueueSender};
use crate::utils::time::now_millis;
use crate::visibility::Viewport;

/// Last viewport and filter a subscriber reported
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    pub viewport: Option<Viewport>,
    pub zoom: Option<f64>,
    pub categories: Vec<Category>,
}

/// What the inbound loop should do after one text frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Liveness pong; refreshes the read deadline
    Alive,
    Handled,
    Ignored,
}

pub struct SubscriberSession {
    id: SessionId,
    config: SessionConfig,
    control: Arc<Controller>,
    queue: QueueSender<OutboundFrame>,
    last_activity: Arc<AtomicI64>,
    view: SessionView,
}

impl SubscriberSession {
    pub fn new(
        id: SessionId,
        config: SessionConfig,
        control: Arc<Controller>,
        queue: QueueSender<OutboundFrame>,
        last_activity: Arc<AtomicI64>,
    ) -> Self {
        Self {
            id,
            config,
            control,
            queue,
            last_activity,
            view: SessionView::default(),
        }
    }

    pub fn view(&self) -> &SessionView {
        &self.view
    }

    /// Run both loops until either ends
    pub async fn run(mut self, socket: WebSocket, outbound: QueueReceiver<OutboundFrame>) {
        info!("[{}] Session opened", self.id);
        self.enqueue(&ServerMessage::Connected {
            session_id: self.id.clone(),
            timestamp: now_millis(),
        });

        let id = self.id.clone();
        let (sink, mut stream) = socket.split();
        let mut writer = tokio::spawn(outbound_loop(
            id.clone(),
            sink,
            outbound,
            self.config.clone(),
        ));

        tokio::select! {
            result = self.inbound_loop(&mut stream) => {
                if let Err(e) = result {
                    debug!("[{}] Inbound loop ended: {}", id, e);
                }
            }
            result = &mut writer => {
                if let Ok(Err(e)) = result {
                    debug!("[{}] Outbound loop ended: {}", id, e);
                }
            }
        }
        writer.abort();

        info!("[{}] Session closed", self.id);
    }

    /// Read control messages until the peer leaves or stays silent past the read
    /// deadline. Only pongs push the deadline back.
    async fn inbound_loop<S>(&mut self, stream: &mut S) -> Result<(), FeedError>
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let read_deadline = self.config.read_deadline();
        let mut deadline = Instant::now() + read_deadline;

        loop {
            let message = match timeout_at(deadline, stream.next()).await {
                Err(_) => return Err(FeedError::Timeout(read_deadline.as_millis() as u64)),
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) => return Err(FeedError::transport(e.to_string())),
                Ok(Some(Ok(message))) => message,
            };
            self.last_activity.store(now_millis(), Ordering::Relaxed);

            let outcome = match message {
                Message::Text(text) => self.handle_text(&text),
                Message::Pong(_) => Inbound::Alive,
                Message::Ping(_) => Inbound::Handled,
                Message::Binary(_) => {
                    debug!("[{}] Ignoring binary frame", self.id);
                    Inbound::Ignored
                }
                Message::Close(_) => {
                    debug!("[{}] Client closed connection", self.id);
                    return Ok(());
                }
            };

            if outcome == Inbound::Alive {
                deadline = Instant::now() + read_deadline;
            }
        }
    }

    /// Decode and dispatch one control message. Malformed or unknown messages are
    /// logged and dropped.
    pub fn handle_text(&mut self, text: &str) -> Inbound {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("[{}] Malformed client message: {}", self.id, e);
                return Inbound::Ignored;
            }
        };

        match message {
            ClientMessage::Pong { .. } => return Inbound::Alive,
            ClientMessage::Ping { timestamp } => {
                self.enqueue(&ServerMessage::Pong { timestamp });
            }
            ClientMessage::RequestInitialData { .. } => {
                let initial = self.control.initial_state();
                self.enqueue(&initial);
            }
            ClientMessage::StartSimulation { .. } => {
                if let Err(e) = self.control.start() {
                    warn!("[{}] Start rejected: {}", self.id, e);
                }
            }
            ClientMessage::StopSimulation { .. } => {
                if let Err(e) = self.control.stop() {
                    warn!("[{}] Stop rejected: {}", self.id, e);
                }
            }
            ClientMessage::ViewportUpdate { bounds, zoom, .. } => {
                debug!("[{}] Viewport {:?} zoom {:?}", self.id, bounds, zoom);
                self.view.viewport = Some(bounds);
                self.view.zoom = zoom;
            }
            ClientMessage::FilterUpdate { categories, .. } => {
                debug!("[{}] Filter {:?}", self.id, categories);
                self.view.categories = categories;
            }
            ClientMessage::Unknown => {
                warn!("[{}] Unrecognized message type: {}", self.id, text);
                return Inbound::Ignored;
            }
        }
        Inbound::Handled
    }

    fn enqueue(&self, message: &ServerMessage) {
        let result = message.to_frame().and_then(|frame| self.queue.offer(frame));
        if let Err(e) = result {
            debug!("[{}] Dropped {}: {}", self.id, message.kind(), e);
        }
    }
}

async fn outbound_loop(
    id: SessionId,
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: QueueReceiver<OutboundFrame>,
    config: SessionConfig,
) -> Result<(), FeedError> {
    let period = config.ping_interval();
    let write_timeout = config.write_timeout();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);

    loop {
        let text = tokio::select! {
            frame = queue.recv() => match frame {
                Some(frame) => frame.json.to_string(),
                None => break,
            },
            _ = ping.tick() => {
                ServerMessage::Ping { timestamp: now_millis() }.to_frame()?.json.to_string()
            }
        };

        match timeout(write_timeout, sink.send(Message::Text(text))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(FeedError::transport(e.to_string())),
            Err(_) => {
                warn!("[{}] Write deadline exceeded", id);
                return Err(FeedError::Timeout(write_timeout.as_millis() as u64));
            }
        }
    }

    let _ = sink.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::websocket::hub::BroadcastHub;
    use crate::config::HubConfig;
    use crate::source::{InMemorySource, SnapshotSource};
    use crate::utils::queue::bounded;
    use futures::channel::mpsc::unbounded;
    use std::time::Duration;

    fn session() -> (SubscriberSession, QueueReceiver<OutboundFrame>, Arc<BroadcastHub>) {
        let hub = BroadcastHub::new(HubConfig::default());
        let source = Arc::new(InMemorySource::with_demo_platforms(3));
        let control = Arc::new(Controller::new(source, hub.publisher()));
        let (tx, rx) = bounded(8);
        let session = SubscriberSession::new(
            "test".to_string(),
            SessionConfig::default(),
            control,
            tx,
            Arc::new(AtomicI64::new(0)),
        );
        (session, rx, hub)
    }

    #[test]
    fn test_pong_refreshes_liveness() {
        let (mut session, _rx, _hub) = session();
        assert_eq!(session.handle_text(r#"{"type":"pong","timestamp":1}"#), Inbound::Alive);
    }

    #[test]
    fn test_ping_is_answered_with_echoed_pong() {
        let (mut session, mut rx, _hub) = session();
        session.handle_text(r#"{"type":"ping","timestamp":777}"#);
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.kind, "pong");
        assert!(frame.as_str().contains("777"));
    }

    #[test]
    fn test_initial_data_request_queues_snapshot() {
        let (mut session, mut rx, _hub) = session();
        assert_eq!(
            session.handle_text(r#"{"type":"request_initial_data"}"#),
            Inbound::Handled
        );
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.kind, "platform_update");
    }

    #[test]
    fn test_start_goes_through_control_path() {
        let (mut session, _rx, hub) = session();
        session.handle_text(r#"{"type":"start_simulation","timestamp":1}"#);
        assert!(session.control.source().is_running());
        assert_eq!(hub.pending(), 1);
    }

    #[test]
    fn test_viewport_and_filter_are_retained() {
        let (mut session, _rx, _hub) = session();
        session.handle_text(
            r#"{"type":"viewport_update","bounds":{"north":50,"south":40,"east":10,"west":0},"zoom":7}"#,
        );
        session.handle_text(r#"{"type":"filter_update","categories":["space"]}"#);

        let view = session.view();
        assert_eq!(view.zoom, Some(7.0));
        assert_eq!(view.viewport.unwrap().north, 50.0);
        assert_eq!(view.categories, vec![Category::Space]);
    }

    #[test]
    fn test_unknown_and_malformed_are_not_fatal() {
        let (mut session, mut rx, _hub) = session();
        assert_eq!(session.handle_text(r#"{"type":"warp"}"#), Inbound::Ignored);
        assert_eq!(session.handle_text("{{{"), Inbound::Ignored);
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_hits_read_deadline() {
        let (mut session, _rx, _hub) = session();
        let (_tx, mut stream) = unbounded::<Result<Message, axum::Error>>();

        let started = Instant::now();
        let result = session.inbound_loop(&mut stream).await;

        assert!(matches!(result, Err(FeedError::Timeout(60_000))));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60));
        assert!(elapsed < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_pongs_extend_read_deadline() {
        let (mut session, _rx, _hub) = session();
        let (tx, mut stream) = unbounded::<Result<Message, axum::Error>>();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(50)).await;
            let _ = tx.unbounded_send(Ok(Message::Pong(Vec::new())));
            tokio::time::sleep(Duration::from_secs(50)).await;
            let filter = r#"{"type":"filter_update","categories":["land"]}"#;
            let _ = tx.unbounded_send(Ok(Message::Text(filter.to_string())));
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(tx);
        });

        let started = Instant::now();
        let result = session.inbound_loop(&mut stream).await;

        assert!(matches!(result, Err(FeedError::Timeout(60_000))));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(110));
        assert!(elapsed < Duration::from_secs(111));
        assert_eq!(session.view().categories, vec![Category::Land]);
    }

    #[tokio::test]
    async fn test_peer_close_ends_loop_cleanly() {
        let (mut session, _rx, _hub) = session();
        let (tx, mut stream) = unbounded::<Result<Message, axum::Error>>();
        tx.unbounded_send(Ok(Message::Close(None))).unwrap();

        assert!(session.inbound_loop(&mut stream).await.is_ok());
    }
}
