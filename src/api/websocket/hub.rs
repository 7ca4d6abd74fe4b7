//! Broadcast hub
//!
//! Owns the set of active subscriber sessions and fans every published message
//! out to them.
//!
//! # Design
//!
//! ```text
//! ticker ──► Publisher ──► [hub queue] ──► dispatcher ──► [session queue] ──► session writer
//!                                              │
//!                                              └─────────► [session queue] ──► ...
//! ```
//!
//! Messages are serialized once on publish. Every queue is bounded and offers never
//! block: a full queue displaces its oldest entry, so the newest snapshot always wins.
//! Sessions only ever see their own queue; they hold no reference back to the hub.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::HubConfig;
use crate::error::FeedError;
use crate::protocol::{OutboundFrame, ServerMessage};
use crate::source::SnapshotSource;
use crate::types::{SimulationStatus, SnapshotBatch};
use crate::utils::queue::{bounded, Offer, QueueReceiver, QueueSender};
use crate::utils::time::now_millis;

pub type SessionId = String;

/// Generate a short session id for logs and the welcome message
pub fn new_session_id() -> SessionId {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

/// Which transport a session is served over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Duplex,
    Stream,
}

/// The hub's view of one session: a send capability plus bookkeeping
pub struct SessionHandle {
    id: SessionId,
    kind: SessionKind,
    queue: QueueSender<OutboundFrame>,
    last_activity: Arc<AtomicI64>,
    connected_at: i64,
}

impl SessionHandle {
    pub fn new(id: SessionId, kind: SessionKind, queue: QueueSender<OutboundFrame>) -> Self {
        let now = now_millis();
        Self {
            id,
            kind,
            queue,
            last_activity: Arc::new(AtomicI64::new(now)),
            connected_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn connected_at(&self) -> i64 {
        self.connected_at
    }

    /// Shared activity clock, updated by the session on every inbound frame
    pub fn activity(&self) -> Arc<AtomicI64> {
        self.last_activity.clone()
    }

    pub fn last_activity(&self) -> i64 {
        self.last_activity.load(Ordering::Relaxed)
    }
}

/// Cloneable capability to enqueue messages for fan-out
#[derive(Clone)]
pub struct Publisher {
    tx: QueueSender<OutboundFrame>,
    published: Arc<AtomicU64>,
    displaced: Arc<AtomicU64>,
}

impl Publisher {
    /// Serialize once and offer to the hub queue
    pub fn publish(&self, message: &ServerMessage) -> Result<Offer, FeedError> {
        let frame = message.to_frame()?;
        let outcome = self.tx.offer(frame)?;
        self.published.fetch_add(1, Ordering::Relaxed);
        if outcome == Offer::Displaced {
            self.displaced.fetch_add(1, Ordering::Relaxed);
            trace!("Hub queue full, displaced oldest pending {}", message.kind());
        }
        Ok(outcome)
    }

    pub fn publish_batch(&self, batch: &SnapshotBatch) -> Result<Offer, FeedError> {
        self.publish(&ServerMessage::PlatformUpdate {
            platforms: batch.platforms.clone(),
            timestamp: batch.timestamp,
        })
    }

    pub fn publish_status(&self, status: SimulationStatus) -> Result<Offer, FeedError> {
        self.publish(&ServerMessage::SimulationStatus {
            data: status,
            timestamp: now_millis(),
        })
    }
}

/// Counters exposed on the info endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    pub sessions: usize,
    pub pending: usize,
    pub published: u64,
    pub displaced: u64,
}

/// Fan-out hub for all subscriber sessions
pub struct BroadcastHub {
    config: HubConfig,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    publisher: Publisher,
    outbound: Mutex<Option<QueueReceiver<OutboundFrame>>>,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Arc<Self> {
        let (tx, rx) = bounded(config.outbound_capacity);
        Arc::new(Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            publisher: Publisher {
                tx,
                published: Arc::new(AtomicU64::new(0)),
                displaced: Arc::new(AtomicU64::new(0)),
            },
            outbound: Mutex::new(Some(rx)),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn register(&self, handle: SessionHandle) {
        debug!("[{}] Registered {:?} session", handle.id, handle.kind);
        self.sessions.write().insert(handle.id.clone(), handle);
    }

    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            debug!("[{}] Unregistered session", id);
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Messages published but not yet dispatched
    pub fn pending(&self) -> usize {
        self.publisher.tx.len()
    }

    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    pub fn publish(&self, batch: &SnapshotBatch) -> Result<Offer, FeedError> {
        self.publisher.publish_batch(batch)
    }

    pub fn publish_status(&self, status: SimulationStatus) -> Result<Offer, FeedError> {
        self.publisher.publish_status(status)
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            sessions: self.session_count(),
            pending: self.pending(),
            published: self.publisher.published.load(Ordering::Relaxed),
            displaced: self.publisher.displaced.load(Ordering::Relaxed),
        }
    }

    /// Write one frame to every session.
    ///
    /// Iterates under the read lock; sessions whose queue is closed are collected and
    /// removed only after the pass. Returns the number of sessions reached.
    pub fn dispatch(&self, frame: &OutboundFrame) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;
        {
            let sessions = self.sessions.read();
            for (id, handle) in sessions.iter() {
                match handle.queue.offer(frame.clone()) {
                    Ok(Offer::Accepted) => delivered += 1,
                    Ok(Offer::Displaced) => {
                        delivered += 1;
                        trace!("[{}] Session queue full, displaced oldest frame", id);
                    }
                    Err(_) => dead.push(id.clone()),
                }
            }
        }

        if !dead.is_empty() {
            let mut sessions = self.sessions.write();
            for id in &dead {
                sessions.remove(id);
                debug!("[{}] Session closed, removed from hub", id);
            }
        }

        delivered
    }

    /// Start the single dispatcher task. Only the first call spawns anything.
    pub fn spawn_dispatcher(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut rx = self.outbound.lock().take()?;
        let hub = Arc::clone(self);
        Some(tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let reached = hub.dispatch(&frame);
                trace!("Dispatched {} to {} sessions", frame.kind, reached);
            }
            debug!("Hub dispatcher stopped");
        }))
    }

    /// Publish a full snapshot every tick while the source runs and someone listens
    pub fn spawn_ticker(self: &Arc<Self>, source: Arc<dyn SnapshotSource>) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        let period = self.config.tick_interval();
        info!("Snapshot ticker every {:?}", period);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !source.is_running() || hub.session_count() == 0 {
                    continue;
                }
                let batch = source.snapshot();
                if let Err(e) = hub.publish(&batch) {
                    warn!("Failed to publish snapshot: {}", e);
                }
            }
        })
    }
}

/// Unregisters a session from the hub when dropped
pub struct Registration {
    hub: Arc<BroadcastHub>,
    id: SessionId,
}

impl Registration {
    pub fn new(hub: Arc<BroadcastHub>, handle: SessionHandle) -> Self {
        let id = handle.id.clone();
        hub.register(handle);
        Self { hub, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.unregister(&self.id);
    }
}
