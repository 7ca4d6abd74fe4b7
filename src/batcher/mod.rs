//! Update batcher for throttling high-frequency platform updates
//!
//! Incoming records are reconstructed (delta-tagged records are merged into the
//! last known state), buffered, and delivered to every consumer at most once per
//! throttle window. The first enqueue into an empty window schedules the flush;
//! later enqueues join it.
//!
//! A full snapshot replaces the set of known platforms: whatever was pending is
//! superseded, ids missing from it are forgotten, and the flushed batch is marked
//! [`BatchKind::Full`] so consumers prune them too.

pub mod delta;

use std::collections::HashSet;
use std::mem;
use std::ops::Deref;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::client::listeners::{ListenerId, Listeners};
use crate::client::scheduler::{Scheduler, TimerHandle, TimerTask};
use crate::config::BatcherConfig;
use crate::types::PlatformSnapshot;

pub use delta::{is_delta, merge, DeltaTracker, DELTA_FLAG};

/// How a batch relates to what the receiver already knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchKind {
    /// Every platform that exists; anything absent is gone
    Full,
    /// Updates to some platforms; absent ones are untouched
    #[default]
    Partial,
}

impl BatchKind {
    /// A frame carrying any delta-tagged record is partial; otherwise it is the full set
    pub fn of(records: &[Value]) -> Self {
        if records.iter().any(is_delta) {
            BatchKind::Partial
        } else {
            BatchKind::Full
        }
    }
}

/// One flush worth of reconstructed snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformBatch {
    pub kind: BatchKind,
    pub platforms: Vec<PlatformSnapshot>,
}

impl PlatformBatch {
    pub fn is_full(&self) -> bool {
        self.kind == BatchKind::Full
    }
}

impl Deref for PlatformBatch {
    type Target = [PlatformSnapshot];

    fn deref(&self) -> &[PlatformSnapshot] {
        &self.platforms
    }
}

/// Collects reconstructed snapshots and delivers them in throttled batches
pub struct UpdateBatcher {
    /// Window between the first enqueue and the flush
    throttle: Duration,

    /// Snapshots waiting for the next flush, in arrival order
    pending: Vec<PlatformSnapshot>,

    /// Full once a snapshot landed in the current window
    window: BatchKind,

    /// Scheduled flush, if any
    flush_timer: Option<TimerHandle>,

    deltas: DeltaTracker,

    consumers: Listeners<PlatformBatch>,

    /// Number of flushes delivered
    flushes: u64,
}

impl UpdateBatcher {
    pub fn new(config: &BatcherConfig) -> Self {
        Self {
            throttle: config.throttle(),
            pending: Vec::new(),
            window: BatchKind::Partial,
            flush_timer: None,
            deltas: DeltaTracker::new(),
            consumers: Listeners::new(),
            flushes: 0,
        }
    }

    /// Register a consumer for flushed batches
    pub fn subscribe(&mut self, consumer: impl FnMut(&PlatformBatch) + 'static) -> ListenerId {
        self.consumers.subscribe(consumer)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.consumers.unsubscribe(id)
    }

    /// Reconstruct and buffer the records of one frame. Returns how many were accepted.
    ///
    /// Records that fail to decode after reconstruction are logged and skipped.
    pub fn enqueue(
        &mut self,
        records: Vec<Value>,
        kind: BatchKind,
        scheduler: &mut dyn Scheduler,
    ) -> usize {
        if kind == BatchKind::Full {
            let present: HashSet<String> = records
                .iter()
                .filter_map(|record| record.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            let dropped = self.deltas.retain(&present);
            if dropped > 0 {
                debug!("Full snapshot dropped {} platforms", dropped);
            }
            self.pending.clear();
            self.window = BatchKind::Full;
        }

        let before = self.pending.len();
        for record in records {
            match self.deltas.reconstruct(record) {
                Ok(snapshot) => self.pending.push(snapshot),
                Err(e) => warn!("Skipping platform record: {}", e),
            }
        }
        self.schedule(scheduler);
        self.pending.len() - before
    }

    /// Buffer already typed partial updates
    pub fn enqueue_snapshots(
        &mut self,
        snapshots: Vec<PlatformSnapshot>,
        scheduler: &mut dyn Scheduler,
    ) -> usize {
        let count = snapshots.len();
        for snapshot in &snapshots {
            if let Err(e) = self.deltas.record(snapshot) {
                warn!("Could not record state for {}: {}", snapshot.id, e);
            }
        }
        self.pending.extend(snapshots);
        self.schedule(scheduler);
        count
    }

    fn schedule(&mut self, scheduler: &mut dyn Scheduler) {
        let has_work = !self.pending.is_empty() || self.window == BatchKind::Full;
        if has_work && self.flush_timer.is_none() {
            self.flush_timer = Some(scheduler.after(self.throttle, TimerTask::Flush));
        }
    }

    /// Called when the scheduled flush comes due
    pub fn on_flush_timer(&mut self) {
        self.flush_timer = None;
        self.flush();
    }

    /// Deliver everything pending to every consumer and clear the buffer.
    ///
    /// An empty full snapshot is still delivered: it means nothing exists.
    pub fn flush(&mut self) {
        let kind = mem::take(&mut self.window);
        if self.pending.is_empty() && kind == BatchKind::Partial {
            return;
        }
        let batch = PlatformBatch {
            kind,
            platforms: mem::take(&mut self.pending),
        };
        self.flushes += 1;
        debug!(
            "Flushing {} platform updates ({:?}) to {} consumers",
            batch.len(),
            batch.kind,
            self.consumers.len()
        );
        self.consumers.emit(&batch);
    }

    /// Cancel the scheduled flush and deliver immediately
    pub fn flush_now(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(handle) = self.flush_timer.take() {
            scheduler.cancel(handle);
        }
        self.flush();
    }

    /// Drop a platform's last known state so its next delta is taken as-is
    pub fn forget(&mut self, id: &str) -> bool {
        self.deltas.forget(id)
    }

    /// Drop all last known state and pending updates
    pub fn clear(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(handle) = self.flush_timer.take() {
            scheduler.cancel(handle);
        }
        self.pending.clear();
        self.window = BatchKind::Partial;
        self.deltas.clear();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_timer.is_some()
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    pub fn known_platforms(&self) -> usize {
        self.deltas.len()
    }
}
