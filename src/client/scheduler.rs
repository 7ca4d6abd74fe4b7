//! Timer scheduling for the single-threaded client
//!
//! Nothing on the client blocks: connect timeouts, reconnect delays, heartbeats,
//! liveness checks and flush throttling are all entries in a [`TimerQueue`]. The queue runs on a virtual
//! clock that the owner advances, which keeps the state machine deterministic in tests
//! and lets the tokio driver map deadlines onto real sleeps.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use super::state::ConnectionId;

/// Identifies one scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Work a timer triggers when it comes due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    ConnectTimeout(ConnectionId),
    Reconnect,
    Heartbeat(ConnectionId),
    /// Check that the open connection has delivered something recently
    Liveness(ConnectionId),
    Flush,
}

pub trait Scheduler {
    /// Run `task` once `delay` has elapsed
    fn after(&mut self, delay: Duration, task: TimerTask) -> TimerHandle;

    /// Cancel a pending task. Unknown or already fired handles are a no-op.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

/// Ordered timer queue on a virtual clock
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    next_id: u64,
    due: BTreeMap<(Duration, u64), TimerTask>,
    deadlines: HashMap<u64, Duration>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position of the virtual clock
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Move the clock forward. Moving backwards is ignored.
    pub fn set_now(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Pop the earliest task whose deadline has passed
    pub fn pop_due(&mut self) -> Option<(TimerHandle, TimerTask)> {
        let (&(deadline, id), _) = self.due.iter().next()?;
        if deadline > self.now {
            return None;
        }
        let task = self.due.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some((TimerHandle(id), task))
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.due.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle.0)
    }

    pub fn len(&self) -> usize {
        self.due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }
}

impl Scheduler for TimerQueue {
    fn after(&mut self, delay: Duration, task: TimerTask) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        let deadline = self.now + delay;
        self.due.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        TimerHandle(id)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle.0) {
            Some(deadline) => self.due.remove(&(deadline, handle.0)).is_some(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_fire_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.after(Duration::from_millis(30), TimerTask::Reconnect);
        timers.after(Duration::from_millis(10), TimerTask::Flush);

        timers.set_now(Duration::from_millis(50));
        assert_eq!(timers.pop_due().map(|(_, t)| t), Some(TimerTask::Flush));
        assert_eq!(timers.pop_due().map(|(_, t)| t), Some(TimerTask::Reconnect));
        assert_eq!(timers.pop_due(), None);
    }

    #[test]
    fn test_nothing_fires_early() {
        let mut timers = TimerQueue::new();
        timers.after(Duration::from_millis(16), TimerTask::Flush);
        timers.set_now(Duration::from_millis(15));
        assert!(timers.pop_due().is_none());
        assert_eq!(timers.next_deadline(), Some(Duration::from_millis(16)));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut timers = TimerQueue::new();
        let handle = timers.after(Duration::from_secs(5), TimerTask::Reconnect);
        assert!(timers.is_pending(handle));
        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        timers.set_now(Duration::from_secs(10));
        assert!(timers.pop_due().is_none());
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let mut timers = TimerQueue::new();
        let handle = timers.after(Duration::ZERO, TimerTask::Flush);
        assert!(timers.pop_due().is_some());
        assert!(!timers.cancel(handle));
    }

    #[test]
    fn test_delays_are_relative_to_current_clock() {
        let mut timers = TimerQueue::new();
        timers.set_now(Duration::from_secs(100));
        timers.after(Duration::from_secs(1), TimerTask::Reconnect);
        assert_eq!(timers.next_deadline(), Some(Duration::from_secs(101)));

        timers.set_now(Duration::from_secs(50));
        assert_eq!(timers.now(), Duration::from_secs(100));
    }
}
