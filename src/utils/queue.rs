//! Bounded, drop-oldest queue between async tasks
//!
//! Offers never block: when the queue is full the oldest pending item is
//! displaced, so a slow consumer always sees the most recent `capacity` items.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::FeedError;

/// Outcome of a successful offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    /// Accepted after evicting the oldest pending item
    Displaced,
}

struct State<T> {
    items: VecDeque<T>,
    capacity: usize,
    senders: usize,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

/// Create a queue holding at most `capacity` items
pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            senders: 1,
            closed: false,
        }),
        notify: Notify::new(),
    });
    (
        QueueSender {
            shared: shared.clone(),
        },
        QueueReceiver { shared },
    )
}

/// Producer side; cheap to clone
pub struct QueueSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> QueueSender<T> {
    /// Enqueue without waiting.
    ///
    /// Fails only when the receiver is gone.
    pub fn offer(&self, item: T) -> Result<Offer, FeedError> {
        let outcome = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(FeedError::Capacity("queue closed".to_string()));
            }
            let outcome = if state.items.len() >= state.capacity {
                state.items.pop_front();
                Offer::Displaced
            } else {
                Offer::Accepted
            };
            state.items.push_back(item);
            outcome
        };
        self.shared.notify.notify_one();
        Ok(outcome)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Items waiting to be received
    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        self.shared.state.lock().senders += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for QueueSender<T> {
    fn drop(&mut self) {
        let last = {
            let mut state = self.shared.state.lock();
            state.senders -= 1;
            state.senders == 0
        };
        if last {
            self.shared.notify.notify_one();
        }
    }
}

/// Consumer side; dropping it closes the queue
pub struct QueueReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> QueueReceiver<T> {
    /// Wait for the next item. Returns `None` once closed and drained, or when
    /// every sender is gone and nothing is left.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = self.shared.state.lock();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed || state.senders == 0 {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.shared.state.lock().items.pop_front()
    }

    /// Reject further offers; already queued items can still be received
    pub fn close(&mut self) {
        self.shared.state.lock().closed = true;
        self.shared.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for QueueReceiver<T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        state.items.clear();
    }
}
