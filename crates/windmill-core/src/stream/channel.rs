//! Bounded per-subscriber delivery queue.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::event::Event;

/// Identifier of one subscriber channel, unique per registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Result of offering an event to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The event was queued.
    Accepted,
    /// The queue was full; the event was dropped.
    Full,
    /// The consumer is gone; the event was dropped.
    Closed,
}

/// Result of waiting on a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Popped {
    /// The next event in FIFO order.
    Event(Arc<Event>),
    /// Nothing arrived within the timeout.
    Timeout,
    /// Every producer handle was released.
    Closed,
}

/// Create a channel holding at most `capacity` undelivered events.
///
/// A capacity of zero is raised to one.
pub fn channel(id: ChannelId, capacity: usize) -> (ChannelSender, ChannelReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    (
        ChannelSender { id, tx },
        ChannelReceiver { id, capacity, rx },
    )
}

/// Producer half of a channel. Cloned into registry snapshots.
#[derive(Clone)]
pub struct ChannelSender {
    id: ChannelId,
    tx: mpsc::Sender<Arc<Event>>,
}

impl ChannelSender {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Offer an event without waiting. A full queue keeps its contents and
    /// the new event is dropped.
    pub fn offer(&self, event: Arc<Event>) -> Offer {
        match self.tx.try_send(event) {
            Ok(()) => Offer::Accepted,
            Err(TrySendError::Full(_)) => Offer::Full,
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    /// Enqueue if there is room. Never blocks.
    pub fn try_push(&self, event: Arc<Event>) -> bool {
        self.offer(event) == Offer::Accepted
    }

    /// Fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Number of events waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether the consumer half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for ChannelSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSender")
            .field("id", &self.id)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Consumer half of a channel, owned by exactly one stream session.
pub struct ChannelReceiver {
    id: ChannelId,
    capacity: usize,
    rx: mpsc::Receiver<Arc<Event>>,
}

impl ChannelReceiver {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait up to `timeout` for the next event.
    pub async fn pop(&mut self, timeout: Duration) -> Popped {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => Popped::Event(event),
            Ok(None) => Popped::Closed,
            Err(_) => Popped::Timeout,
        }
    }
}

impl fmt::Debug for ChannelReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelReceiver")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .finish()
    }
}
