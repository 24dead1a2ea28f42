//! Broadcast of freshly stored readings.

use std::sync::Arc;

use super::channel::Offer;
use super::registry::SharedRegistry;
use crate::event::Event;

/// Per-broadcast delivery counts. Informational only; a broadcast never
/// fails.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Channels the event was queued on.
    pub delivered: usize,
    /// Channels that were full and dropped the event.
    pub dropped: usize,
    /// Channels whose session had already gone away.
    pub closed: usize,
}

impl BroadcastOutcome {
    /// Number of channels the event was offered to.
    pub fn offered(&self) -> usize {
        self.delivered + self.dropped + self.closed
    }
}

/// Offers events to every channel subscribed to their device.
#[derive(Clone)]
pub struct Publisher {
    registry: SharedRegistry,
}

impl Publisher {
    /// Create a publisher over a registry.
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Offer an event to the subscribers of `device_id`.
    ///
    /// Must only be called once the reading is durably stored. Never blocks:
    /// a full channel drops this event and keeps its queued ones.
    pub fn broadcast(&self, device_id: &str, event: Event) -> BroadcastOutcome {
        self.broadcast_shared(device_id, Arc::new(event))
    }

    /// Like [`Publisher::broadcast`] for an event that is already shared.
    pub fn broadcast_shared(&self, device_id: &str, event: Arc<Event>) -> BroadcastOutcome {
        let subscribers = self.registry.snapshot_subscribers(device_id);
        let mut outcome = BroadcastOutcome::default();
        if subscribers.is_empty() {
            return outcome;
        }

        for channel in &subscribers {
            match channel.offer(event.clone()) {
                Offer::Accepted => outcome.delivered += 1,
                Offer::Full => {
                    tracing::trace!(device_id, channel_id = %channel.id(), "channel full, event dropped");
                    outcome.dropped += 1;
                }
                Offer::Closed => outcome.closed += 1,
            }
        }

        tracing::debug!(
            device_id,
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "broadcast reading"
        );

        outcome
    }
}
