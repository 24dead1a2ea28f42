//! Device to subscriber-channel index.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::channel::{ChannelId, ChannelSender};

#[derive(Default)]
struct Subscribers {
    /// Channels subscribed to each device, in registration order.
    by_device: HashMap<String, Vec<ChannelSender>>,
    /// Device each channel is registered under.
    owners: HashMap<ChannelId, String>,
}

impl Subscribers {
    fn remove(&mut self, device_id: &str, channel_id: ChannelId) -> bool {
        let Some(channels) = self.by_device.get_mut(device_id) else {
            return false;
        };

        let before = channels.len();
        channels.retain(|c| c.id() != channel_id);
        let removed = channels.len() != before;

        if channels.is_empty() {
            self.by_device.remove(device_id);
        }
        if removed {
            self.owners.remove(&channel_id);
        }
        removed
    }
}

/// Registry of live subscriber channels keyed by device.
///
/// One instance is created at server startup and shared as
/// [`SharedRegistry`]. The lock is synchronous and only ever guards map
/// access; no queue I/O happens while it is held.
pub struct Registry {
    subscribers: Mutex<Subscribers>,
    next_channel_id: AtomicU64,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Subscribers::default()),
            next_channel_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh channel identifier.
    pub fn next_channel_id(&self) -> ChannelId {
        ChannelId::new(self.next_channel_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribe a channel to a device.
    ///
    /// Registering a channel that is already subscribed to the device is a
    /// no-op. A channel registered under another device is moved.
    pub fn register(&self, device_id: &str, channel: ChannelSender) {
        let channel_id = channel.id();
        let mut subs = self.subscribers.lock();

        match subs.owners.get(&channel_id).cloned() {
            Some(owner) if owner == device_id => return,
            Some(owner) => {
                subs.remove(&owner, channel_id);
            }
            None => {}
        }

        subs.owners.insert(channel_id, device_id.to_string());
        subs.by_device
            .entry(device_id.to_string())
            .or_default()
            .push(channel);
        drop(subs);

        tracing::debug!(device_id, %channel_id, "channel registered");
    }

    /// Remove a channel from a device. The device entry is dropped with its
    /// last channel. Returns whether anything was removed.
    pub fn unregister(&self, device_id: &str, channel_id: ChannelId) -> bool {
        let removed = self.subscribers.lock().remove(device_id, channel_id);

        if removed {
            tracing::debug!(device_id, %channel_id, "channel unregistered");
        }
        removed
    }

    /// Copy of the channels currently subscribed to a device.
    pub fn snapshot_subscribers(&self, device_id: &str) -> Vec<ChannelSender> {
        let subs = self.subscribers.lock();
        subs.by_device.get(device_id).cloned().unwrap_or_default()
    }

    /// Number of channels subscribed to a device.
    pub fn subscriber_count(&self, device_id: &str) -> usize {
        let subs = self.subscribers.lock();
        subs.by_device.get(device_id).map_or(0, Vec::len)
    }

    /// Whether any channel is subscribed to a device.
    pub fn contains_device(&self, device_id: &str) -> bool {
        self.subscribers.lock().by_device.contains_key(device_id)
    }

    /// Number of devices with at least one subscriber.
    pub fn device_count(&self) -> usize {
        self.subscribers.lock().by_device.len()
    }

    /// Total number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.subscribers.lock().owners.len()
    }

    /// Devices with at least one subscriber, sorted.
    pub fn devices(&self) -> Vec<String> {
        let mut devices: Vec<String> = self.subscribers.lock().by_device.keys().cloned().collect();
        devices.sort();
        devices
    }

    /// Drop every registered channel. Sessions waiting on those channels
    /// observe them closed and terminate. Returns the number released.
    pub fn close_all(&self) -> usize {
        let released = {
            let mut subs = self.subscribers.lock();
            let released = subs.owners.len();
            subs.by_device.clear();
            subs.owners.clear();
            released
        };

        if released > 0 {
            tracing::info!(channels = released, "released all subscriber channels");
        }
        released
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared registry handle.
pub type SharedRegistry = Arc<Registry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::channel::channel;

    #[test]
    fn test_register_unregister() {
        let registry = Registry::new();
        let (tx, _rx) = channel(registry.next_channel_id(), 10);
        let id = tx.id();

        registry.register("turbine-1", tx);
        assert_eq!(registry.subscriber_count("turbine-1"), 1);
        assert!(registry.contains_device("turbine-1"));

        assert!(registry.unregister("turbine-1", id));
        assert_eq!(registry.subscriber_count("turbine-1"), 0);
        assert!(!registry.contains_device("turbine-1"));
        assert_eq!(registry.device_count(), 0);
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = Registry::new();
        let (tx, _rx) = channel(registry.next_channel_id(), 10);

        registry.register("turbine-1", tx.clone());
        registry.register("turbine-1", tx);

        assert_eq!(registry.subscriber_count("turbine-1"), 1);
        assert_eq!(registry.channel_count(), 1);
    }

    #[test]
    fn test_register_moves_between_devices() {
        let registry = Registry::new();
        let (tx, _rx) = channel(registry.next_channel_id(), 10);
        let id = tx.id();

        registry.register("turbine-1", tx.clone());
        registry.register("turbine-2", tx);

        assert!(!registry.contains_device("turbine-1"));
        assert_eq!(registry.subscriber_count("turbine-2"), 1);
        assert_eq!(registry.channel_count(), 1);
        assert!(!registry.unregister("turbine-1", id));
        assert!(registry.unregister("turbine-2", id));
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let registry = Registry::new();
        assert!(!registry.unregister("nobody", ChannelId::new(42)));

        let (tx, _rx) = channel(registry.next_channel_id(), 10);
        registry.register("turbine-1", tx);
        assert!(!registry.unregister("turbine-1", ChannelId::new(42)));
        assert_eq!(registry.subscriber_count("turbine-1"), 1);
    }

    #[test]
    fn test_entry_kept_until_last_channel_leaves() {
        let registry = Registry::new();
        let (a, _ra) = channel(registry.next_channel_id(), 10);
        let (b, _rb) = channel(registry.next_channel_id(), 10);
        let (a_id, b_id) = (a.id(), b.id());

        registry.register("turbine-1", a);
        registry.register("turbine-1", b);

        registry.unregister("turbine-1", a_id);
        assert!(registry.contains_device("turbine-1"));

        registry.unregister("turbine-1", b_id);
        assert!(!registry.contains_device("turbine-1"));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let registry = Registry::new();
        let (a, _ra) = channel(registry.next_channel_id(), 10);
        let (b, _rb) = channel(registry.next_channel_id(), 10);
        let (a_id, b_id) = (a.id(), b.id());

        registry.register("turbine-1", a);
        registry.register("turbine-1", b);

        let snapshot = registry.snapshot_subscribers("turbine-1");
        registry.unregister("turbine-1", a_id);

        let ids: Vec<ChannelId> = snapshot.iter().map(ChannelSender::id).collect();
        assert_eq!(ids, vec![a_id, b_id]);
        assert_eq!(registry.subscriber_count("turbine-1"), 1);
        assert!(registry.snapshot_subscribers("nobody").is_empty());
    }

    #[test]
    fn test_close_all() {
        let registry = Registry::new();
        for device in ["turbine-1", "turbine-2", "turbine-2"] {
            let (tx, _rx) = channel(registry.next_channel_id(), 10);
            registry.register(device, tx);
        }

        assert_eq!(registry.devices(), vec!["turbine-1", "turbine-2"]);
        assert_eq!(registry.close_all(), 3);
        assert_eq!(registry.device_count(), 0);
        assert_eq!(registry.channel_count(), 0);
    }

    #[test]
    fn test_channel_ids_are_unique() {
        let registry = Registry::new();
        let a = registry.next_channel_id();
        let b = registry.next_channel_id();
        assert_ne!(a, b);
    }
}
