//! Channel registry: create-on-first-subscriber, destroy-on-empty.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::channel::Channel;
use crate::connection::{ConnectionHandle, ConnectionId};

/// Registry of live channels plus the membership index that enforces the
/// one-channel-per-connection rule.
///
/// A channel exists exactly while it has members: the first subscriber
/// creates it and the departure of the last member destroys it, whether the
/// member unsubscribed or switched to another channel.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    /// Channels indexed by name.
    channels: HashMap<String, Channel>,
    /// Each connection's single current channel.
    membership: HashMap<ConnectionId, String>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to `channel`, switching it away from its
    /// previous channel if it had one. The departed channel is destroyed
    /// when the switch leaves it empty.
    ///
    /// Channel names are accepted verbatim, the empty string included.
    pub fn subscribe(&mut self, handle: ConnectionHandle, channel: &str) {
        let id = handle.id().clone();
        self.remove_membership(&id);

        let entry = self.channels.entry(channel.to_string()).or_insert_with(|| {
            debug!(channel = %channel, "Creating channel");
            Channel::new(channel)
        });
        entry.join(handle);
        self.membership.insert(id, channel.to_string());
    }

    /// Remove a connection from its channel, if any. Idempotent.
    ///
    /// Returns `true` if a membership was removed. Destroys the channel when
    /// the departure leaves it empty.
    pub fn unsubscribe(&mut self, id: &ConnectionId) -> bool {
        self.remove_membership(id)
    }

    fn remove_membership(&mut self, id: &ConnectionId) -> bool {
        let Some(name) = self.membership.remove(id) else {
            return false;
        };
        if let Some(channel) = self.channels.get_mut(&name) {
            channel.leave(id);
            if channel.is_empty() {
                self.channels.remove(&name);
                debug!(channel = %name, "Destroyed empty channel");
            }
        }
        true
    }

    /// Queue `payload` to the members of `channel`, skipping `exclude` when
    /// given. A channel that does not exist is a no-op.
    ///
    /// Returns the number of members the payload was queued to.
    pub fn broadcast(
        &self,
        channel: &str,
        payload: &Bytes,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        match self.channels.get(channel) {
            Some(ch) => ch.fan_out(payload, exclude),
            None => 0,
        }
    }

    /// The channel a connection is currently subscribed to.
    #[must_use]
    pub fn channel_of(&self, id: &ConnectionId) -> Option<&str> {
        self.membership.get(id).map(String::as_str)
    }

    /// Check if a channel exists.
    #[must_use]
    pub fn channel_exists(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Number of live channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of members in `channel`, zero when it does not exist.
    #[must_use]
    pub fn member_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, Channel::member_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn member(id: &str) -> (ConnectionHandle, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(id.into(), tx), rx)
    }

    #[test]
    fn test_registry_create_and_destroy() {
        let mut registry = ChannelRegistry::new();
        let (a, _rx) = member("a-1");

        registry.subscribe(a, "Global");
        assert!(registry.channel_exists("Global"));
        assert_eq!(registry.member_count("Global"), 1);
        assert_eq!(registry.channel_of(&"a-1".into()), Some("Global"));

        assert!(registry.unsubscribe(&"a-1".into()));
        assert!(!registry.channel_exists("Global"));
        assert_eq!(registry.channel_count(), 0);
    }

    #[test]
    fn test_registry_switch_destroys_emptied_channel() {
        let mut registry = ChannelRegistry::new();
        let (a, _rx) = member("a-1");

        registry.subscribe(a.clone(), "first");
        registry.subscribe(a, "second");

        assert!(!registry.channel_exists("first"));
        assert!(registry.channel_exists("second"));
        assert_eq!(registry.channel_of(&"a-1".into()), Some("second"));
        assert_eq!(registry.channel_count(), 1);
    }

    #[test]
    fn test_registry_switch_keeps_populated_channel() {
        let mut registry = ChannelRegistry::new();
        let (a, _rx_a) = member("a-1");
        let (b, _rx_b) = member("b-1");

        registry.subscribe(a, "first");
        registry.subscribe(b.clone(), "first");
        registry.subscribe(b, "second");

        assert!(registry.channel_exists("first"));
        assert_eq!(registry.member_count("first"), 1);
        assert_eq!(registry.member_count("second"), 1);
    }

    #[test]
    fn test_registry_unsubscribe_is_idempotent() {
        let mut registry = ChannelRegistry::new();
        let (a, _rx) = member("a-1");

        registry.subscribe(a, "Global");
        assert!(registry.unsubscribe(&"a-1".into()));
        assert!(!registry.unsubscribe(&"a-1".into()));
        assert!(!registry.unsubscribe(&"never-seen".into()));
    }

    #[test]
    fn test_registry_broadcast_to_absent_channel_is_noop() {
        let registry = ChannelRegistry::new();
        assert_eq!(
            registry.broadcast("nowhere", &Bytes::from_static(b"frame"), None),
            0
        );
    }

    #[test]
    fn test_registry_broadcast_isolated_between_channels() {
        let mut registry = ChannelRegistry::new();
        let (a, mut rx_a) = member("a-1");
        let (b, mut rx_b) = member("b-1");

        registry.subscribe(a, "red");
        registry.subscribe(b, "blue");

        let payload = Bytes::from_static(b"frame");
        assert_eq!(registry.broadcast("red", &payload, None), 1);
        assert_eq!(rx_a.try_recv().unwrap(), payload);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_registry_empty_channel_name_accepted() {
        let mut registry = ChannelRegistry::new();
        let (a, mut rx) = member("a-1");

        registry.subscribe(a, "");
        assert!(registry.channel_exists(""));
        assert_eq!(registry.broadcast("", &Bytes::from_static(b"frame"), None), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_registry_resubscribe_same_channel() {
        let mut registry = ChannelRegistry::new();
        let (a, _rx) = member("a-1");

        registry.subscribe(a.clone(), "Global");
        registry.subscribe(a, "Global");

        assert!(registry.channel_exists("Global"));
        assert_eq!(registry.member_count("Global"), 1);
        assert_eq!(registry.channel_count(), 1);
    }
}
