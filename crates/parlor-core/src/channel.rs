//! Channel membership and fan-out.
//!
//! A channel is a named room holding handles to its member connections.
//! Channels never exist empty; creation and destruction are handled by the
//! [`ChannelRegistry`](crate::registry::ChannelRegistry).

use std::collections::HashMap;

use bytes::Bytes;
use tracing::trace;

use crate::connection::{ConnectionHandle, ConnectionId};

/// A named channel the relay fans payloads out to.
#[derive(Debug)]
pub struct Channel {
    /// Channel name, exactly as it appeared between the subscribe sentinels.
    name: String,
    /// Member handles keyed by connection identity.
    members: HashMap<ConnectionId, ConnectionHandle>,
}

impl Channel {
    /// Create a new, empty channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: HashMap::new(),
        }
    }

    /// Get the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if a connection is a member.
    #[must_use]
    pub fn is_member(&self, id: &ConnectionId) -> bool {
        self.members.contains_key(id)
    }

    /// Check if the channel has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add a connection to this channel, replacing any stored handle for the
    /// same identity.
    pub fn join(&mut self, handle: ConnectionHandle) {
        self.members.insert(handle.id().clone(), handle);
    }

    /// Remove a connection from this channel.
    ///
    /// Returns `true` if the connection was a member.
    pub fn leave(&mut self, id: &ConnectionId) -> bool {
        self.members.remove(id).is_some()
    }

    /// Queue `payload` to every live member, skipping `exclude` when given.
    ///
    /// Members whose connection is no longer live are skipped, not removed;
    /// their teardown removes them. Returns the number of members the
    /// payload was queued to.
    pub fn fan_out(&self, payload: &Bytes, exclude: Option<&ConnectionId>) -> usize {
        let mut delivered = 0;
        for (id, handle) in &self.members {
            if exclude == Some(id) {
                continue;
            }
            if handle.send(payload.clone()) {
                delivered += 1;
            }
        }
        trace!(channel = %self.name, recipients = delivered, "Fanned out payload");
        delivered
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
    fn test_join_leave() {
        let mut channel = Channel::new("Global");
        let (a, _rx) = member("a-1");

        channel.join(a);
        assert_eq!(channel.member_count(), 1);
        assert!(channel.is_member(&"a-1".into()));

        assert!(channel.leave(&"a-1".into()));
        assert!(channel.is_empty());
        assert!(!channel.leave(&"a-1".into()));
    }

    #[test]
    fn test_fan_out_reaches_all_members() {
        let mut channel = Channel::new("Global");
        let (a, mut rx_a) = member("a-1");
        let (b, mut rx_b) = member("b-1");
        channel.join(a);
        channel.join(b);

        let payload = Bytes::from_static(b"frame");
        assert_eq!(channel.fan_out(&payload, None), 2);
        assert_eq!(rx_a.try_recv().unwrap(), payload);
        assert_eq!(rx_b.try_recv().unwrap(), payload);
    }

    #[test]
    fn test_fan_out_excludes_sender() {
        let mut channel = Channel::new("Global");
        let (a, mut rx_a) = member("a-1");
        let (b, mut rx_b) = member("b-1");
        channel.join(a);
        channel.join(b);

        let payload = Bytes::from_static(b"frame");
        assert_eq!(channel.fan_out(&payload, Some(&"a-1".into())), 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), payload);
    }

    #[test]
    fn test_fan_out_skips_non_live_members() {
        let mut channel = Channel::new("Global");
        let (a, mut rx_a) = member("a-1");
        let (b, mut rx_b) = member("b-1");
        b.mark_closed();
        channel.join(a);
        channel.join(b);

        assert_eq!(channel.fan_out(&Bytes::from_static(b"frame"), None), 1);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
