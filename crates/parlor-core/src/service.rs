//! The relay service: single owner of all mutable relay state.
//!
//! One task owns a [`RelayService`] and feeds it connection events in
//! arrival order. Everything inside is plain single-owner state; no locking
//! anywhere. Broadcasts are queued onto per-connection outbound queues
//! synchronously, within the handling of the frame that caused them.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use parlor_protocol::SUBSCRIBE_ACK;

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::lobby::LobbyState;
use crate::moderation::{ModerationQueue, ProfanityFilter};
use crate::registry::ChannelRegistry;
use crate::router::{MessageRouter, RouteError};

/// What handling a payload frame did, for the caller's logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadOutcome {
    /// Members the routed frame was queued to.
    pub recipients: usize,
    /// Whether the censor step recorded a moderation report.
    pub reported: bool,
}

/// Owns the registry, the live-connection table, the lobby directory, the
/// moderation queue, and the payload router.
pub struct RelayService {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    registry: ChannelRegistry,
    lobby: LobbyState,
    moderation: ModerationQueue,
    router: MessageRouter,
    /// Whether broadcasts include the sender.
    send_own_messages_back: bool,
}

impl RelayService {
    /// Create a service around a profanity capability.
    #[must_use]
    pub fn new(filter: Box<dyn ProfanityFilter + Send>, send_own_messages_back: bool) -> Self {
        Self {
            connections: HashMap::new(),
            registry: ChannelRegistry::new(),
            lobby: LobbyState::new(),
            moderation: ModerationQueue::new(),
            router: MessageRouter::new(filter),
            send_own_messages_back,
        }
    }

    /// Register a newly accepted connection.
    pub fn register(&mut self, handle: ConnectionHandle) {
        debug!(connection = %handle.id(), "Connection registered");
        self.connections.insert(handle.id().clone(), handle);
    }

    /// Handle a subscribe frame: switch the connection onto `channel` and
    /// queue the acknowledgment bytes back to it.
    ///
    /// Returns `false` when the connection is unknown (already torn down).
    pub fn subscribe(&mut self, id: &ConnectionId, channel: &str) -> bool {
        let Some(handle) = self.connections.get(id).cloned() else {
            return false;
        };
        self.registry.subscribe(handle.clone(), channel);
        handle.send(Bytes::from_static(SUBSCRIBE_ACK));
        debug!(connection = %id, channel = %channel, "Subscribed");
        true
    }

    /// Handle a payload frame: route it, record any moderation report, and
    /// broadcast the result to the sender's current channel.
    ///
    /// Routing runs even for a channel-less sender; only the broadcast is
    /// skipped then.
    ///
    /// # Errors
    ///
    /// Returns the [`RouteError`] for a malformed body. The frame is dropped;
    /// the connection stays registered.
    pub fn handle_payload(
        &mut self,
        id: &ConnectionId,
        body: &str,
    ) -> Result<PayloadOutcome, RouteError> {
        let routed = self.router.route(id, body, &self.lobby)?;
        let reported = routed.report.is_some();
        if let Some(report) = routed.report {
            self.moderation.record(report);
        }

        let exclude = (!self.send_own_messages_back).then_some(id);
        let recipients = match self.registry.channel_of(id) {
            Some(channel) => self.registry.broadcast(channel, &routed.wire, exclude),
            None => 0,
        };

        Ok(PayloadOutcome {
            recipients,
            reported,
        })
    }

    /// Tear down a connection. Idempotent; the second invocation is a no-op.
    ///
    /// Marks the connection not-live, drops its handles (releasing the
    /// outbound queue so the driver task drains and exits), and removes it
    /// from its channel with destroy-on-empty.
    pub fn teardown(&mut self, id: &ConnectionId) -> bool {
        let Some(handle) = self.connections.remove(id) else {
            return false;
        };
        handle.mark_closed();
        self.registry.unsubscribe(id);
        debug!(connection = %id, "Connection torn down");
        true
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of live channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.registry.channel_count()
    }

    /// Number of reported messages retained for review.
    #[must_use]
    pub fn report_count(&self) -> usize {
        self.moderation.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::WordListFilter;
    use parlor_protocol::frames;
    use tokio::sync::mpsc;

    fn service(words: &[&str], echo: bool) -> RelayService {
        RelayService::new(Box::new(WordListFilter::new(words.iter().copied())), echo)
    }

    fn connect(
        service: &mut RelayService,
        id: &str,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::from(id);
        service.register(ConnectionHandle::new(id.clone(), tx));
        (id, rx)
    }

    fn recv_text(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> String {
        String::from_utf8(rx.try_recv().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_subscribe_sends_exact_ack() {
        let mut service = service(&[], true);
        let (a, mut rx) = connect(&mut service, "a-1");

        assert!(service.subscribe(&a, "Global"));
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(SUBSCRIBE_ACK));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_payload_fans_out_including_sender() {
        let mut service = service(&[], true);
        let (a, mut rx_a) = connect(&mut service, "a-1");
        let (b, mut rx_b) = connect(&mut service, "b-1");
        let (c, mut rx_c) = connect(&mut service, "c-1");
        service.subscribe(&a, "Global");
        service.subscribe(&b, "Global");
        service.subscribe(&c, "Global");
        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            rx.try_recv().unwrap(); // drain acks
        }

        let outcome = service
            .handle_payload(&a, r#"{"action":"ping"}"#)
            .unwrap();

        assert_eq!(outcome.recipients, 3);
        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            assert!(recv_text(rx).contains(r#""action":"ping""#));
        }
    }

    #[test]
    fn test_echo_disabled_excludes_sender() {
        let mut service = service(&[], false);
        let (a, mut rx_a) = connect(&mut service, "a-1");
        let (b, mut rx_b) = connect(&mut service, "b-1");
        service.subscribe(&a, "Global");
        service.subscribe(&b, "Global");
        rx_a.try_recv().unwrap();
        rx_b.try_recv().unwrap();

        let outcome = service
            .handle_payload(&a, r#"{"action":"ping"}"#)
            .unwrap();

        assert_eq!(outcome.recipients, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_channel_less_sender_routes_without_broadcast() {
        let mut service = service(&["dang"], true);
        let (a, mut rx_a) = connect(&mut service, "a-1");

        let outcome = service
            .handle_payload(&a, r#"{"action":"chat","message":"dang"}"#)
            .unwrap();

        assert_eq!(outcome.recipients, 0);
        assert!(outcome.reported);
        assert_eq!(service.report_count(), 1);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_get_servers_reaches_whole_channel() {
        let mut service = service(&[], true);
        let (a, mut rx_a) = connect(&mut service, "a-1");
        let (b, mut rx_b) = connect(&mut service, "b-1");
        service.subscribe(&a, "Global");
        service.subscribe(&b, "Global");
        rx_a.try_recv().unwrap();
        rx_b.try_recv().unwrap();

        service
            .handle_payload(&a, r#"{"action":"getServers","user":"wanda"}"#)
            .unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            let text = recv_text(rx);
            assert!(text.starts_with(frames::PAYLOAD_START));
            assert!(text.contains(r#""action":"gotServers""#));
            assert!(text.contains("Big Lobby"));
        }
    }

    #[test]
    fn test_flagged_chat_censored_for_recipients() {
        let mut service = service(&["dang"], true);
        let (a, mut rx_a) = connect(&mut service, "a-1");
        service.subscribe(&a, "Global");
        rx_a.try_recv().unwrap();

        service
            .handle_payload(&a, r#"{"action":"chat","message":"dang it","user":"moe"}"#)
            .unwrap();

        let text = recv_text(&mut rx_a);
        assert!(text.contains("@#$%&! it"));
        assert!(!text.contains("dang"));
        assert_eq!(service.report_count(), 1);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut service = service(&[], true);
        let (a, _rx) = connect(&mut service, "a-1");
        service.subscribe(&a, "Global");

        assert!(service.teardown(&a));
        assert_eq!(service.connection_count(), 0);
        assert_eq!(service.channel_count(), 0);

        assert!(!service.teardown(&a));
        assert!(!service.teardown(&"never-seen".into()));
    }

    #[test]
    fn test_identity_reuse_after_teardown() {
        let mut service = service(&[], true);
        let (a, _old_rx) = connect(&mut service, "9.9.9.9-1000");
        service.subscribe(&a, "Global");
        service.teardown(&a);

        let (a2, mut new_rx) = connect(&mut service, "9.9.9.9-1000");
        assert!(service.subscribe(&a2, "Global"));
        assert_eq!(new_rx.try_recv().unwrap(), Bytes::from_static(SUBSCRIBE_ACK));
        assert_eq!(service.channel_count(), 1);
    }

    #[test]
    fn test_malformed_payload_keeps_connection() {
        let mut service = service(&[], true);
        let (a, mut rx_a) = connect(&mut service, "a-1");
        service.subscribe(&a, "Global");
        rx_a.try_recv().unwrap();

        assert!(service.handle_payload(&a, "{broken").is_err());
        assert_eq!(service.connection_count(), 1);

        // Later frames still relay.
        let outcome = service
            .handle_payload(&a, r#"{"action":"ping"}"#)
            .unwrap();
        assert_eq!(outcome.recipients, 1);
    }

    #[test]
    fn test_subscribe_unknown_connection() {
        let mut service = service(&[], true);
        assert!(!service.subscribe(&"ghost".into(), "Global"));
    }
}
