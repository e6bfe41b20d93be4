//! The relay event loop.
//!
//! A single task owns the [`RelayService`] and consumes connection events in
//! arrival order, so every state change happens in one place with nothing to
//! lock. Every connection task feeds the same queue; per-connection event
//! order is the order the bytes arrived in.

use tokio::sync::mpsc;
use tokio::time::{interval_at, Duration, Instant};
use tracing::{debug, info, warn};

use parlor_core::{ConnectionHandle, ConnectionId, RelayService};
use parlor_protocol::Frame;

use crate::metrics;

/// Connection events feeding the relay loop.
#[derive(Debug)]
pub enum RelayEvent {
    /// A connection was accepted and its transport task started.
    Opened(ConnectionHandle),
    /// A complete frame arrived on a connection.
    Frame(ConnectionId, Frame),
    /// A connection's transport ended, by EOF or by error.
    Closed(ConnectionId),
}

/// Run the relay loop until every event sender is gone.
pub async fn run_relay(
    mut service: RelayService,
    mut events: mpsc::UnboundedReceiver<RelayEvent>,
    status_interval_secs: u64,
) {
    let started = Instant::now();
    let status_enabled = status_interval_secs > 0;
    let period = Duration::from_secs(status_interval_secs.max(1));
    let mut status = interval_at(started + period, period);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => handle_event(&mut service, event),
                    None => break,
                }
            }

            _ = status.tick(), if status_enabled => {
                info!(
                    uptime_secs = started.elapsed().as_secs(),
                    connections = service.connection_count(),
                    channels = service.channel_count(),
                    reports = service.report_count(),
                    "Server running"
                );
            }
        }
    }

    debug!("Relay loop stopped");
}

fn handle_event(service: &mut RelayService, event: RelayEvent) {
    match event {
        RelayEvent::Opened(handle) => {
            service.register(handle);
        }

        RelayEvent::Frame(id, Frame::Subscribe { channel }) => {
            metrics::record_frame("subscribe");
            if !service.subscribe(&id, &channel) {
                debug!(connection = %id, "Subscribe from unknown connection");
            }
            metrics::set_active_channels(service.channel_count());
        }

        RelayEvent::Frame(id, Frame::Payload { body }) => {
            metrics::record_frame("payload");
            match service.handle_payload(&id, &body) {
                Ok(outcome) => {
                    metrics::record_broadcast(outcome.recipients);
                    if outcome.reported {
                        metrics::record_reported_message();
                    }
                }
                Err(e) => {
                    warn!(connection = %id, error = %e, "Dropped malformed payload");
                    metrics::record_malformed_payload();
                }
            }
        }

        RelayEvent::Closed(id) => {
            if service.teardown(&id) {
                metrics::set_active_channels(service.channel_count());
            }
        }
    }
}
