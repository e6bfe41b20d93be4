//! Metrics collection and export for the relay.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "parlor_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "parlor_connections_active";
    pub const FRAMES_TOTAL: &str = "parlor_frames_total";
    pub const BROADCASTS_TOTAL: &str = "parlor_broadcasts_total";
    pub const BROADCAST_RECIPIENTS_TOTAL: &str = "parlor_broadcast_recipients_total";
    pub const BUFFER_OVERFLOWS_TOTAL: &str = "parlor_buffer_overflows_total";
    pub const MALFORMED_PAYLOADS_TOTAL: &str = "parlor_malformed_payloads_total";
    pub const REPORTED_MESSAGES_TOTAL: &str = "parlor_reported_messages_total";
    pub const CHANNELS_ACTIVE: &str = "parlor_channels_active";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    // Describe metrics
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::FRAMES_TOTAL, "Total number of decoded frames");
    metrics::describe_counter!(names::BROADCASTS_TOTAL, "Total number of channel broadcasts");
    metrics::describe_counter!(
        names::BROADCAST_RECIPIENTS_TOTAL,
        "Total number of members reached by broadcasts"
    );
    metrics::describe_counter!(
        names::BUFFER_OVERFLOWS_TOTAL,
        "Total number of discarded receive buffers"
    );
    metrics::describe_counter!(
        names::MALFORMED_PAYLOADS_TOTAL,
        "Total number of dropped malformed payloads"
    );
    metrics::describe_counter!(
        names::REPORTED_MESSAGES_TOTAL,
        "Total number of messages recorded for moderation"
    );
    metrics::describe_gauge!(names::CHANNELS_ACTIVE, "Current number of active channels");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a decoded frame.
pub fn record_frame(kind: &str) {
    counter!(names::FRAMES_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Record a broadcast and how many members it reached.
pub fn record_broadcast(recipients: usize) {
    counter!(names::BROADCASTS_TOTAL).increment(1);
    counter!(names::BROADCAST_RECIPIENTS_TOTAL).increment(recipients as u64);
}

/// Record a discarded receive buffer.
pub fn record_buffer_overflow() {
    counter!(names::BUFFER_OVERFLOWS_TOTAL).increment(1);
}

/// Record a dropped malformed payload.
pub fn record_malformed_payload() {
    counter!(names::MALFORMED_PAYLOADS_TOTAL).increment(1);
}

/// Record a message retained for moderation review.
pub fn record_reported_message() {
    counter!(names::REPORTED_MESSAGES_TOTAL).increment(1);
}

/// Update active channel count.
pub fn set_active_channels(count: usize) {
    gauge!(names::CHANNELS_ACTIVE).set(count as f64);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
