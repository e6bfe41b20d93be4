//! Connection identity and write handles.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Unique identifier for a connection, derived from the peer address.
///
/// The identity is unique only while the connection is live; once torn down,
/// a reconnect from the same peer address legitimately reuses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a connection ID from an arbitrary string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the connection ID from the peer socket address (`"<ip>-<port>"`).
    #[must_use]
    pub fn from_addr(addr: &SocketAddr) -> Self {
        Self(format!("{}-{}", addr.ip(), addr.port()))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Cheap-clone reference to a live connection: its identity, the outbound
/// write queue, and the shared liveness flag.
///
/// Sends are fire-and-forget onto an unbounded queue drained by the
/// connection's driver task; there is no backpressure. Cloned handles share
/// the liveness flag, so marking one closed is visible through all of them.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Bytes>,
    live: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Create a handle over a fresh outbound queue.
    #[must_use]
    pub fn new(id: ConnectionId, outbound: mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            id,
            outbound,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The connection's identity.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Whether the connection is still considered live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Mark the connection as closed. All clones of this handle observe it.
    pub fn mark_closed(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Queue bytes for delivery to this connection.
    ///
    /// Returns `false` when the connection was marked closed or its writer
    /// task is gone; the payload is silently dropped in that case.
    pub fn send(&self, payload: Bytes) -> bool {
        if !self.is_live() {
            return false;
        }
        self.outbound.send(payload).is_ok()
    }
}
