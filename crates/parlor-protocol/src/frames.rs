//! Frame types for the parlor relay protocol.
//!
//! The wire format is plain text: each frame is bracketed by a pair of
//! literal sentinel tokens with no length prefix. The format is inherited
//! from the original lobby service and is kept byte-for-byte compatible.

use bytes::{BufMut, Bytes, BytesMut};

/// Opening sentinel of a subscribe frame.
pub const SUBSCRIBE_START: &str = "__SUBSCRIBE__";
/// Closing sentinel of a subscribe frame.
pub const SUBSCRIBE_END: &str = "__ENDSUBSCRIBE__";
/// Opening sentinel of a payload frame.
pub const PAYLOAD_START: &str = "__JSON__START__";
/// Closing sentinel of a payload frame.
pub const PAYLOAD_END: &str = "__JSON__END__";

/// Acknowledgment bytes sent to a client when its subscription is processed.
/// The trailing space is part of the contract.
pub const SUBSCRIBE_ACK: &[u8] = b"Hello. Network online. \r\n";

/// Frame kind identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Subscribe,
    Payload,
}

impl FrameKind {
    /// The opening sentinel for this kind.
    #[must_use]
    pub fn start_token(self) -> &'static str {
        match self {
            FrameKind::Subscribe => SUBSCRIBE_START,
            FrameKind::Payload => PAYLOAD_START,
        }
    }

    /// The closing sentinel for this kind.
    #[must_use]
    pub fn end_token(self) -> &'static str {
        match self {
            FrameKind::Subscribe => SUBSCRIBE_END,
            FrameKind::Payload => PAYLOAD_END,
        }
    }
}

/// A protocol frame extracted from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Channel subscription request; the body is the channel name.
    Subscribe {
        /// Channel name, taken verbatim from between the sentinels.
        channel: String,
    },
    /// JSON payload to be routed and fanned out to the channel.
    Payload {
        /// The JSON text between the sentinels, not yet parsed.
        body: String,
    },
}

impl Frame {
    /// Create a new Subscribe frame.
    #[must_use]
    pub fn subscribe(channel: impl Into<String>) -> Self {
        Frame::Subscribe {
            channel: channel.into(),
        }
    }

    /// Create a new Payload frame.
    #[must_use]
    pub fn payload(body: impl Into<String>) -> Self {
        Frame::Payload { body: body.into() }
    }

    /// Get the frame kind.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Subscribe { .. } => FrameKind::Subscribe,
            Frame::Payload { .. } => FrameKind::Payload,
        }
    }
}

/// Encode a subscribe frame for a channel name.
#[must_use]
pub fn encode_subscribe(channel: &str) -> Bytes {
    wrap(FrameKind::Subscribe, channel)
}

/// Encode a payload frame around JSON text. This is the exact byte sequence
/// broadcast to channel members.
#[must_use]
pub fn encode_payload(json: &str) -> Bytes {
    wrap(FrameKind::Payload, json)
}

fn wrap(kind: FrameKind, body: &str) -> Bytes {
    let start = kind.start_token();
    let end = kind.end_token();
    let mut buf = BytesMut::with_capacity(start.len() + body.len() + end.len());
    buf.put_slice(start.as_bytes());
    buf.put_slice(body.as_bytes());
    buf.put_slice(end.as_bytes());
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_kind() {
        let subscribe = Frame::subscribe("lobby:global");
        assert_eq!(subscribe.kind(), FrameKind::Subscribe);

        let payload = Frame::payload(r#"{"action":"ping"}"#);
        assert_eq!(payload.kind(), FrameKind::Payload);
    }

    #[test]
    fn test_encode_subscribe() {
        let bytes = encode_subscribe("Global");
        assert_eq!(&bytes[..], b"__SUBSCRIBE__Global__ENDSUBSCRIBE__");
    }

    #[test]
    fn test_encode_payload() {
        let bytes = encode_payload(r#"{"action":"ping"}"#);
        assert_eq!(
            &bytes[..],
            br#"__JSON__START__{"action":"ping"}__JSON__END__"#
        );
    }

    #[test]
    fn test_ack_bytes_exact() {
        // Trailing space before CRLF is load-bearing for existing clients.
        assert_eq!(SUBSCRIBE_ACK, b"Hello. Network online. \r\n");
    }
}
