//! Incremental decoder for the sentinel-delimited relay stream.
//!
//! Each connection owns one [`FrameDecoder`] with a fixed-capacity receive
//! buffer. Raw chunks are appended with [`FrameDecoder::feed`] and completed
//! frames drained with [`FrameDecoder::next_frame`]; a frame split across any
//! number of reads waits in the buffer until its closing sentinel arrives.
//!
//! The scanner keeps explicit state across feeds (which sentinel it is
//! looking for, and how far it has already searched), so a chunk never causes
//! a rescan of the whole buffer.

use bytes::BytesMut;
use thiserror::Error;

use crate::frames::{Frame, FrameKind, PAYLOAD_START, SUBSCRIBE_END, SUBSCRIBE_START};

/// Default per-connection receive buffer capacity (1 MiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Longest sentinel token. Scans resume this far before the high-water mark
/// so a token split across two reads is still found.
const MAX_TOKEN_LEN: usize = SUBSCRIBE_END.len();

/// Decoding errors.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// An incoming chunk did not fit the remaining buffer capacity. The
    /// buffered bytes were discarded and the chunk dropped; the stream may
    /// continue with later chunks.
    #[error(
        "Chunk of {incoming} bytes exceeds remaining buffer capacity \
         ({buffered}/{capacity} in use); buffer discarded"
    )]
    BufferOverflow {
        /// Configured buffer capacity.
        capacity: usize,
        /// Fill length at the time the chunk arrived.
        buffered: usize,
        /// Size of the rejected chunk.
        incoming: usize,
    },
}

/// Scanner position within the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Looking for the next frame's opening sentinel.
    SeekingFrameStart,
    /// Opening sentinel found; accumulating the body until the matching
    /// closing sentinel. Sentinels of the other kind inside the body are not
    /// interpreted.
    AccumulatingFrameBody(FrameKind),
}

/// Incremental frame decoder with a fixed-capacity receive buffer.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    capacity: usize,
    state: ScanState,
    /// Offset of the first body byte while accumulating.
    body_start: usize,
    /// High-water mark of searched bytes.
    scanned: usize,
}

impl FrameDecoder {
    /// Create a decoder with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a decoder with a specific buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            state: ScanState::SeekingFrameStart,
            body_start: 0,
            scanned: 0,
        }
    }

    /// Configured buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current fill length of the receive buffer.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Current scanner state.
    #[must_use]
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Append an incoming chunk to the receive buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::BufferOverflow`] if the chunk does not fit the
    /// remaining capacity. The buffer is reset to empty and the chunk is
    /// dropped; the connection is expected to stay open.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), DecodeError> {
        if chunk.len() > self.capacity - self.buf.len() {
            let err = DecodeError::BufferOverflow {
                capacity: self.capacity,
                buffered: self.buf.len(),
                incoming: chunk.len(),
            };
            self.reset();
            return Err(err);
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Extract the next complete frame, if one is buffered.
    ///
    /// Frames are returned in arrival order; call in a loop after each feed.
    /// Returns `None` when no complete frame remains, leaving any partial
    /// frame buffered for later chunks.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                ScanState::SeekingFrameStart => {
                    let from = self.scanned.saturating_sub(MAX_TOKEN_LEN - 1);
                    let Some((kind, at)) = self.find_frame_start(from) else {
                        self.scanned = self.buf.len();
                        return None;
                    };
                    self.body_start = at + kind.start_token().len();
                    self.scanned = self.body_start;
                    self.state = ScanState::AccumulatingFrameBody(kind);
                }
                ScanState::AccumulatingFrameBody(kind) => {
                    let end = kind.end_token().as_bytes();
                    let from = self
                        .scanned
                        .saturating_sub(end.len() - 1)
                        .max(self.body_start);
                    let Some(pos) = find(&self.buf[from..], end) else {
                        self.scanned = self.buf.len();
                        return None;
                    };
                    let body_end = from + pos;
                    return Some(self.take_frame(kind, body_end, body_end + end.len()));
                }
            }
        }
    }

    /// Find the earliest opening sentinel of either kind at or after `from`.
    fn find_frame_start(&self, from: usize) -> Option<(FrameKind, usize)> {
        let window = &self.buf[from..];
        let sub = find(window, SUBSCRIBE_START.as_bytes());
        let pay = find(window, PAYLOAD_START.as_bytes());
        let (kind, pos) = match (sub, pay) {
            (Some(s), Some(p)) if s <= p => (FrameKind::Subscribe, s),
            (_, Some(p)) => (FrameKind::Payload, p),
            (Some(s), None) => (FrameKind::Subscribe, s),
            (None, None) => return None,
        };
        Some((kind, from + pos))
    }

    /// Build the completed frame and compact the remainder to the buffer
    /// start. Everything up to and including the closing sentinel is
    /// consumed, including any bytes that preceded the opening sentinel.
    fn take_frame(&mut self, kind: FrameKind, body_end: usize, consumed: usize) -> Frame {
        let body = String::from_utf8_lossy(&self.buf[self.body_start..body_end]).into_owned();

        let remaining = self.buf.len() - consumed;
        self.buf.copy_within(consumed.., 0);
        self.buf.truncate(remaining);

        self.state = ScanState::SeekingFrameStart;
        self.body_start = 0;
        self.scanned = 0;

        match kind {
            FrameKind::Subscribe => Frame::subscribe(body),
            FrameKind::Payload => Frame::payload(body),
        }
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.state = ScanState::SeekingFrameStart;
        self.body_start = 0;
        self.scanned = 0;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
