//! # parlor-protocol
//!
//! Wire protocol definitions for the Parlor realtime relay.
//!
//! The relay speaks a sentinel-delimited text protocol over plain TCP. Each
//! frame is a body wrapped in a matched pair of sentinel tokens; anything
//! between the tokens is the frame body, and frame boundaries carry no
//! relation to TCP read boundaries.
//!
//! ## Frame Types
//!
//! - `Subscribe` - join a named channel (`__SUBSCRIBE__name__ENDSUBSCRIBE__`)
//! - `Payload` - application payload (`__JSON__START__body__JSON__END__`)
//!
//! ## Example
//!
//! ```rust
//! use parlor_protocol::{frames, Frame, FrameDecoder};
//!
//! let mut decoder = FrameDecoder::new();
//! decoder.feed(&frames::encode_subscribe("Global")).unwrap();
//!
//! assert_eq!(decoder.next_frame(), Some(Frame::subscribe("Global")));
//! ```

pub mod decoder;
pub mod frames;

pub use decoder::{DecodeError, FrameDecoder, ScanState, DEFAULT_BUFFER_CAPACITY};
pub use frames::{Frame, FrameKind, SUBSCRIBE_ACK};
