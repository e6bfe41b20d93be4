//! # parlor-core
//!
//! Connection, channel, and relay state for the Parlor lobby relay.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **ConnectionHandle** - Identity plus outbound queue for one connection
//! - **ChannelRegistry** - Create-on-first-subscriber, destroy-on-empty rooms
//! - **LobbyState** - The directory served to `getServers` requests
//! - **MessageRouter** - Payload parsing, transformation, censoring
//! - **RelayService** - Single owner of all mutable relay state
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────────┐
//! │ Connection  │────▶│ RelayService │────▶│ ChannelRegistry │
//! └─────────────┘     └──────────────┘     └─────────────────┘
//!                            │
//!                 ┌──────────┼──────────┐
//!                 ▼          ▼          ▼
//!          ┌────────────┐ ┌───────┐ ┌────────────┐
//!          │ Moderation │ │ Lobby │ │   Router   │
//!          └────────────┘ └───────┘ └────────────┘
//! ```
//!
//! All of it is owned by one task; the registry and the tables are plain
//! maps, and nothing in this crate takes a lock.

pub mod channel;
pub mod connection;
pub mod lobby;
pub mod moderation;
pub mod registry;
pub mod router;
pub mod service;

pub use channel::Channel;
pub use connection::{ConnectionHandle, ConnectionId};
pub use lobby::{LobbyEntry, LobbyState, SongInfo};
pub use moderation::{
    ModerationQueue, ProfanityFilter, ReportedMessage, WordListFilter, DEFAULT_GRAWLIX,
};
pub use registry::ChannelRegistry;
pub use router::{MessageRouter, RouteError, Routed};
pub use service::{PayloadOutcome, RelayService};
