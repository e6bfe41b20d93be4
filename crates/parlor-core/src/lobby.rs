//! Lobby directory shared with clients.
//!
//! The directory is what a `getServers` request snapshots into its
//! `gotServers` response. Entries serialize with the camelCase field names
//! clients expect; absent `host` and `password` are emitted as explicit
//! JSON nulls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Song metadata attached to a lobby entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongInfo {
    /// Song name, empty until one is picked.
    pub song_name: String,
    /// Difficulty label.
    pub song_diff: String,
}

/// A lobby visible in the `gotServers` listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyEntry {
    /// Display name.
    pub name: String,
    /// Whether the lobby survives becoming empty.
    pub stays_open: bool,
    /// Players currently in the lobby.
    pub players: Vec<Value>,
    /// Hosting player, null when unassigned.
    pub host: Option<Value>,
    /// Join key, null when the lobby is open.
    pub password: Option<Value>,
    /// Player capacity.
    pub max_players: u32,
    /// Whether joining requires the password.
    pub has_password: bool,
    /// Stable lobby identifier.
    pub id: u64,
    /// Song currently selected.
    pub current_song: SongInfo,
    /// Whether the session has started.
    pub started: bool,
    /// Chat backlog for the lobby.
    pub chat_messages: Vec<Value>,
}

impl LobbyEntry {
    /// Create an open, empty lobby.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stays_open: false,
            players: Vec::new(),
            host: None,
            password: None,
            max_players: 0,
            has_password: false,
            id,
            current_song: SongInfo::default(),
            started: false,
            chat_messages: Vec::new(),
        }
    }

    /// Mark the lobby as permanent.
    #[must_use]
    pub fn with_stays_open(mut self, stays_open: bool) -> Self {
        self.stays_open = stays_open;
        self
    }

    /// Set the player capacity.
    #[must_use]
    pub fn with_max_players(mut self, max_players: u32) -> Self {
        self.max_players = max_players;
        self
    }
}

/// In-memory lobby directory.
///
/// Seeded at startup with the permanent default lobby every client sees.
#[derive(Debug)]
pub struct LobbyState {
    entries: Vec<LobbyEntry>,
}

impl LobbyState {
    /// Create the directory with the permanent "Big Lobby" entry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![LobbyEntry::new(0, "Big Lobby")
                .with_stays_open(true)
                .with_max_players(100)],
        }
    }

    /// The current listing, in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[LobbyEntry] {
        &self.entries
    }

    /// Number of listed lobbies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the listing is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LobbyState {
    fn default() -> Self {
        Self::new()
    }
}
