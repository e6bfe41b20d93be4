//! Profanity capability and the moderation queue.
//!
//! Chat text flagged by the filter is retained in full, uncensored, in an
//! append-only queue for later review; only the relayed copy is censored.

use std::collections::HashSet;

use tracing::debug;

/// Grawlix substituted for flagged words by the default filter.
pub const DEFAULT_GRAWLIX: &str = "@#$%&!";

/// Two-operation profanity capability.
pub trait ProfanityFilter {
    /// Whether `text` contains at least one flagged word.
    fn is_profane(&self, text: &str) -> bool;

    /// Return `text` with every flagged word replaced by a grawlix string.
    fn censor(&self, text: &str) -> String;
}

/// Case-insensitive whole-word filter over a configured word list.
///
/// Words are matched on alphanumeric runs, so punctuation delimits but
/// substrings inside longer words do not match.
#[derive(Debug, Clone)]
pub struct WordListFilter {
    words: HashSet<String>,
    grawlix: String,
}

impl WordListFilter {
    /// Create a filter over `words` with the default grawlix.
    #[must_use]
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
            grawlix: DEFAULT_GRAWLIX.to_string(),
        }
    }

    /// Replace the grawlix string.
    #[must_use]
    pub fn with_grawlix(mut self, grawlix: impl Into<String>) -> Self {
        self.grawlix = grawlix.into();
        self
    }

    fn flagged(&self, word: &str) -> bool {
        self.words.contains(word.to_lowercase().as_str())
    }
}

impl ProfanityFilter for WordListFilter {
    fn is_profane(&self, text: &str) -> bool {
        word_runs(text).any(|(is_word, run)| is_word && self.flagged(run))
    }

    fn censor(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for (is_word, run) in word_runs(text) {
            if is_word && self.flagged(run) {
                out.push_str(&self.grawlix);
            } else {
                out.push_str(run);
            }
        }
        out
    }
}

/// Split `text` into alternating runs of word and non-word characters.
fn word_runs(text: &str) -> impl Iterator<Item = (bool, &str)> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_word = is_word_char(first);
        let end = rest
            .char_indices()
            .find(|&(_, c)| is_word_char(c) != is_word)
            .map_or(rest.len(), |(i, _)| i);
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some((is_word, run))
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// A chat message flagged by the profanity capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedMessage {
    /// Original text exactly as sent, before censoring.
    pub content: String,
    /// The payload's `user` field when present, else the connection identity.
    pub sender_id: String,
}

/// Append-only queue of reported messages. Unbounded, never pruned.
#[derive(Debug, Default)]
pub struct ModerationQueue {
    reports: Vec<ReportedMessage>,
}

impl ModerationQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a flagged message.
    pub fn record(&mut self, report: ReportedMessage) {
        debug!(sender = %report.sender_id, "Recorded reported message");
        self.reports.push(report);
    }

    /// Number of recorded reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Check if no reports were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// All recorded reports, oldest first.
    #[must_use]
    pub fn reports(&self) -> &[ReportedMessage] {
        &self.reports
    }
}
