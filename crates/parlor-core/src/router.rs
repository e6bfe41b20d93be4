//! Payload routing: parse, transform, re-wrap.
//!
//! Every payload frame is parsed as a JSON object with a required string
//! `action`. A `getServers` request is answered with a replacement object
//! carrying the lobby listing; anything else is relayed untouched apart from
//! the chat censor step. The routed result is re-serialized and wrapped back
//! into payload sentinels, ready for broadcast.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use parlor_protocol::frames;

use crate::connection::ConnectionId;
use crate::lobby::{LobbyEntry, LobbyState};
use crate::moderation::{ProfanityFilter, ReportedMessage};

/// Routing errors. Each one drops the offending frame only; the connection
/// stays open.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Body was not valid JSON.
    #[error("Payload body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Body parsed but was not a JSON object.
    #[error("Payload body is not a JSON object")]
    NotAnObject,

    /// Object lacks the required string `action` field.
    #[error("Payload object lacks a string \"action\" field")]
    MissingAction,

    /// Outgoing payload failed to serialize.
    #[error("Failed to serialize outgoing payload: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// A routed payload, ready for broadcast.
#[derive(Debug)]
pub struct Routed {
    /// Wire-ready frame bytes.
    pub wire: Bytes,
    /// Moderation record produced by the censor step, if the chat text was
    /// flagged.
    pub report: Option<ReportedMessage>,
}

#[derive(Serialize)]
struct GotServersResponse<'a> {
    servers: &'a [LobbyEntry],
    action: &'static str,
    user: Value,
}

/// Transforms payload bodies into broadcast-ready frames.
pub struct MessageRouter {
    filter: Box<dyn ProfanityFilter + Send>,
}

impl MessageRouter {
    /// Create a router around a profanity capability.
    #[must_use]
    pub fn new(filter: Box<dyn ProfanityFilter + Send>) -> Self {
        Self { filter }
    }

    /// Route one payload body from `sender`.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] for a body that is not a JSON object with a
    /// string `action`; the caller drops the frame and keeps the connection.
    pub fn route(
        &self,
        sender: &ConnectionId,
        body: &str,
        lobby: &LobbyState,
    ) -> Result<Routed, RouteError> {
        let parsed: Value = serde_json::from_str(body).map_err(RouteError::InvalidJson)?;
        let Value::Object(mut object) = parsed else {
            return Err(RouteError::NotAnObject);
        };
        let Some(action) = object.get("action").and_then(Value::as_str) else {
            return Err(RouteError::MissingAction);
        };

        if action == "getServers" {
            let response = GotServersResponse {
                servers: lobby.entries(),
                action: "gotServers",
                user: object.get("user").cloned().unwrap_or(Value::Null),
            };
            let json = serde_json::to_string(&response).map_err(RouteError::Serialize)?;
            return Ok(Routed {
                wire: frames::encode_payload(&json),
                report: None,
            });
        }

        // Chat censor step: only a string `message` field is chat text.
        let mut report = None;
        let chat_text = match object.get("message") {
            Some(Value::String(text)) => Some(text.clone()),
            _ => None,
        };
        if let Some(text) = chat_text {
            if self.filter.is_profane(&text) {
                let sender_id = object
                    .get("user")
                    .and_then(Value::as_str)
                    .map_or_else(|| sender.to_string(), str::to_string);
                report = Some(ReportedMessage {
                    content: text.clone(),
                    sender_id,
                });
                object.insert(
                    "message".to_string(),
                    Value::String(self.filter.censor(&text)),
                );
            }
        }

        let json = serde_json::to_string(&Value::Object(object)).map_err(RouteError::Serialize)?;
        Ok(Routed {
            wire: frames::encode_payload(&json),
            report,
        })
    }
}
