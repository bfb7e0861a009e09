//! Chat message schema.
//!
//! Inbound frames are validated into [`InboundMessage`]. Anything that does
//! not match a known shape becomes a [`Rejection`]; rejections are dropped by
//! the connection manager and never reach the presentation layer, so newer
//! servers can add message types without breaking older clients.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Messages sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Login request.
    Login { username: String },
    /// Chat line for the room.
    Message { text: String },
}

/// Server answer to a login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginAck {
    Accepted,
    Rejected { reason: String },
}

/// Messages received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Login(LoginAck),
    Chat { sender: String, text: String },
    UserJoined { username: String },
    UserLeft { username: String },
}

/// Why a frame was dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("payload is not valid JSON")]
    InvalidJson,

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing or non-string `type` field")]
    MissingType,

    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("`{0}` message has missing or mistyped fields")]
    InvalidFields(&'static str),
}

#[derive(Deserialize)]
struct LoginAckPayload {
    success: bool,
    /// Only read when `success` is false.
    #[serde(default)]
    reason: Option<Value>,
}

#[derive(Deserialize)]
struct ChatPayload {
    sender: String,
    text: String,
}

#[derive(Deserialize)]
struct PresencePayload {
    username: String,
}

/// Validate a frame payload into a typed message.
///
/// The `type` tag is matched case-insensitively. Extra fields are ignored.
pub fn parse(payload: &[u8]) -> Result<InboundMessage, Rejection> {
    let value: Value = serde_json::from_slice(payload).map_err(|_| Rejection::InvalidJson)?;
    let Value::Object(mut object) = value else {
        return Err(Rejection::NotAnObject);
    };

    let kind = match object.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => return Err(Rejection::MissingType),
    };

    if kind.eq_ignore_ascii_case("login") {
        let ack: LoginAckPayload = fields(object, "login")?;
        match (ack.success, ack.reason) {
            (true, _) => Ok(InboundMessage::Login(LoginAck::Accepted)),
            (false, Some(Value::String(reason))) => {
                Ok(InboundMessage::Login(LoginAck::Rejected { reason }))
            }
            (false, _) => Err(Rejection::InvalidFields("login")),
        }
    } else if kind.eq_ignore_ascii_case("message") {
        let ChatPayload { sender, text } = fields(object, "message")?;
        Ok(InboundMessage::Chat { sender, text })
    } else if kind.eq_ignore_ascii_case("newuser") {
        let PresencePayload { username } = fields(object, "newuser")?;
        Ok(InboundMessage::UserJoined { username })
    } else if kind.eq_ignore_ascii_case("userdisconnected") {
        let PresencePayload { username } = fields(object, "userdisconnected")?;
        Ok(InboundMessage::UserLeft { username })
    } else {
        Err(Rejection::UnknownType(kind))
    }
}

/// Deserialize the variant-specific fields of an already tagged object.
fn fields<T: DeserializeOwned>(
    object: Map<String, Value>,
    kind: &'static str,
) -> Result<T, Rejection> {
    serde_json::from_value(Value::Object(object)).map_err(|_| Rejection::InvalidFields(kind))
}
