//! Native platform notifications and schema-on-read inbound parsing.
//!
//! The native side delivers flat `{event, data}` records. This module
//! translates them into typed notifications at the boundary so that nothing
//! downstream handles untyped JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::event::SceneInfo;
use crate::message::{Message, Payload};

/// Message type assigned to inbound traffic that carries no recognizable
/// `type` field. The original text is preserved under `payload["text"]`.
pub const RAW_MESSAGE_TYPE: &str = "raw";

/// Errors translating a raw native record into a typed notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("unrecognized platform event: {0}")]
    UnknownEvent(String),

    #[error("malformed scene payload: {0}")]
    MalformedScene(#[source] serde_json::Error),
}

/// A native platform event exactly as it crosses the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNotification {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A typed native notification after boundary translation.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformNotification {
    /// The engine view was created; the engine can now receive messages
    Created,
    /// The engine sent a message to the host
    Message(Value),
    /// A scene finished loading
    SceneLoaded(SceneInfo),
    /// The engine was unloaded on the native side
    Unloaded,
    /// The native side reported an error (advisory only)
    Error(String),
}

impl PlatformNotification {
    /// Translate a raw native record into a typed notification.
    pub fn from_raw(raw: RawNotification) -> Result<Self, NotificationError> {
        match raw.event.as_str() {
            "onUnityCreated" => Ok(Self::Created),
            "onUnityMessage" => Ok(Self::Message(raw.data.unwrap_or(Value::Null))),
            "onUnitySceneLoaded" => {
                let data = raw.data.unwrap_or(Value::Null);
                let scene =
                    serde_json::from_value(data).map_err(NotificationError::MalformedScene)?;
                Ok(Self::SceneLoaded(scene))
            }
            "onUnityUnloaded" => Ok(Self::Unloaded),
            "onError" => Ok(Self::Error(coerce_text(raw.data.as_ref()))),
            other => Err(NotificationError::UnknownEvent(other.to_string())),
        }
    }
}

/// Parse an inbound `onUnityMessage` payload into a [`Message`].
///
/// Accepted shapes, tried in order:
/// 1. a JSON string whose contents parse to an object with a `type` field
/// 2. a structural object with a `type` field and optional `data` object
/// 3. anything else, coerced to a message of type [`RAW_MESSAGE_TYPE`] with
///    the original text under `payload["text"]`
pub fn parse_inbound_message(data: &Value) -> Message {
    if let Value::String(text) = data {
        if let Ok(inner) = serde_json::from_str::<Value>(text) {
            if let Some(msg) = parse_structural(&inner) {
                return msg;
            }
        }
        return raw_message(text.clone());
    }
    if let Some(msg) = parse_structural(data) {
        return msg;
    }
    raw_message(coerce_text(Some(data)))
}

fn parse_structural(value: &Value) -> Option<Message> {
    let obj = value.as_object()?;
    let message_type = obj.get("type")?.as_str()?;
    let payload = match obj.get("data") {
        Some(Value::Object(map)) => Some(Payload::from(map.clone())),
        // Non-object data still travels, under a single field
        Some(other) if !other.is_null() => Some(Payload::new().with("data", other.clone())),
        _ => None,
    };
    let mut msg = Message::new(message_type);
    msg.payload = payload;
    Some(msg)
}

fn raw_message(text: String) -> Message {
    Message::new(RAW_MESSAGE_TYPE).with_payload(Payload::new().with("text", text))
}

fn coerce_text(data: Option<&Value>) -> String {
    match data {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
