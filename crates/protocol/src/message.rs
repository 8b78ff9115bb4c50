//! Outbound command messages and their wire serialization.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default remote object that receives messages when no target is given.
pub const DEFAULT_TARGET_ID: &str = "UnityMessageManager";

/// Default remote method invoked when no method name is given.
pub const DEFAULT_METHOD_NAME: &str = "onMessage";

/// Opaque key-value payload attached to a message.
///
/// The bridge never inspects payload contents - payloads are built at the
/// boundary by the host and read schema-on-read by the remote engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(serde_json::Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self(serde_json::Map::new())
    }

    /// Insert a field, returning self for chained construction.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, Value>> for Payload {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map)
    }
}

/// An outbound command for the embedded engine.
///
/// Logical identity is the `(message_type, target_id, method_name)` triple:
/// two messages with the same triple are the same logical message for
/// equality, hashing, and coalescing, even when their payloads differ. The
/// payload carries the intent's data and is intentionally excluded from
/// identity so that a newer payload can supersede an older one in the
/// batching stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_type: String,
    pub payload: Option<Payload>,
    pub target_id: String,
    pub method_name: String,
}

impl Message {
    /// Create a message with the default target and method.
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            payload: None,
            target_id: DEFAULT_TARGET_ID.to_string(),
            method_name: DEFAULT_METHOD_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = target_id.into();
        self
    }

    #[must_use]
    pub fn with_method(mut self, method_name: impl Into<String>) -> Self {
        self.method_name = method_name.into();
        self
    }

    /// Coalescing key used by the batching stage: messages sharing a key
    /// overwrite each other within one batch window.
    pub fn coalesce_key(&self) -> String {
        format!("{}:{}", self.target_id, self.method_name)
    }

    /// Serialize to the outbound wire format: `{"type": ..., "data": {...}}`.
    ///
    /// `data` is omitted entirely when there is no payload, never emitted as
    /// `null`.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&WireMessage {
            message_type: &self.message_type,
            data: self.payload.as_ref(),
        })
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.message_type == other.message_type
            && self.target_id == other.target_id
            && self.method_name == other.method_name
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.message_type.hash(state);
        self.target_id.hash(state);
        self.method_name.hash(state);
    }
}

/// Wire representation sent to the remote engine.
#[derive(Serialize)]
struct WireMessage<'a> {
    #[serde(rename = "type")]
    message_type: &'a str,
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    data: Option<&'a Payload>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let msg = Message::new("Load");
        assert_eq!(msg.target_id, DEFAULT_TARGET_ID);
        assert_eq!(msg.method_name, DEFAULT_METHOD_NAME);
        assert!(msg.payload.is_none());
    }

    #[test]
    fn test_wire_format_omits_absent_data() {
        let msg = Message::new("Pause");
        assert_eq!(msg.to_wire().unwrap(), r#"{"type":"Pause"}"#);
    }

    #[test]
    fn test_wire_format_includes_data() {
        let msg = Message::new("Move").with_payload(Payload::new().with("x", 1).with("y", 2));
        assert_eq!(msg.to_wire().unwrap(), r#"{"type":"Move","data":{"x":1,"y":2}}"#);
    }

    #[test]
    fn test_logical_equality_ignores_payload() {
        let a = Message::new("Move").with_payload(Payload::new().with("x", 1));
        let b = Message::new("Move").with_payload(Payload::new().with("x", 99));
        assert_eq!(a, b);

        let c = Message::new("Move").with_target("Camera");
        assert_ne!(a, c);
    }

    #[test]
    fn test_coalesce_key() {
        let msg = Message::new("Move").with_target("Player").with_method("SetPosition");
        assert_eq!(msg.coalesce_key(), "Player:SetPosition");
    }
}
