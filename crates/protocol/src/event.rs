//! Typed events describing what the embedded engine reported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of engine event occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEventKind {
    /// The engine signaled it is created and ready to receive messages
    Created,
    /// Engine content finished loading
    Loaded,
    /// The engine was paused
    Paused,
    /// The engine was resumed
    Resumed,
    /// The engine was unloaded (session ended, process may survive)
    Unloaded,
    /// The engine was destroyed (bridge disposed)
    Destroyed,
    /// The engine reported an error
    Error,
    /// A generic message arrived from the engine
    Message,
    /// A scene finished loading inside the engine
    SceneLoaded,
}

/// An inbound notification from the engine, or one derived from a lifecycle
/// transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub kind: EngineEventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineEvent {
    /// Create an event stamped with the current time.
    pub fn now(kind: EngineEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            text: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Details of a scene the engine finished loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneInfo {
    pub name: String,
    pub build_index: i32,
    pub is_loaded: bool,
    pub is_valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = EngineEvent::now(EngineEventKind::Error).with_error("boom");
        assert_eq!(event.kind, EngineEventKind::Error);
        assert_eq!(event.error.as_deref(), Some("boom"));
        assert!(event.text.is_none());
    }

    #[test]
    fn test_scene_info_wire_names() {
        let scene: SceneInfo = serde_json::from_str(
            r#"{"name":"Main","buildIndex":0,"isLoaded":true,"isValid":true}"#,
        )
        .unwrap();
        assert_eq!(scene.name, "Main");
        assert_eq!(scene.build_index, 0);
        assert!(scene.is_loaded);
    }
}
