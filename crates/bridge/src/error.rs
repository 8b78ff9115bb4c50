//! Bridge error taxonomy.
//!
//! Four failure classes with distinct recovery characteristics:
//! - [`LifecycleError`]: illegal state transition (programmer error)
//! - [`BridgeError::EngineNotReady`]: strict-mode send before ready
//!   (recoverable - queue the send or retry later)
//! - [`BridgeError::Communication`]: transport-level failure, wraps the
//!   underlying cause with target/method context
//! - [`BridgeError::Disposed`]: use of a disposed bridge (programmer error)

use thiserror::Error;

use crate::lifecycle::LifecycleState;
use crate::transport::TransportError;

/// An illegal lifecycle transition was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal lifecycle transition: {from:?} -> {attempted:?}")]
pub struct LifecycleError {
    pub from: LifecycleState,
    pub attempted: LifecycleState,
}

/// Unified error for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Illegal lifecycle transition.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Strict-mode send attempted before the engine signaled readiness.
    #[error("engine is not ready to receive messages")]
    EngineNotReady,

    /// The transport rejected a platform call.
    #[error("platform call '{method_name}' on '{target_id}' failed")]
    Communication {
        target_id: String,
        method_name: String,
        #[source]
        source: TransportError,
    },

    /// Outbound message could not be serialized to the wire format.
    #[error("failed to serialize outbound message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The bridge has been disposed; no further use is possible.
    #[error("bridge has been disposed")]
    Disposed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_error_display() {
        let err = LifecycleError {
            from: LifecycleState::Disposed,
            attempted: LifecycleState::Ready,
        };
        assert_eq!(
            err.to_string(),
            "illegal lifecycle transition: Disposed -> Ready"
        );
    }

    #[test]
    fn test_communication_error_carries_context() {
        let err = BridgeError::Communication {
            target_id: "Player".to_string(),
            method_name: "SetPosition".to_string(),
            source: TransportError::Closed,
        };
        let text = err.to_string();
        assert!(text.contains("SetPosition"));
        assert!(text.contains("Player"));
    }
}
