//! Engine lifecycle state machine.
//!
//! Six states with an explicit transition table. Exactly one machine exists
//! per bridge session; other components never hold the state cell - they
//! observe it through the two broadcast channels or the facade's queries.

use tokio::sync::broadcast;
use unibridge_protocol::{EngineEvent, EngineEventKind};

use crate::error::LifecycleError;

const CHANNEL_CAPACITY: usize = 32;

/// Engine readiness states.
///
/// `Uninitialized` is initial; `Disposed` is terminal with no outgoing
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No engine session exists yet
    Uninitialized,
    /// Native creation was requested; waiting for the created signal
    Initializing,
    /// The engine signaled readiness; messages flow
    Ready,
    /// The engine is paused
    Paused,
    /// The engine resumed after a pause
    Resumed,
    /// The session is over; no further transitions
    Disposed,
}

impl LifecycleState {
    /// Whether the transition table allows moving to `target`.
    pub fn can_transition_to(self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, target),
            (Uninitialized, Initializing)
                | (Initializing, Ready | Disposed)
                | (Ready, Paused | Disposed)
                | (Paused, Resumed | Disposed)
                | (Resumed, Paused | Disposed)
        )
    }

    /// Whether the engine is accepting work in this state.
    pub fn is_active(self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Resumed)
    }

    /// Engine event announced when this state is entered, if any.
    fn derived_event(self) -> Option<EngineEventKind> {
        match self {
            LifecycleState::Ready => Some(EngineEventKind::Created),
            LifecycleState::Paused => Some(EngineEventKind::Paused),
            LifecycleState::Resumed => Some(EngineEventKind::Resumed),
            LifecycleState::Disposed => Some(EngineEventKind::Destroyed),
            LifecycleState::Uninitialized | LifecycleState::Initializing => None,
        }
    }
}

/// Owns the single lifecycle state cell for a bridge session.
///
/// Successful transitions publish the new state and a derived
/// [`EngineEvent`] on two independent broadcast channels. Disposal closes
/// both channels; a disposed machine ignores further publishes rather than
/// resurrecting them.
pub struct LifecycleMachine {
    state: LifecycleState,
    state_tx: Option<broadcast::Sender<LifecycleState>>,
    event_tx: Option<broadcast::Sender<EngineEvent>>,
}

impl LifecycleMachine {
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: LifecycleState::Uninitialized,
            state_tx: Some(state_tx),
            event_tx: Some(event_tx),
        }
    }

    pub fn current(&self) -> LifecycleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Subscribe to raw state transitions. `None` once disposed.
    pub fn subscribe_states(&self) -> Option<broadcast::Receiver<LifecycleState>> {
        self.state_tx.as_ref().map(broadcast::Sender::subscribe)
    }

    /// Subscribe to lifecycle-derived engine events. `None` once disposed.
    pub fn subscribe_events(&self) -> Option<broadcast::Receiver<EngineEvent>> {
        self.event_tx.as_ref().map(broadcast::Sender::subscribe)
    }

    /// Move to `target` if the transition table allows it, publishing the
    /// new state and its derived event.
    pub fn transition(&mut self, target: LifecycleState) -> Result<(), LifecycleError> {
        if !self.state.can_transition_to(target) {
            return Err(LifecycleError {
                from: self.state,
                attempted: target,
            });
        }
        tracing::debug!(from = ?self.state, to = ?target, "lifecycle transition");
        self.state = target;
        if let Some(tx) = &self.state_tx {
            let _ = tx.send(target);
        }
        if let Some(kind) = target.derived_event() {
            self.publish(EngineEvent::now(kind));
        }
        Ok(())
    }

    /// Publish an engine event on the event channel. No-op once disposed.
    pub fn publish(&self, event: EngineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Force the state back to `Uninitialized` without validation, for
    /// reuse after an unload. Observers see the state change; no derived
    /// event is emitted.
    pub fn reset(&mut self) {
        tracing::debug!(from = ?self.state, "lifecycle reset");
        self.state = LifecycleState::Uninitialized;
        if let Some(tx) = &self.state_tx {
            let _ = tx.send(self.state);
        }
    }

    /// Close both channels. Further transitions fail from the table;
    /// publishes become no-ops.
    pub fn dispose(&mut self) {
        self.state_tx = None;
        self.event_tx = None;
    }
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}
