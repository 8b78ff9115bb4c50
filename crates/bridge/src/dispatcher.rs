//! Inbound message dispatch.
//!
//! A type-keyed subscriber registry: callbacks register against a message
//! type and are invoked synchronously, in registration order, for each
//! inbound message of that type. Unknown types are expected traffic from a
//! forward-compatible remote peer and are ignored.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use unibridge_protocol::Message;

/// Callback invoked for each inbound message of a registered type.
pub type MessageCallback = Box<dyn FnMut(&Message) + Send>;

/// Identifies one registration, for targeted removal via `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct DispatchState {
    handlers: HashMap<String, Vec<(HandlerId, MessageCallback)>>,
    next_id: u64,
    pumps: Vec<JoinHandle<()>>,
    disposed: bool,
}

/// Type-keyed registry of inbound message handlers.
#[derive(Clone)]
pub struct InboundDispatcher {
    state: Arc<Mutex<DispatchState>>,
}

impl InboundDispatcher {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DispatchState {
                handlers: HashMap::new(),
                next_id: 0,
                pumps: Vec::new(),
                disposed: false,
            })),
        }
    }

    /// Register a callback for a message type. Multiple callbacks per type
    /// run in registration order.
    pub async fn on(
        &self,
        message_type: impl Into<String>,
        callback: impl FnMut(&Message) + Send + 'static,
    ) -> HandlerId {
        let mut state = self.state.lock().await;
        let id = HandlerId(state.next_id);
        state.next_id += 1;
        if state.disposed {
            return id;
        }
        state
            .handlers
            .entry(message_type.into())
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    /// Remove one callback for a message type.
    pub async fn off(&self, message_type: &str, id: HandlerId) {
        let mut state = self.state.lock().await;
        if let Some(callbacks) = state.handlers.get_mut(message_type) {
            callbacks.retain(|(registered, _)| *registered != id);
            if callbacks.is_empty() {
                state.handlers.remove(message_type);
            }
        }
    }

    /// Remove every callback for a message type.
    pub async fn off_all(&self, message_type: &str) {
        self.state.lock().await.handlers.remove(message_type);
    }

    /// Invoke all callbacks registered for the message's type. Messages
    /// with no registered type are ignored.
    pub async fn handle(&self, message: &Message) {
        let mut state = self.state.lock().await;
        if state.disposed {
            return;
        }
        match state.handlers.get_mut(&message.message_type) {
            Some(callbacks) => {
                for (_, callback) in callbacks.iter_mut() {
                    callback(message);
                }
            }
            None => {
                tracing::trace!(
                    message_type = %message.message_type,
                    "no handler for inbound message type"
                );
            }
        }
    }

    /// Pump an inbound channel through `handle` until the channel closes.
    /// The pump is tracked and cancelled on dispose.
    pub async fn listen_to(&self, mut source: mpsc::Receiver<Message>) {
        let this = self.clone();
        let pump = tokio::spawn(async move {
            while let Some(message) = source.recv().await {
                this.handle(&message).await;
            }
        });
        let mut state = self.state.lock().await;
        if state.disposed {
            pump.abort();
            return;
        }
        state.pumps.push(pump);
    }

    pub async fn handler_count(&self, message_type: &str) -> usize {
        self.state
            .lock()
            .await
            .handlers
            .get(message_type)
            .map_or(0, Vec::len)
    }

    /// Drop all handlers and cancel tracked channel pumps.
    pub async fn dispose(&self) {
        let mut state = self.state.lock().await;
        state.disposed = true;
        state.handlers.clear();
        for pump in state.pumps.drain(..) {
            pump.abort();
        }
    }
}

impl Default for InboundDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
