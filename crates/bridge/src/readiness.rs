//! Readiness-gated send queue.
//!
//! Bridges the window between "the host wants to talk to the engine" and
//! "the engine signaled it is ready": sends issued early are queued with
//! their send operation and drained in insertion order once readiness
//! flips, which happens at most once per session.

use std::collections::VecDeque;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use unibridge_protocol::Message;

use crate::error::BridgeError;

/// Deferred delivery bound to a message at enqueue time.
pub type SendOperation =
    Box<dyn FnOnce(Message) -> BoxFuture<'static, Result<(), BridgeError>> + Send>;

/// A message paired with the operation that will eventually deliver it.
struct QueuedSend {
    message: Message,
    send_op: SendOperation,
}

struct GuardState {
    ready: bool,
    queue: VecDeque<QueuedSend>,
    disposed: bool,
}

/// FIFO queue of not-yet-sendable messages, bounded by `max_queue_size`.
///
/// Overflow evicts the *oldest* entry: once superseded by newer intent,
/// stale commands are the least useful ones to keep.
pub struct ReadinessGuard {
    max_queue_size: usize,
    state: Mutex<GuardState>,
}

impl ReadinessGuard {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            max_queue_size,
            state: Mutex::new(GuardState {
                ready: false,
                queue: VecDeque::new(),
                disposed: false,
            }),
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.state.lock().await.ready
    }

    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Strict admission: succeed only when ready.
    pub async fn guard_or_fail(&self) -> Result<(), BridgeError> {
        let state = self.state.lock().await;
        if state.disposed {
            return Err(BridgeError::Disposed);
        }
        if state.ready {
            Ok(())
        } else {
            Err(BridgeError::EngineNotReady)
        }
    }

    /// Lenient admission: deliver now if ready, otherwise queue for the
    /// drain. Never fails on readiness grounds.
    pub async fn enqueue_until_ready(
        &self,
        message: Message,
        send_op: SendOperation,
    ) -> Result<(), BridgeError> {
        {
            let mut state = self.state.lock().await;
            if state.disposed {
                return Err(BridgeError::Disposed);
            }
            if !state.ready {
                if state.queue.len() >= self.max_queue_size {
                    if let Some(evicted) = state.queue.pop_front() {
                        tracing::warn!(
                            message_type = %evicted.message.message_type,
                            target_id = %evicted.message.target_id,
                            max_queue_size = self.max_queue_size,
                            "readiness queue full, evicting oldest entry"
                        );
                    }
                }
                state.queue.push_back(QueuedSend { message, send_op });
                return Ok(());
            }
        }
        (send_op)(message).await
    }

    /// Flip to ready and drain the queue strictly in insertion order,
    /// awaiting each send before starting the next. Idempotent: a second
    /// call while already ready does nothing.
    ///
    /// A failed queued send is logged and the drain continues - one bad
    /// message must not poison the rest of the queue. The failure is not
    /// retried or surfaced; the structured log is the delivery-loss signal.
    pub async fn mark_ready(&self) {
        {
            let mut state = self.state.lock().await;
            if state.disposed || state.ready {
                return;
            }
            state.ready = true;
        }
        loop {
            let entry = {
                let mut state = self.state.lock().await;
                state.queue.pop_front()
            };
            let Some(entry) = entry else { break };
            tracing::debug!(
                message_type = %entry.message.message_type,
                "draining queued send"
            );
            let target_id = entry.message.target_id.clone();
            let method_name = entry.message.method_name.clone();
            if let Err(error) = (entry.send_op)(entry.message).await {
                tracing::warn!(
                    %target_id,
                    %method_name,
                    %error,
                    "queued send failed during drain; continuing"
                );
            }
        }
    }

    /// Clear the ready flag and discard queued sends without invoking them.
    /// Used on unload: queued commands targeting a dead session are
    /// discarded, not deferred again.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let discarded = state.queue.len();
        if discarded > 0 {
            tracing::debug!(discarded, "discarding queued sends on reset");
        }
        state.ready = false;
        state.queue.clear();
    }

    /// Discard queued sends and refuse all further admissions.
    pub async fn dispose(&self) {
        let mut state = self.state.lock().await;
        state.disposed = true;
        state.ready = false;
        state.queue.clear();
    }
}
