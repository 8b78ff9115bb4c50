//! Per-key coalescing batch stage.
//!
//! Reduces native-boundary call volume when the host emits many logically
//! overwritable updates per rendering frame (continuous position updates and
//! the like). Within one open window, the latest message per coalescing key
//! wins; the window closes on a timer or when the pending map hits the size
//! threshold.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use unibridge_protocol::Message;

use crate::config::BatchConfig;

/// Receives each flushed batch exactly once. The batcher never retries a
/// batch; delivery failures are the callback's concern.
pub type FlushCallback = Box<dyn Fn(Vec<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Introspection counters for the batch stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatcherStats {
    /// Messages accepted by `add`.
    pub total_added: u64,
    /// Messages actually handed to the flush callback.
    pub total_flushed: u64,
    /// Flush operations performed.
    pub flush_count: u64,
}

impl BatcherStats {
    pub fn average_batch_size(&self) -> f64 {
        if self.flush_count == 0 {
            0.0
        } else {
            self.total_flushed as f64 / self.flush_count as f64
        }
    }
}

struct BatchState {
    pending: HashMap<String, Message>,
    timer: Option<JoinHandle<()>>,
    stats: BatcherStats,
    disposed: bool,
}

struct BatcherInner {
    config: BatchConfig,
    on_flush: FlushCallback,
    state: Mutex<BatchState>,
}

/// Time/size-windowed accumulator with last-write-wins key coalescing.
///
/// Batches are handed to the flush callback in pending-map iteration order,
/// not arrival order - callers must not rely on arrival order surviving
/// batching.
#[derive(Clone)]
pub struct MessageBatcher {
    inner: Arc<BatcherInner>,
}

impl MessageBatcher {
    pub fn new(config: BatchConfig, on_flush: FlushCallback) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                config,
                on_flush,
                state: Mutex::new(BatchState {
                    pending: HashMap::new(),
                    timer: None,
                    stats: BatcherStats::default(),
                    disposed: false,
                }),
            }),
        }
    }

    /// Admit a message. Overwrites any pending message with the same
    /// coalescing key - intentional data loss for superseded intents.
    pub async fn add(&self, message: Message) {
        let flush_now = {
            let mut state = self.inner.state.lock().await;
            if state.disposed {
                return;
            }
            state.stats.total_added += 1;
            let key = message.coalesce_key();
            if state.pending.insert(key, message).is_some() {
                tracing::trace!("coalesced pending message");
            }
            if state.pending.len() >= self.inner.config.max_batch_size {
                true
            } else {
                if state.timer.is_none() {
                    state.timer = Some(self.spawn_window_timer());
                }
                false
            }
        };
        if flush_now {
            self.flush().await;
        }
    }

    /// Close the current window: cancel the timer, snapshot and clear the
    /// pending map, and hand the snapshot to the flush callback.
    pub async fn flush(&self) {
        let batch: Vec<Message> = {
            let mut state = self.inner.state.lock().await;
            if state.disposed {
                return;
            }
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            if state.pending.is_empty() {
                return;
            }
            let batch: Vec<Message> = state.pending.drain().map(|(_, m)| m).collect();
            state.stats.total_flushed += batch.len() as u64;
            state.stats.flush_count += 1;
            batch
        };
        tracing::trace!(batch_size = batch.len(), "flushing batch");
        (self.inner.on_flush)(batch).await;
    }

    pub async fn stats(&self) -> BatcherStats {
        self.inner.state.lock().await.stats
    }

    pub async fn pending_len(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    /// Cancel the window timer, drop pending state, and turn `add` into a
    /// no-op.
    pub async fn dispose(&self) {
        let mut state = self.inner.state.lock().await;
        state.disposed = true;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending.clear();
    }

    fn spawn_window_timer(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.inner.config.flush_interval).await;
            // Clear our own handle first so flush() does not abort the task
            // that is about to run the flush
            this.inner.state.lock().await.timer = None;
            this.flush().await;
        })
    }
}
