//! Rate-limiting admission stage.
//!
//! Bounds the rate of outbound sends regardless of batching. The first send
//! opens a throttle window and goes through immediately; what happens to
//! messages arriving while the window is open depends on the policy. If a
//! policy kept a message pending, the window close flushes it and reopens
//! the window.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use unibridge_protocol::Message;

use crate::config::ThrottleConfig;

/// Receives each accepted message. Failures are the callback's concern;
/// the throttler makes at most one delivery attempt per accepted message.
pub type ForwardCallback = Box<dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// What to do with a message that arrives while the throttle window is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThrottlePolicy {
    /// Discard anything arriving during the window.
    Drop,
    /// The most recent arrival replaces any previously pending message.
    #[default]
    KeepLatest,
    /// The first arrival during the window is kept; later ones are dropped.
    KeepFirst,
}

/// Introspection counters for the throttle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThrottlerStats {
    /// Every send attempt, accepted or not.
    pub total_throttled: u64,
    /// Sends actually forwarded.
    pub total_sent: u64,
    /// Sends discarded by the policy.
    pub total_dropped: u64,
}

struct ThrottleState {
    window_open: bool,
    pending: Option<Message>,
    timer: Option<JoinHandle<()>>,
    stats: ThrottlerStats,
    disposed: bool,
}

struct ThrottlerInner {
    config: ThrottleConfig,
    forward: ForwardCallback,
    state: Mutex<ThrottleState>,
}

/// Strategy-driven rate limiter in front of the transport.
#[derive(Clone)]
pub struct MessageThrottler {
    inner: Arc<ThrottlerInner>,
}

impl MessageThrottler {
    pub fn new(config: ThrottleConfig, forward: ForwardCallback) -> Self {
        Self {
            inner: Arc::new(ThrottlerInner {
                config,
                forward,
                state: Mutex::new(ThrottleState {
                    window_open: false,
                    pending: None,
                    timer: None,
                    stats: ThrottlerStats::default(),
                    disposed: false,
                }),
            }),
        }
    }

    /// Admit a send attempt.
    pub async fn send(&self, message: Message) {
        let forward_now = {
            let mut state = self.inner.state.lock().await;
            if state.disposed {
                return;
            }
            state.stats.total_throttled += 1;
            if state.window_open {
                match self.inner.config.policy {
                    ThrottlePolicy::Drop => {
                        state.stats.total_dropped += 1;
                    }
                    ThrottlePolicy::KeepLatest => {
                        if state.pending.replace(message).is_some() {
                            state.stats.total_dropped += 1;
                        }
                    }
                    ThrottlePolicy::KeepFirst => {
                        if state.pending.is_none() {
                            state.pending = Some(message);
                        } else {
                            state.stats.total_dropped += 1;
                        }
                    }
                }
                None
            } else {
                state.window_open = true;
                state.stats.total_sent += 1;
                state.timer = Some(self.spawn_window_timer());
                Some(message)
            }
        };
        if let Some(message) = forward_now {
            (self.inner.forward)(message).await;
        }
    }

    pub async fn stats(&self) -> ThrottlerStats {
        self.inner.state.lock().await.stats
    }

    /// Cancel the window timer and discard any pending message unsent.
    pub async fn dispose(&self) {
        let mut state = self.inner.state.lock().await;
        state.disposed = true;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending = None;
        state.window_open = false;
    }

    fn spawn_window_timer(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.inner.config.window).await;
            this.on_window_elapsed().await;
        })
    }

    /// Window close: flush a pending message and reopen, or fall idle.
    async fn on_window_elapsed(&self) {
        let flush = {
            let mut state = self.inner.state.lock().await;
            if state.disposed {
                return;
            }
            state.timer = None;
            match state.pending.take() {
                Some(message) => {
                    state.stats.total_sent += 1;
                    state.timer = Some(self.spawn_window_timer());
                    Some(message)
                }
                None => {
                    state.window_open = false;
                    None
                }
            }
        };
        if let Some(message) = flush {
            (self.inner.forward)(message).await;
        }
    }
}
