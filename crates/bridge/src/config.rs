//! Bridge configuration.
//!
//! Plain value types with defaults; the host owns config sources (files,
//! env, flags) and builds one of these.

use std::time::Duration;

use crate::throttler::ThrottlePolicy;

/// Configuration for one bridge session.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bound on the readiness queue; overflow evicts the oldest entry.
    pub max_queue_size: usize,
    /// Enable the per-key coalescing batch stage.
    pub batch: Option<BatchConfig>,
    /// Enable the rate-throttling stage on the outbound funnel.
    pub throttle: Option<ThrottleConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            batch: None,
            throttle: None,
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    #[must_use]
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = Some(batch);
        self
    }

    #[must_use]
    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = Some(throttle);
        self
    }
}

/// Settings for the per-key coalescing batcher.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Pending-map size that triggers an immediate flush.
    pub max_batch_size: usize,
    /// Window before a timer-driven flush; one frame at 60 Hz by default.
    pub flush_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            flush_interval: Duration::from_millis(16),
        }
    }
}

/// Settings for the rate throttler.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Span during which further sends are suppressed or coalesced.
    pub window: Duration,
    /// What happens to messages arriving while the window is open.
    pub policy: ThrottlePolicy,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(100),
            policy: ThrottlePolicy::KeepLatest,
        }
    }
}
