//! Unibridge - typed, asynchronous messaging with an embedded engine whose
//! readiness is discovered out-of-band.
//!
//! The bridge protects the engine from host-side bursts (gesture callbacks,
//! per-frame updates, network callbacks) with two independent admission
//! stages, and guarantees in-process ordering plus at-least-once intent. It
//! does not persist queued messages across restarts and does not provide
//! exactly-once delivery to the remote engine.
//!
//! # Architecture
//!
//! - [`lifecycle::LifecycleMachine`]: six-state engine-readiness model with
//!   an explicit transition table
//! - [`readiness::ReadinessGuard`]: FIFO queue of not-yet-sendable messages,
//!   drained in order when the engine signals creation
//! - [`batcher::MessageBatcher`]: per-key coalescing flushed on a timer or
//!   size threshold
//! - [`throttler::MessageThrottler`]: rate limiter with three drop policies
//! - [`dispatcher::InboundDispatcher`]: type-keyed subscriber registry
//! - [`facade::EngineBridge`]: the orchestrating facade external
//!   collaborators talk to
//!
//! Hosts implement [`transport::EngineTransport`] over whatever channel
//! actually reaches the engine process.

pub mod batcher;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod facade;
pub mod lifecycle;
pub mod readiness;
pub mod throttler;
pub mod transport;

pub use batcher::{BatcherStats, MessageBatcher};
pub use config::{BatchConfig, BridgeConfig, ThrottleConfig};
pub use dispatcher::{HandlerId, InboundDispatcher};
pub use error::{BridgeError, LifecycleError};
pub use facade::{EngineBridge, HostLifecycleEvent};
pub use lifecycle::{LifecycleMachine, LifecycleState};
pub use readiness::ReadinessGuard;
pub use throttler::{MessageThrottler, ThrottlePolicy, ThrottlerStats};
pub use transport::{EngineTransport, TransportError};

// Re-export the wire types hosts need at the boundary
pub use unibridge_protocol::{
    EngineEvent, EngineEventKind, Message, Payload, PlatformNotification, RawNotification,
    SceneInfo,
};
