//! Transport port to the native platform layer.
//!
//! The bridge never talks to the platform directly - hosts implement this
//! trait over whatever channel actually reaches the embedded engine (a
//! platform channel, an IPC pipe, an in-process binding). Tests mock it.

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level failures reported by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The channel to the engine process is gone.
    #[error("platform channel closed")]
    Closed,

    /// The platform call itself failed.
    #[error("platform call failed: {0}")]
    Platform(String),
}

/// Platform calls the bridge issues toward the embedded engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineTransport: Send + Sync {
    /// Kick off native engine creation. Readiness is signaled later by an
    /// asynchronous created notification, not by this call returning.
    async fn initialize(&self) -> Result<(), TransportError>;

    /// Post one wire-serialized message to a remote object method.
    async fn post_message(
        &self,
        target_id: &str,
        method_name: &str,
        wire: &str,
    ) -> Result<(), TransportError>;

    async fn pause(&self) -> Result<(), TransportError>;

    async fn resume(&self) -> Result<(), TransportError>;

    async fn unload(&self) -> Result<(), TransportError>;
}
