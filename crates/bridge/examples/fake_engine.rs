//! Drives the bridge against an in-process fake engine: initialize, queue
//! sends before readiness, deliver the created signal, then exchange a few
//! messages.
//!
//! Run with `cargo run --example fake_engine`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use unibridge::{
    BridgeConfig, EngineBridge, EngineTransport, Message, Payload, RawNotification, ThrottleConfig,
    TransportError,
};

/// Fake engine: logs every platform call and echoes created/message
/// notifications back through the native channel.
struct FakeEngine {
    notifications: mpsc::Sender<RawNotification>,
}

#[async_trait]
impl EngineTransport for FakeEngine {
    async fn initialize(&self) -> Result<(), TransportError> {
        tracing::info!("fake engine: creating view");
        let notifications = self.notifications.clone();
        tokio::spawn(async move {
            // Readiness arrives out-of-band, after an unpredictable delay
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = notifications
                .send(RawNotification {
                    event: "onUnityCreated".to_string(),
                    data: None,
                })
                .await;
        });
        Ok(())
    }

    async fn post_message(
        &self,
        target_id: &str,
        method_name: &str,
        wire: &str,
    ) -> Result<(), TransportError> {
        tracing::info!(%target_id, %method_name, %wire, "fake engine received");
        Ok(())
    }

    async fn pause(&self) -> Result<(), TransportError> {
        tracing::info!("fake engine: paused");
        Ok(())
    }

    async fn resume(&self) -> Result<(), TransportError> {
        tracing::info!("fake engine: resumed");
        Ok(())
    }

    async fn unload(&self) -> Result<(), TransportError> {
        tracing::info!("fake engine: unloaded");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,unibridge=debug")),
        )
        .init();

    let (notify_tx, notify_rx) = mpsc::channel(32);
    let bridge = EngineBridge::new(
        Arc::new(FakeEngine {
            notifications: notify_tx,
        }),
        BridgeConfig::default().with_throttle(ThrottleConfig::default()),
    );
    bridge.attach_notifications(notify_rx).await?;

    let mut events = bridge.subscribe_events().await?;
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(kind = ?event.kind, "engine event");
        }
    });

    bridge.initialize().await?;

    // Queued until the created signal arrives, then drained in order
    bridge
        .send_when_ready(Message::new("LoadLevel").with_payload(Payload::new().with("level", 1)))
        .await?;
    bridge
        .send_when_ready(Message::new("SpawnPlayer").with_payload(Payload::new().with("name", "P1")))
        .await?;

    tokio::time::sleep(Duration::from_millis(300)).await;
    tracing::info!(ready = bridge.is_ready().await, "bridge ready");

    // Burst of per-frame updates; the throttler keeps the first and latest
    for x in 0..20 {
        bridge
            .send(
                Message::new("Move")
                    .with_target("Player")
                    .with_method("SetPosition")
                    .with_payload(Payload::new().with("x", x)),
            )
            .await?;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    bridge.unload().await?;
    bridge.dispose().await;
    Ok(())
}
