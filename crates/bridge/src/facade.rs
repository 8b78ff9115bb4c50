//! Bridge facade - the one component external collaborators talk to.
//!
//! Composes the lifecycle machine, readiness guard, batcher, throttler, and
//! inbound dispatcher, and translates raw platform notifications into typed
//! events and messages. Outbound sends funnel through a single post step:
//! through the throttler when one is configured, otherwise straight to the
//! transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use unibridge_protocol::{
    parse_inbound_message, EngineEvent, EngineEventKind, Message, PlatformNotification,
    RawNotification, SceneInfo,
};

use crate::batcher::MessageBatcher;
use crate::config::BridgeConfig;
use crate::dispatcher::{HandlerId, InboundDispatcher};
use crate::error::BridgeError;
use crate::lifecycle::{LifecycleMachine, LifecycleState};
use crate::readiness::{ReadinessGuard, SendOperation};
use crate::throttler::MessageThrottler;
use crate::transport::{EngineTransport, TransportError};

const CHANNEL_CAPACITY: usize = 64;

/// Host-application lifecycle signals the bridge reacts to.
///
/// The host registers a channel of these instead of wiring pause/resume
/// through inheritance; the bridge calls `pause()`/`resume()` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLifecycleEvent {
    /// Host went to background; the engine should pause
    Suspended,
    /// Host returned to foreground; the engine should resume
    Resumed,
}

struct BridgeInner {
    transport: Arc<dyn EngineTransport>,
    lifecycle: Mutex<LifecycleMachine>,
    guard: ReadinessGuard,
    dispatcher: InboundDispatcher,
    throttler: Option<MessageThrottler>,
    batcher: Option<MessageBatcher>,
    messages_tx: StdMutex<Option<broadcast::Sender<Message>>>,
    scenes_tx: StdMutex<Option<broadcast::Sender<SceneInfo>>>,
    pumps: Mutex<Vec<JoinHandle<()>>>,
    disposed: AtomicBool,
}

/// Typed, readiness-gated communication facade for one embedded-engine
/// session.
///
/// Cheap to clone; clones share the session. Every public method on a
/// disposed bridge fails with [`BridgeError::Disposed`] (queries report the
/// disposed state instead).
#[derive(Clone)]
pub struct EngineBridge {
    inner: Arc<BridgeInner>,
}

impl EngineBridge {
    pub fn new(transport: Arc<dyn EngineTransport>, config: BridgeConfig) -> Self {
        let throttler = config.throttle.clone().map(|cfg| {
            let transport = Arc::clone(&transport);
            MessageThrottler::new(
                cfg,
                Box::new(move |message| {
                    let transport = Arc::clone(&transport);
                    Box::pin(async move {
                        if let Err(error) = post_to_transport(transport.as_ref(), &message).await {
                            tracing::warn!(%error, "throttled send failed");
                        }
                    })
                }),
            )
        });
        let batcher = config.batch.clone().map(|cfg| {
            let transport = Arc::clone(&transport);
            let throttler = throttler.clone();
            MessageBatcher::new(
                cfg,
                Box::new(move |batch| {
                    let transport = Arc::clone(&transport);
                    let throttler = throttler.clone();
                    Box::pin(async move {
                        for message in batch {
                            match &throttler {
                                Some(throttler) => throttler.send(message).await,
                                None => {
                                    if let Err(error) =
                                        post_to_transport(transport.as_ref(), &message).await
                                    {
                                        tracing::warn!(%error, "batched send failed");
                                    }
                                }
                            }
                        }
                    })
                }),
            )
        });
        let (messages_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (scenes_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(BridgeInner {
                transport,
                lifecycle: Mutex::new(LifecycleMachine::new()),
                guard: ReadinessGuard::new(config.max_queue_size),
                dispatcher: InboundDispatcher::new(),
                throttler,
                batcher,
                messages_tx: StdMutex::new(Some(messages_tx)),
                scenes_tx: StdMutex::new(Some(scenes_tx)),
                pumps: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    // Session control
    // =========================================================================

    /// Transition to `Initializing` and trigger native engine creation.
    ///
    /// Readiness is NOT asserted here - it arrives later as a created
    /// notification on the channel given to [`attach_notifications`], fully
    /// asynchronously and with no built-in timeout.
    ///
    /// [`attach_notifications`]: Self::attach_notifications
    pub async fn initialize(&self) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.inner
            .lifecycle
            .lock()
            .await
            .transition(LifecycleState::Initializing)?;
        self.inner
            .transport
            .initialize()
            .await
            .map_err(|source| platform_error("initialize", source))
    }

    /// Pause the engine. The lifecycle transition happens before the
    /// platform call so observers see the state change atomically with the
    /// intent.
    pub async fn pause(&self) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.inner
            .lifecycle
            .lock()
            .await
            .transition(LifecycleState::Paused)?;
        self.inner
            .transport
            .pause()
            .await
            .map_err(|source| platform_error("pause", source))
    }

    /// Resume the engine after a pause.
    pub async fn resume(&self) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.inner
            .lifecycle
            .lock()
            .await
            .transition(LifecycleState::Resumed)?;
        self.inner
            .transport
            .resume()
            .await
            .map_err(|source| platform_error("resume", source))
    }

    /// Unload the engine session. This is the one path that intentionally
    /// discards still-queued outbound messages: the readiness queue and the
    /// lifecycle machine are reset for reuse.
    pub async fn unload(&self) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.inner
            .transport
            .unload()
            .await
            .map_err(|source| platform_error("unload", source))?;
        self.inner.guard.reset().await;
        let mut lifecycle = self.inner.lifecycle.lock().await;
        lifecycle.publish(EngineEvent::now(EngineEventKind::Unloaded));
        lifecycle.reset();
        Ok(())
    }

    /// Dispose the bridge. Idempotent; cancels pumps and timers, discards
    /// queued state without flushing, and closes all broadcast channels.
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("disposing bridge");
        {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            let state = lifecycle.current();
            if state.can_transition_to(LifecycleState::Disposed) {
                // Table-checked above, cannot fail
                let _ = lifecycle.transition(LifecycleState::Disposed);
            }
            lifecycle.dispose();
        }
        for pump in self.inner.pumps.lock().await.drain(..) {
            pump.abort();
        }
        if let Some(batcher) = &self.inner.batcher {
            batcher.dispose().await;
        }
        if let Some(throttler) = &self.inner.throttler {
            throttler.dispose().await;
        }
        self.inner.guard.dispose().await;
        self.inner.dispatcher.dispose().await;
        self.inner.messages_tx.lock().expect("channel lock").take();
        self.inner.scenes_tx.lock().expect("channel lock").take();
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Strict send: fails with [`BridgeError::EngineNotReady`] unless the
    /// engine has signaled readiness.
    pub async fn send(&self, message: Message) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.inner.guard.guard_or_fail().await?;
        self.post(message).await
    }

    /// Lenient send: queued until the engine is ready, never fails on
    /// readiness grounds - only on actual transport failure once dispatched.
    ///
    /// There is no timeout on reaching readiness; if the engine never
    /// signals creation the message stays queued until unload or dispose.
    pub async fn send_when_ready(&self, message: Message) -> Result<(), BridgeError> {
        self.ensure_live()?;
        let transport = Arc::clone(&self.inner.transport);
        let throttler = self.inner.throttler.clone();
        let send_op: SendOperation = Box::new(move |message| {
            Box::pin(async move {
                match &throttler {
                    Some(throttler) => {
                        throttler.send(message).await;
                        Ok(())
                    }
                    None => post_to_transport(transport.as_ref(), &message).await,
                }
            })
        });
        self.inner.guard.enqueue_until_ready(message, send_op).await
    }

    /// Send through the batching stage, coalescing per key within the
    /// window. Strict about readiness like [`send`]. Without batching
    /// configured this is equivalent to [`send`].
    ///
    /// [`send`]: Self::send
    pub async fn send_batched(&self, message: Message) -> Result<(), BridgeError> {
        self.ensure_live()?;
        self.inner.guard.guard_or_fail().await?;
        match &self.inner.batcher {
            Some(batcher) => {
                batcher.add(message).await;
                Ok(())
            }
            None => self.post(message).await,
        }
    }

    /// The single outbound funnel: throttler when configured, otherwise
    /// straight to the transport.
    async fn post(&self, message: Message) -> Result<(), BridgeError> {
        match &self.inner.throttler {
            Some(throttler) => {
                throttler.send(message).await;
                Ok(())
            }
            None => post_to_transport(self.inner.transport.as_ref(), &message).await,
        }
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Pump raw native notifications into the bridge until the channel
    /// closes. The pump is cancelled on dispose. Unrecognized events are
    /// logged and dropped.
    pub async fn attach_notifications(
        &self,
        mut source: mpsc::Receiver<RawNotification>,
    ) -> Result<(), BridgeError> {
        self.ensure_live()?;
        let this = self.clone();
        let pump = tokio::spawn(async move {
            while let Some(raw) = source.recv().await {
                match PlatformNotification::from_raw(raw) {
                    Ok(notification) => this.handle_notification(notification).await,
                    Err(error) => {
                        tracing::warn!(%error, "dropping unrecognized platform notification");
                    }
                }
            }
        });
        self.inner.pumps.lock().await.push(pump);
        Ok(())
    }

    /// Register a channel of host-application lifecycle signals; the bridge
    /// pauses and resumes the engine accordingly. Signals that do not apply
    /// in the current state are logged and ignored.
    pub async fn attach_host_lifecycle(
        &self,
        mut source: mpsc::Receiver<HostLifecycleEvent>,
    ) -> Result<(), BridgeError> {
        self.ensure_live()?;
        let this = self.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = source.recv().await {
                let result = match event {
                    HostLifecycleEvent::Suspended => this.pause().await,
                    HostLifecycleEvent::Resumed => this.resume().await,
                };
                if let Err(error) = result {
                    tracing::debug!(%error, ?event, "host lifecycle signal not applicable");
                }
            }
        });
        self.inner.pumps.lock().await.push(pump);
        Ok(())
    }

    /// Translate one typed platform notification. Safe no-op once disposed,
    /// since notifications may race with disposal.
    pub async fn handle_notification(&self, notification: PlatformNotification) {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        match notification {
            PlatformNotification::Created => self.on_ready().await,
            PlatformNotification::Message(data) => {
                let message = parse_inbound_message(&data);
                self.inner.dispatcher.handle(&message).await;
                if let Some(tx) = self.inner.messages_tx.lock().expect("channel lock").as_ref() {
                    let _ = tx.send(message);
                }
            }
            PlatformNotification::SceneLoaded(scene) => {
                self.inner
                    .lifecycle
                    .lock()
                    .await
                    .publish(
                        EngineEvent::now(EngineEventKind::SceneLoaded)
                            .with_text(scene.name.clone()),
                    );
                if let Some(tx) = self.inner.scenes_tx.lock().expect("channel lock").as_ref() {
                    let _ = tx.send(scene);
                }
            }
            PlatformNotification::Unloaded => {
                self.inner.guard.reset().await;
                let mut lifecycle = self.inner.lifecycle.lock().await;
                lifecycle.publish(EngineEvent::now(EngineEventKind::Unloaded));
                lifecycle.reset();
            }
            PlatformNotification::Error(text) => {
                // Advisory only: native error events cannot be correlated to
                // any particular outstanding send, so none is failed
                tracing::error!(%text, "engine reported an error");
            }
        }
    }

    /// A created signal arrived. Idempotent: a second created notification
    /// while already ready is a no-op, guarding against duplicate delivery
    /// from redundant native listener registrations.
    async fn on_ready(&self) {
        if self.inner.guard.is_ready().await {
            tracing::debug!("duplicate created notification; already ready");
            return;
        }
        {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            if let Err(error) = lifecycle.transition(LifecycleState::Ready) {
                tracing::warn!(%error, "created notification in unexpected state");
                return;
            }
        }
        self.inner.guard.mark_ready().await;
    }

    // =========================================================================
    // Queries & subscriptions
    // =========================================================================

    pub async fn current_state(&self) -> LifecycleState {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return LifecycleState::Disposed;
        }
        self.inner.lifecycle.lock().await.current()
    }

    /// Whether the engine has signaled it is prepared to receive messages.
    ///
    /// A true result observed here can be stale by the time a `send` runs;
    /// prefer [`send_when_ready`] unless synchronous failure is wanted.
    ///
    /// [`send_when_ready`]: Self::send_when_ready
    pub async fn is_ready(&self) -> bool {
        !self.inner.disposed.load(Ordering::SeqCst) && self.inner.guard.is_ready().await
    }

    pub async fn is_active(&self) -> bool {
        !self.inner.disposed.load(Ordering::SeqCst)
            && self.inner.lifecycle.lock().await.is_active()
    }

    /// Inbound messages from the engine.
    pub fn subscribe_messages(&self) -> Result<broadcast::Receiver<Message>, BridgeError> {
        self.inner
            .messages_tx
            .lock()
            .expect("channel lock")
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(BridgeError::Disposed)
    }

    /// Scene-load notifications from the engine.
    pub fn subscribe_scenes(&self) -> Result<broadcast::Receiver<SceneInfo>, BridgeError> {
        self.inner
            .scenes_tx
            .lock()
            .expect("channel lock")
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(BridgeError::Disposed)
    }

    /// Lifecycle-derived engine events.
    pub async fn subscribe_events(&self) -> Result<broadcast::Receiver<EngineEvent>, BridgeError> {
        self.ensure_live()?;
        self.inner
            .lifecycle
            .lock()
            .await
            .subscribe_events()
            .ok_or(BridgeError::Disposed)
    }

    /// Raw lifecycle-state transitions.
    pub async fn subscribe_states(
        &self,
    ) -> Result<broadcast::Receiver<LifecycleState>, BridgeError> {
        self.ensure_live()?;
        self.inner
            .lifecycle
            .lock()
            .await
            .subscribe_states()
            .ok_or(BridgeError::Disposed)
    }

    /// Register an inbound handler for one message type.
    pub async fn on_message(
        &self,
        message_type: impl Into<String>,
        callback: impl FnMut(&Message) + Send + 'static,
    ) -> Result<HandlerId, BridgeError> {
        self.ensure_live()?;
        Ok(self.inner.dispatcher.on(message_type, callback).await)
    }

    /// Remove one previously registered inbound handler.
    pub async fn off_message(&self, message_type: &str, id: HandlerId) {
        self.inner.dispatcher.off(message_type, id).await;
    }

    /// Remove every inbound handler for a message type.
    pub async fn off_all_messages(&self, message_type: &str) {
        self.inner.dispatcher.off_all(message_type).await;
    }

    pub fn batcher(&self) -> Option<&MessageBatcher> {
        self.inner.batcher.as_ref()
    }

    pub fn throttler(&self) -> Option<&MessageThrottler> {
        self.inner.throttler.as_ref()
    }

    fn ensure_live(&self) -> Result<(), BridgeError> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            Err(BridgeError::Disposed)
        } else {
            Ok(())
        }
    }
}

/// Wire-serialize and post one message, wrapping transport failures with
/// target/method context.
async fn post_to_transport(
    transport: &dyn EngineTransport,
    message: &Message,
) -> Result<(), BridgeError> {
    let wire = message.to_wire()?;
    transport
        .post_message(&message.target_id, &message.method_name, &wire)
        .await
        .map_err(|source| BridgeError::Communication {
            target_id: message.target_id.clone(),
            method_name: message.method_name.clone(),
            source,
        })
}

fn platform_error(method_name: &str, source: TransportError) -> BridgeError {
    BridgeError::Communication {
        target_id: "platform".to_string(),
        method_name: method_name.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use unibridge_protocol::Payload;

    use super::*;
    use crate::transport::MockEngineTransport;

    type PostLog = Arc<StdMutex<Vec<(String, String, String)>>>;

    /// Mock transport that accepts every platform call and records posts.
    fn recording_transport(log: &PostLog) -> MockEngineTransport {
        let mut mock = MockEngineTransport::new();
        mock.expect_initialize().returning(|| Ok(()));
        mock.expect_pause().returning(|| Ok(()));
        mock.expect_resume().returning(|| Ok(()));
        mock.expect_unload().returning(|| Ok(()));
        let log = Arc::clone(log);
        mock.expect_post_message()
            .returning(move |target, method, wire| {
                log.lock()
                    .expect("post log")
                    .push((target.to_string(), method.to_string(), wire.to_string()));
                Ok(())
            });
        mock
    }

    fn bridge_with_log(config: BridgeConfig) -> (EngineBridge, PostLog) {
        let log: PostLog = Arc::new(StdMutex::new(Vec::new()));
        let bridge = EngineBridge::new(Arc::new(recording_transport(&log)), config);
        (bridge, log)
    }

    #[tokio::test]
    async fn test_initialize_then_created_reaches_ready() {
        let (bridge, log) = bridge_with_log(BridgeConfig::default());

        bridge.initialize().await.unwrap();
        assert_eq!(bridge.current_state().await, LifecycleState::Initializing);
        assert!(!bridge.is_ready().await);

        // Message enqueued before the engine is ready
        bridge
            .send_when_ready(Message::new("Load").with_payload(Payload::new().with("level", 1)))
            .await
            .unwrap();
        assert!(log.lock().unwrap().is_empty());

        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        assert_eq!(bridge.current_state().await, LifecycleState::Ready);
        assert!(bridge.is_ready().await);
        assert!(bridge.is_active().await);

        let posts = log.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].2, r#"{"type":"Load","data":{"level":1}}"#);
    }

    #[tokio::test]
    async fn test_strict_send_fails_before_ready() {
        let (bridge, _log) = bridge_with_log(BridgeConfig::default());
        bridge.initialize().await.unwrap();

        assert!(matches!(
            bridge.send(Message::new("Jump")).await,
            Err(BridgeError::EngineNotReady)
        ));
    }

    #[tokio::test]
    async fn test_queue_does_not_coalesce() {
        let (bridge, log) = bridge_with_log(BridgeConfig::default());
        bridge.initialize().await.unwrap();

        // Same logical message, different payloads - the queue keeps both
        bridge
            .send_when_ready(
                Message::new("Load")
                    .with_target("X")
                    .with_payload(Payload::new().with("level", 1)),
            )
            .await
            .unwrap();
        bridge
            .send_when_ready(
                Message::new("Load")
                    .with_target("X")
                    .with_payload(Payload::new().with("level", 2)),
            )
            .await
            .unwrap();

        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        let posts = log.lock().unwrap();
        assert_eq!(posts.len(), 2);
        assert!(posts[0].2.contains(r#""level":1"#));
        assert!(posts[1].2.contains(r#""level":2"#));
    }

    #[tokio::test]
    async fn test_duplicate_created_is_noop() {
        let (bridge, log) = bridge_with_log(BridgeConfig::default());
        bridge.initialize().await.unwrap();
        bridge.send_when_ready(Message::new("Once")).await.unwrap();

        bridge
            .handle_notification(PlatformNotification::Created)
            .await;
        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        assert_eq!(bridge.current_state().await, LifecycleState::Ready);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_after_ready_posts_immediately() {
        let (bridge, log) = bridge_with_log(BridgeConfig::default());
        bridge.initialize().await.unwrap();
        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        bridge
            .send(Message::new("Fire").with_target("Turret").with_method("Shoot"))
            .await
            .unwrap();

        let posts = log.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "Turret");
        assert_eq!(posts[0].1, "Shoot");
    }

    #[tokio::test]
    async fn test_communication_error_carries_context() {
        let mut mock = MockEngineTransport::new();
        mock.expect_initialize().returning(|| Ok(()));
        mock.expect_post_message()
            .returning(|_, _, _| Err(TransportError::Platform("engine crashed".to_string())));
        let bridge = EngineBridge::new(Arc::new(mock), BridgeConfig::default());

        bridge.initialize().await.unwrap();
        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        let err = bridge
            .send(Message::new("Fire").with_target("Turret").with_method("Shoot"))
            .await
            .expect_err("transport failure must surface");
        let BridgeError::Communication {
            target_id,
            method_name,
            ..
        } = err
        else {
            panic!("expected Communication error, got {err:?}");
        };
        assert_eq!(target_id, "Turret");
        assert_eq!(method_name, "Shoot");
    }

    #[tokio::test]
    async fn test_pause_resume_transitions_and_forwards() {
        let (bridge, _log) = bridge_with_log(BridgeConfig::default());
        bridge.initialize().await.unwrap();
        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        bridge.pause().await.unwrap();
        assert_eq!(bridge.current_state().await, LifecycleState::Paused);
        assert!(!bridge.is_active().await);

        bridge.resume().await.unwrap();
        assert_eq!(bridge.current_state().await, LifecycleState::Resumed);
        assert!(bridge.is_active().await);
    }

    #[tokio::test]
    async fn test_pause_before_ready_is_lifecycle_error() {
        let (bridge, _log) = bridge_with_log(BridgeConfig::default());
        assert!(matches!(
            bridge.pause().await,
            Err(BridgeError::Lifecycle(_))
        ));
    }

    #[tokio::test]
    async fn test_unload_resets_session() {
        let (bridge, log) = bridge_with_log(BridgeConfig::default());
        bridge.initialize().await.unwrap();
        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        let mut events = bridge.subscribe_events().await.unwrap();
        bridge.unload().await.unwrap();

        assert_eq!(bridge.current_state().await, LifecycleState::Uninitialized);
        assert!(!bridge.is_ready().await);
        assert_eq!(
            events.recv().await.unwrap().kind,
            EngineEventKind::Unloaded
        );

        // Session is reusable: initialize again and queue a send
        bridge.initialize().await.unwrap();
        bridge.send_when_ready(Message::new("Reload")).await.unwrap();
        bridge
            .handle_notification(PlatformNotification::Created)
            .await;
        assert!(log.lock().unwrap().iter().any(|p| p.2.contains("Reload")));
    }

    #[tokio::test]
    async fn test_inbound_message_reaches_dispatcher_and_channel() {
        let (bridge, _log) = bridge_with_log(BridgeConfig::default());
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let seen_cb = Arc::clone(&seen);
        bridge
            .on_message("ScoreChanged", move |msg| {
                seen_cb.lock().expect("seen lock").push(msg.clone());
            })
            .await
            .unwrap();
        let mut messages = bridge.subscribe_messages().unwrap();

        bridge
            .handle_notification(PlatformNotification::Message(json!(
                r#"{"type":"ScoreChanged","data":{"score":12}}"#
            )))
            .await;

        assert_eq!(seen.lock().unwrap().len(), 1);
        let broadcasted = messages.recv().await.unwrap();
        assert_eq!(broadcasted.message_type, "ScoreChanged");
        assert_eq!(
            broadcasted.payload.expect("payload").get("score"),
            Some(&json!(12))
        );
    }

    #[tokio::test]
    async fn test_scene_loaded_forwarded() {
        let (bridge, _log) = bridge_with_log(BridgeConfig::default());
        let mut scenes = bridge.subscribe_scenes().unwrap();

        bridge
            .handle_notification(PlatformNotification::SceneLoaded(SceneInfo {
                name: "Lobby".to_string(),
                build_index: 2,
                is_loaded: true,
                is_valid: true,
            }))
            .await;

        let scene = scenes.recv().await.unwrap();
        assert_eq!(scene.name, "Lobby");
        assert_eq!(scene.build_index, 2);
    }

    #[tokio::test]
    async fn test_remote_error_is_advisory() {
        let (bridge, _log) = bridge_with_log(BridgeConfig::default());
        bridge.initialize().await.unwrap();
        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        bridge
            .handle_notification(PlatformNotification::Error("shader compile failed".into()))
            .await;

        // Still ready; no outstanding call was failed
        assert!(bridge.is_ready().await);
        assert_eq!(bridge.current_state().await, LifecycleState::Ready);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_final() {
        let (bridge, _log) = bridge_with_log(BridgeConfig::default());
        bridge.initialize().await.unwrap();

        bridge.dispose().await;
        bridge.dispose().await;

        assert_eq!(bridge.current_state().await, LifecycleState::Disposed);
        assert!(matches!(
            bridge.send(Message::new("Late")).await,
            Err(BridgeError::Disposed)
        ));
        assert!(matches!(
            bridge.send_when_ready(Message::new("Late")).await,
            Err(BridgeError::Disposed)
        ));
        assert!(matches!(bridge.initialize().await, Err(BridgeError::Disposed)));
        assert!(matches!(
            bridge.subscribe_messages(),
            Err(BridgeError::Disposed)
        ));
        assert!(!bridge.is_ready().await);
    }

    #[tokio::test]
    async fn test_notification_pump_end_to_end() {
        let (bridge, log) = bridge_with_log(BridgeConfig::default());
        let (tx, rx) = mpsc::channel(8);
        bridge.attach_notifications(rx).await.unwrap();

        bridge.initialize().await.unwrap();
        bridge.send_when_ready(Message::new("Warmup")).await.unwrap();

        tx.send(RawNotification {
            event: "onUnityCreated".to_string(),
            data: None,
        })
        .await
        .unwrap();
        // Unrecognized events are dropped without poisoning the pump
        tx.send(RawNotification {
            event: "onSomethingNew".to_string(),
            data: None,
        })
        .await
        .unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert!(bridge.is_ready().await);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_host_lifecycle_drives_pause_resume() {
        let (bridge, _log) = bridge_with_log(BridgeConfig::default());
        let (tx, rx) = mpsc::channel(8);
        bridge.attach_host_lifecycle(rx).await.unwrap();

        bridge.initialize().await.unwrap();
        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        tx.send(HostLifecycleEvent::Suspended).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(bridge.current_state().await, LifecycleState::Paused);

        tx.send(HostLifecycleEvent::Resumed).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(bridge.current_state().await, LifecycleState::Resumed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_send_coalesces_before_transport() {
        let (bridge, log) = bridge_with_log(
            BridgeConfig::default().with_batch(crate::config::BatchConfig::default()),
        );
        bridge.initialize().await.unwrap();
        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        let position = |x: i64| {
            Message::new("Move")
                .with_target("Player")
                .with_method("SetPosition")
                .with_payload(Payload::new().with("x", x))
        };
        bridge.send_batched(position(1)).await.unwrap();
        bridge.send_batched(position(2)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let posts = log.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].2.contains(r#""x":2"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_sends_respect_policy() {
        let (bridge, log) = bridge_with_log(
            BridgeConfig::default().with_throttle(crate::config::ThrottleConfig::default()),
        );
        bridge.initialize().await.unwrap();
        bridge
            .handle_notification(PlatformNotification::Created)
            .await;

        let update = |n: i64| Message::new("Update").with_payload(Payload::new().with("n", n));
        bridge.send(update(1)).await.unwrap();
        bridge.send(update(2)).await.unwrap();
        bridge.send(update(3)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        let posts = log.lock().unwrap();
        assert_eq!(posts.len(), 2);
        assert!(posts[0].2.contains(r#""n":1"#));
        assert!(posts[1].2.contains(r#""n":3"#));
        drop(posts);

        let stats = bridge.throttler().expect("configured").stats().await;
        assert_eq!(stats.total_dropped, 1);
    }
}
