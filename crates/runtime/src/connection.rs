//! Connection manager: owns the single transport and the logical session.
//!
//! This is the request/lifecycle layer on top of the transport. It handles:
//! - Opening the transport with the current auth payload
//! - Queueing outbound messages while offline, flushing FIFO on reconnect
//! - Automatic reconnection with exponential backoff and a bounded budget
//! - The disconnect cleanup timer and the unreachable-backend declaration
//! - Deriving the logical session state from inbound events
//!
//! # Message Flow
//!
//! 1. Caller builds an [`OutboundIntent`] and calls [`ConnectionManager::send`]
//! 2. The router shapes it into an envelope (contract violations fail here,
//!    synchronously, whether or not the transport is up)
//! 3. If connected, the envelope goes to the writer task; otherwise it is
//!    queued and the caller is told delivery was deferred
//! 4. Inbound values are parsed, fed to the state machine, and broadcast
//!
//! # Re-entrancy
//!
//! Every spawned task (dispatch loop, retry sleeps, cleanup timer) captures
//! the connection epoch and re-reads shared state under the lock before
//! acting. A task holding a stale epoch simply drops its work: decisions
//! are always made against current state, never against state captured at
//! registration time.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};

use scenelink_protocol::{AuthPayload, ProtocolEvent, RecoverySignal, StreamSignal};

use crate::cleanup::{CleanupTimer, DEFAULT_CLEANUP_AFTER};
use crate::error::{Error, Result};
use crate::reconnect::ReconnectPolicy;
use crate::router::{MessageRouter, OutboundIntent};
use crate::state::{ConnectionState, Effect, SessionStateMachine, StateInput};
use crate::transport::{Connector, TransportParts};

/// Transport-level connectivity. Owned by the manager; mutated only by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Reconnect budget exhausted; only an explicit `connect()` resumes.
    Failed,
}

/// Current session configuration, read fresh at every use.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Authenticated identity, absent while signed out.
    pub identity: Option<String>,
    /// Scene/project resource this session controls.
    pub target_resource: String,
}

/// Read accessor for the current [`SessionConfig`].
///
/// Injected at construction instead of reaching into ambient state, so the
/// manager always sees the latest identity without a prop chain.
pub trait ConfigSource: Send + Sync {
    fn snapshot(&self) -> SessionConfig;
}

impl<F> ConfigSource for F
where
    F: Fn() -> SessionConfig + Send + Sync,
{
    fn snapshot(&self) -> SessionConfig {
        self()
    }
}

/// What happened to a message handed to [`ConnectionManager::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the transport writer.
    Sent { message_id: Option<String> },
    /// Queued; will be flushed in order once the transport reconnects.
    Deferred { message_id: Option<String> },
}

impl SendOutcome {
    pub fn is_deferred(&self) -> bool {
        matches!(self, SendOutcome::Deferred { .. })
    }

    pub fn message_id(&self) -> Option<&str> {
        match self {
            SendOutcome::Sent { message_id } | SendOutcome::Deferred { message_id } => {
                message_id.as_deref()
            }
        }
    }
}

/// Owns exactly one transport connection and presents a reliable
/// send/receive surface for the logical session.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    config: Arc<dyn ConfigSource>,
    router: MessageRouter,
    policy: ReconnectPolicy,
    cleanup_after: Duration,
    shared: Mutex<Shared>,
    status_tx: watch::Sender<TransportStatus>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<ProtocolEvent>,
    signals_tx: broadcast::Sender<StreamSignal>,
}

struct Shared {
    status: TransportStatus,
    machine: SessionStateMachine,
    /// Writer channel for the current transport; `None` while offline.
    outbound: Option<mpsc::UnboundedSender<Value>>,
    queue: VecDeque<Value>,
    manual_disconnect: bool,
    /// Consecutive failed open attempts since the last successful one.
    attempts: u32,
    /// Bumped on every transport install and manual disconnect. Tasks
    /// carrying an older epoch discard their work.
    epoch: u64,
    cleanup: CleanupTimer,
    session_id: Option<String>,
    scene_context: Option<Value>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, config: Arc<dyn ConfigSource>) -> Self {
        let (status_tx, _) = watch::channel(TransportStatus::Disconnected);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(256);
        let (signals_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                router: MessageRouter::new(),
                policy: ReconnectPolicy::default(),
                cleanup_after: DEFAULT_CLEANUP_AFTER,
                shared: Mutex::new(Shared {
                    status: TransportStatus::Disconnected,
                    machine: SessionStateMachine::new(),
                    outbound: None,
                    queue: VecDeque::new(),
                    manual_disconnect: false,
                    attempts: 0,
                    epoch: 0,
                    cleanup: CleanupTimer::new(),
                    session_id: None,
                    scene_context: None,
                }),
                status_tx,
                state_tx,
                events_tx,
                signals_tx,
            }),
        }
    }

    /// Replaces the reconnect policy. Call before `connect()`.
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_policy called after the manager was shared")
            .policy = policy;
        self
    }

    /// Replaces the cleanup deadline. Call before `connect()`.
    pub fn with_cleanup_after(mut self, after: Duration) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_cleanup_after called after the manager was shared")
            .cleanup_after = after;
        self
    }

    /// Replaces the router. Call before `connect()`.
    pub fn with_router(mut self, router: MessageRouter) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_router called after the manager was shared")
            .router = router;
        self
    }

    /// Open the transport with the current credentials.
    ///
    /// Fails with [`Error::MissingIdentity`] before any network attempt
    /// when no identity is configured. A failed first attempt returns its
    /// error, but retries continue in the background under the reconnect
    /// policy.
    pub async fn connect(&self) -> Result<()> {
        let auth = self.inner.auth_payload()?;
        {
            let mut shared = self.inner.shared.lock();
            if matches!(
                shared.status,
                TransportStatus::Connecting | TransportStatus::Connected
            ) {
                tracing::debug!("connect ignored: transport already {:?}", shared.status);
                return Ok(());
            }
            shared.manual_disconnect = false;
            shared.attempts = 0;
            self.inner.set_status(&mut shared, TransportStatus::Connecting);
        }
        self.inner.open_transport(auth).await
    }

    /// Route and transmit (or queue) one outbound intent.
    ///
    /// Routing errors are contract violations and surface synchronously;
    /// nothing reaches the transport or the queue for them.
    pub fn send(&self, intent: OutboundIntent) -> Result<SendOutcome> {
        let routed = self.inner.router.route(intent)?;
        let message_id = routed.message_id().map(str::to_string);
        let wire = routed.into_wire()?;

        let mut shared = self.inner.shared.lock();
        if shared.status == TransportStatus::Connected {
            if let Some(tx) = &shared.outbound {
                if tx.send(wire.clone()).is_ok() {
                    return Ok(SendOutcome::Sent { message_id });
                }
            }
        }
        shared.queue.push_back(wire);
        tracing::debug!(
            queued = shared.queue.len(),
            "transport offline; outbound message deferred"
        );
        Ok(SendOutcome::Deferred { message_id })
    }

    /// Send a streaming signal on the open transport.
    ///
    /// Signals are never queued: a peer negotiation cannot outlive the
    /// transport it is signaled over.
    pub fn send_signal(&self, signal: &StreamSignal) -> Result<()> {
        let wire = serde_json::to_value(signal)?;
        let shared = self.inner.shared.lock();
        if shared.status != TransportStatus::Connected {
            return Err(Error::NotConnected);
        }
        match &shared.outbound {
            Some(tx) if tx.send(wire).is_ok() => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }

    /// Manual disconnect: the single cancellation point.
    ///
    /// Synchronously cancels the cleanup timer, clears the queue, closes
    /// the transport, and never triggers auto-reconnect.
    pub fn disconnect(&self) {
        let mut shared = self.inner.shared.lock();
        shared.manual_disconnect = true;
        shared.epoch += 1;
        shared.cleanup.cancel();
        shared.queue.clear();
        // Dropping the writer channel lets the writer task close the
        // transport after draining.
        shared.outbound = None;
        self.inner.set_status(&mut shared, TransportStatus::Disconnected);
        let effects = shared.machine.apply(StateInput::TransportClosed { manual: true });
        self.inner.run_effects(&mut shared, effects);
        self.inner.publish_state(&shared);
        tracing::info!("session disconnected by request");
    }

    /// Explicit reconnect.
    ///
    /// When the transport is still open this is the cheap path: a bare
    /// recovery signal re-establishes the logical session without
    /// reopening the socket. Otherwise it performs a full
    /// disconnect+connect cycle with a fresh attempt budget, bypassing
    /// backoff.
    pub async fn reconnect(&self) -> Result<()> {
        {
            let mut shared = self.inner.shared.lock();
            if shared.status == TransportStatus::Connected {
                let effects = shared.machine.apply(StateInput::RecoveryRequested);
                self.inner.run_effects(&mut shared, effects);
                self.inner.publish_state(&shared);
                return Ok(());
            }
        }
        self.disconnect();
        self.connect().await
    }

    /// The host environment reports the page became foregrounded.
    ///
    /// A user returning is a fresh opportunity, not a backoff violation:
    /// when disconnected, not manually, with attempts remaining, the
    /// attempt counter resets and a retry starts immediately.
    pub fn notify_foregrounded(&self) {
        let auth = {
            let mut shared = self.inner.shared.lock();
            let eligible = shared.status == TransportStatus::Disconnected
                && !shared.manual_disconnect
                && !self.inner.policy.exhausted(shared.attempts)
                && shared.machine.state() != ConnectionState::ServerUnavailable;
            if !eligible {
                return;
            }
            match self.inner.auth_payload() {
                Ok(auth) => {
                    shared.attempts = 0;
                    self.inner.set_status(&mut shared, TransportStatus::Connecting);
                    auth
                }
                Err(_) => return,
            }
        };
        tracing::info!("page foregrounded while disconnected; retrying immediately");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _ = inner.open_transport(auth).await;
        });
    }

    pub fn status(&self) -> TransportStatus {
        self.inner.shared.lock().status
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().machine.state()
    }

    pub fn watch_status(&self) -> watch::Receiver<TransportStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn subscribe_signals(&self) -> broadcast::Receiver<StreamSignal> {
        self.inner.signals_tx.subscribe()
    }

    /// Backend session id, when a handshake completed and was not purged.
    pub fn session_id(&self) -> Option<String> {
        self.inner.shared.lock().session_id.clone()
    }

    /// Cached scene-object context. Last write wins; cleared when the
    /// engine detaches, purged when the backend is declared unreachable.
    pub fn scene_context(&self) -> Option<Value> {
        self.inner.shared.lock().scene_context.clone()
    }

    /// Number of messages waiting for the transport to come back.
    pub fn queued_messages(&self) -> usize {
        self.inner.shared.lock().queue.len()
    }
}

impl Inner {
    fn auth_payload(&self) -> Result<AuthPayload> {
        let config = self.config.snapshot();
        let identity = config.identity.ok_or(Error::MissingIdentity)?;
        Ok(AuthPayload {
            identity,
            target_resource: config.target_resource,
        })
    }

    fn set_status(&self, shared: &mut Shared, status: TransportStatus) {
        if shared.status != status {
            shared.status = status;
            let _ = self.status_tx.send(status);
        }
    }

    fn publish_state(&self, shared: &Shared) {
        let state = shared.machine.state();
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }

    /// Execute the side effects of a state transition. Caller holds the lock.
    fn run_effects(self: &Arc<Self>, shared: &mut Shared, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::MarkFreshSession => {
                    tracing::info!(session_id = ?shared.session_id, "fresh session established");
                }
                Effect::MarkResumedSession => {
                    tracing::info!(session_id = ?shared.session_id, "session resumed");
                }
                Effect::ClearSceneContext => {
                    shared.scene_context = None;
                }
                Effect::ArmCleanupTimer => {
                    let inner = Arc::clone(self);
                    shared.cleanup.arm(self.cleanup_after, move || {
                        inner.handle_cleanup_fired();
                    });
                }
                Effect::CancelCleanupTimer => {
                    shared.cleanup.cancel();
                }
                Effect::PurgeSessionIdentity => {
                    shared.session_id = None;
                    shared.scene_context = None;
                }
                Effect::EmitRecoverySignal => {
                    if let Some(tx) = &shared.outbound {
                        let wire = serde_json::to_value(RecoverySignal::request())
                            .expect("recovery signal serializes");
                        let _ = tx.send(wire);
                    }
                }
            }
        }
    }

    async fn open_transport(self: &Arc<Self>, auth: AuthPayload) -> Result<()> {
        match self.connector.connect(&auth).await {
            Ok(parts) => {
                self.install_transport(parts);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "transport open failed");
                self.handle_open_failure();
                Err(e)
            }
        }
    }

    fn install_transport(self: &Arc<Self>, parts: TransportParts) {
        let TransportParts {
            mut sender,
            receiver,
            message_rx,
        } = parts;

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Value>();

        let epoch = {
            let mut shared = self.shared.lock();
            if shared.manual_disconnect {
                // disconnect() won the race against this open attempt.
                return;
            }
            shared.epoch += 1;
            let epoch = shared.epoch;
            shared.attempts = 0;
            shared.cleanup.cancel();
            self.set_status(&mut shared, TransportStatus::Connected);

            // Flush deferred messages in original order, ahead of anything
            // sent after this point.
            while let Some(value) = shared.queue.pop_front() {
                let _ = outbound_tx.send(value);
            }
            shared.outbound = Some(outbound_tx);
            epoch
        };
        tracing::info!("transport connected");

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = sender.send(message).await {
                    tracing::error!(error = %e, "transport write error");
                    break;
                }
            }
            let _ = sender.close().await;
        });

        tokio::spawn(async move {
            if let Err(e) = receiver.run().await {
                tracing::warn!(error = %e, "transport read error");
            }
        });

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.dispatch_loop(epoch, message_rx).await;
        });
    }

    async fn dispatch_loop(self: Arc<Self>, epoch: u64, mut message_rx: mpsc::UnboundedReceiver<Value>) {
        while let Some(value) = message_rx.recv().await {
            self.dispatch_value(epoch, value);
        }
        self.on_transport_closed(epoch);
    }

    fn dispatch_value(self: &Arc<Self>, epoch: u64, value: Value) {
        if StreamSignal::matches(&value) {
            match serde_json::from_value::<StreamSignal>(value) {
                Ok(signal) => {
                    let _ = self.signals_tx.send(signal);
                }
                Err(e) => tracing::error!(error = %e, "malformed streaming signal"),
            }
            return;
        }

        let event = match serde_json::from_value::<ProtocolEvent>(value) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognized inbound traffic");
                return;
            }
        };
        if matches!(event, ProtocolEvent::Unknown) {
            tracing::debug!("ignoring inbound event type this build predates");
            return;
        }

        {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch {
                // Event from a transport that is no longer current.
                return;
            }
            match &event {
                ProtocolEvent::SessionCreated { session_id, .. }
                | ProtocolEvent::SessionReady { session_id } => {
                    shared.session_id = Some(session_id.clone());
                }
                ProtocolEvent::SceneContextUpdated { context } => {
                    shared.scene_context = Some(context.clone());
                }
                ProtocolEvent::CommandFailed { error, .. }
                | ProtocolEvent::AgentError { error, .. }
                | ProtocolEvent::ExecutionError { error } => {
                    tracing::warn!(
                        message = %error.message,
                        detail = ?error.detail,
                        "backend-declared failure"
                    );
                }
                _ => {}
            }
            if let Some(input) = SessionStateMachine::input_for_event(&event) {
                let effects = shared.machine.apply(input);
                self.run_effects(&mut shared, effects);
            }
            self.publish_state(&shared);
        }

        let _ = self.events_tx.send(event);
    }

    fn on_transport_closed(self: &Arc<Self>, epoch: u64) {
        let mut shared = self.shared.lock();
        if shared.epoch != epoch {
            // A newer transport (or a manual disconnect) owns the state.
            return;
        }
        shared.outbound = None;
        if shared.manual_disconnect {
            return;
        }
        tracing::warn!("transport closed unexpectedly");
        self.set_status(&mut shared, TransportStatus::Disconnected);
        let effects = shared.machine.apply(StateInput::TransportClosed { manual: false });
        self.run_effects(&mut shared, effects);
        self.publish_state(&shared);
        self.schedule_reconnect(&mut shared);
    }

    fn handle_open_failure(self: &Arc<Self>) {
        let mut shared = self.shared.lock();
        if shared.manual_disconnect {
            self.set_status(&mut shared, TransportStatus::Disconnected);
            return;
        }
        shared.attempts += 1;
        if self.policy.exhausted(shared.attempts) {
            tracing::error!(
                attempts = shared.attempts,
                "reconnect budget exhausted; giving up until an explicit retry"
            );
            self.set_status(&mut shared, TransportStatus::Failed);
            return;
        }
        self.set_status(&mut shared, TransportStatus::Disconnected);
        self.schedule_reconnect(&mut shared);
    }

    /// Caller holds the lock.
    fn schedule_reconnect(self: &Arc<Self>, shared: &mut Shared) {
        if shared.machine.state() == ConnectionState::ServerUnavailable {
            // Backend already declared dead; retrying is the user's call.
            return;
        }
        let delay = self.policy.delay_for(shared.attempts);
        let epoch = shared.epoch;
        tracing::info!(
            attempt = shared.attempts + 1,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.retry_if_still_down(epoch).await;
        });
    }

    async fn retry_if_still_down(self: &Arc<Self>, epoch: u64) {
        let auth = match self.auth_payload() {
            Ok(auth) => auth,
            Err(_) => {
                tracing::debug!("identity gone; abandoning scheduled reconnect");
                return;
            }
        };
        {
            let mut shared = self.shared.lock();
            // Read at fire time, not at scheduling time: the world may
            // have moved on while we slept.
            if shared.epoch != epoch
                || shared.manual_disconnect
                || shared.status != TransportStatus::Disconnected
                || shared.machine.state() == ConnectionState::ServerUnavailable
            {
                return;
            }
            self.set_status(&mut shared, TransportStatus::Connecting);
        }
        let _ = self.open_transport(auth).await;
    }

    fn handle_cleanup_fired(self: &Arc<Self>) {
        let mut shared = self.shared.lock();
        if shared.status == TransportStatus::Connected {
            // A reconnect raced the deadline and won.
            return;
        }
        tracing::warn!("cleanup deadline passed with no reconnection; backend unreachable");
        let effects = shared.machine.apply(StateInput::CleanupFired);
        self.run_effects(&mut shared, effects);
        self.publish_state(&shared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Transport, TransportReceiver};
    use futures_util::future::BoxFuture;

    struct NeverConnector;

    impl Connector for NeverConnector {
        fn connect(&self, _auth: &AuthPayload) -> BoxFuture<'_, Result<TransportParts>> {
            Box::pin(async { Err(Error::ConnectionFailed("unreachable".into())) })
        }
    }

    struct NullSender;

    impl Transport for NullSender {
        fn send(&mut self, _message: Value) -> BoxFuture<'_, Result<()>> {
            Box::pin(async { Ok(()) })
        }
        fn close(&mut self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    struct NullReceiver;

    impl TransportReceiver for NullReceiver {
        fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn config_with_identity(identity: Option<&str>) -> Arc<dyn ConfigSource> {
        let identity = identity.map(str::to_string);
        Arc::new(move || SessionConfig {
            identity: identity.clone(),
            target_resource: "scene://test/1".to_string(),
        })
    }

    fn manager(connector: Arc<dyn Connector>, identity: Option<&str>) -> ConnectionManager {
        ConnectionManager::new(connector, config_with_identity(identity))
    }

    #[tokio::test]
    async fn connect_without_identity_fails_before_any_network_attempt() {
        struct PanickingConnector;
        impl Connector for PanickingConnector {
            fn connect(&self, _auth: &AuthPayload) -> BoxFuture<'_, Result<TransportParts>> {
                panic!("connector must not be reached without an identity");
            }
        }

        let manager = manager(Arc::new(PanickingConnector), None);
        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, Error::MissingIdentity));
        assert_eq!(manager.status(), TransportStatus::Disconnected);
    }

    #[tokio::test]
    async fn send_while_offline_defers() {
        let manager = manager(Arc::new(NeverConnector), Some("user-1"));
        let outcome = manager.send(OutboundIntent::command("add_cube")).unwrap();
        assert!(outcome.is_deferred());
        assert_eq!(manager.queued_messages(), 1);
    }

    #[tokio::test]
    async fn routing_errors_do_not_touch_the_queue() {
        let manager = manager(Arc::new(NeverConnector), Some("user-1"));
        let err = manager.send(OutboundIntent::default()).unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(manager.queued_messages(), 0);
    }

    #[tokio::test]
    async fn signals_are_refused_while_offline() {
        let manager = manager(Arc::new(NeverConnector), Some("user-1"));
        let signal = StreamSignal::new(
            scenelink_protocol::SignalType::Offer,
            serde_json::json!({"type": "offer", "sdp": ""}),
        );
        assert!(matches!(
            manager.send_signal(&signal),
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn manual_disconnect_clears_queue_and_cancels_cleanup() {
        let manager = manager(Arc::new(NeverConnector), Some("user-1"));
        manager.send(OutboundIntent::command("add_cube")).unwrap();
        manager.disconnect();
        assert_eq!(manager.queued_messages(), 0);
        assert_eq!(manager.status(), TransportStatus::Disconnected);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn install_after_manual_disconnect_is_dropped() {
        let manager = manager(Arc::new(NeverConnector), Some("user-1"));
        manager.disconnect();

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        drop(message_tx);
        manager.inner.install_transport(TransportParts {
            sender: Box::new(NullSender),
            receiver: Box::new(NullReceiver),
            message_rx,
        });
        assert_eq!(manager.status(), TransportStatus::Disconnected);
    }
}
