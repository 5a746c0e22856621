//! End-to-end session lifecycle tests against a scripted transport.
//!
//! The fake connector hands out channel-backed transports: the test drives
//! inbound traffic by pushing values into the transport's message channel
//! and observes outbound traffic in the recording sender. Time is paused,
//! so backoff and cleanup deadlines run deterministically.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use scenelink_protocol::AuthPayload;
use scenelink_runtime::{
    ConfigSource, ConnectionManager, ConnectionState, Connector, Error, OutboundIntent,
    ReconnectPolicy, Result, SessionConfig, Transport, TransportParts, TransportReceiver,
    TransportStatus,
};

/// One live fake transport, as seen from the test.
struct FakeHandle {
    auth: AuthPayload,
    sent: Arc<Mutex<Vec<Value>>>,
    message_tx: Mutex<Option<mpsc::UnboundedSender<Value>>>,
}

impl FakeHandle {
    fn push(&self, value: Value) {
        self.message_tx
            .lock()
            .as_ref()
            .expect("transport already closed")
            .send(value)
            .expect("dispatch loop gone");
    }

    /// Simulate the server closing the transport.
    fn close(&self) {
        self.message_tx.lock().take();
    }

    fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }
}

struct FakeConnector {
    /// Outcome script for successive connect calls; `true` = succeed.
    /// Once drained, further calls succeed.
    script: Mutex<VecDeque<bool>>,
    handles: Mutex<Vec<Arc<FakeHandle>>>,
    calls: AtomicU32,
}

impl FakeConnector {
    fn scripted(script: impl IntoIterator<Item = bool>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            handles: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        })
    }

    fn always_ok() -> Arc<Self> {
        Self::scripted([])
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn latest(&self) -> Arc<FakeHandle> {
        Arc::clone(self.handles.lock().last().expect("no transport opened"))
    }
}

impl Connector for FakeConnector {
    fn connect(&self, auth: &AuthPayload) -> BoxFuture<'_, Result<TransportParts>> {
        let auth = auth.clone();
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ok = self.script.lock().pop_front().unwrap_or(true);
            if !ok {
                return Err(Error::ConnectionFailed("scripted refusal".into()));
            }

            let sent = Arc::new(Mutex::new(Vec::new()));
            let (message_tx, message_rx) = mpsc::unbounded_channel();
            self.handles.lock().push(Arc::new(FakeHandle {
                auth,
                sent: Arc::clone(&sent),
                message_tx: Mutex::new(Some(message_tx)),
            }));

            Ok(TransportParts {
                sender: Box::new(RecordingSender { sent }),
                receiver: Box::new(InertReceiver),
                message_rx,
            })
        })
    }
}

struct RecordingSender {
    sent: Arc<Mutex<Vec<Value>>>,
}

impl Transport for RecordingSender {
    fn send(&mut self, message: Value) -> BoxFuture<'_, Result<()>> {
        self.sent.lock().push(message);
        Box::pin(async { Ok(()) })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// The fake's read pump lives in the test, so the receiver has nothing to do.
struct InertReceiver;

impl TransportReceiver for InertReceiver {
    fn run(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

fn config() -> Arc<dyn ConfigSource> {
    Arc::new(|| SessionConfig {
        identity: Some("user-1".to_string()),
        target_resource: "scene://studio/42".to_string(),
    })
}

fn manager(connector: Arc<FakeConnector>) -> ConnectionManager {
    ConnectionManager::new(connector, config())
}

/// Let spawned tasks run; paused time makes this deterministic.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn session_created(resumed: bool) -> Value {
    json!({"type": "session_created", "session_id": "s-1", "resumed": resumed})
}

fn engine_connected() -> Value {
    json!({"type": "engine_connected", "resumed": false})
}

#[tokio::test(start_paused = true)]
async fn auth_payload_reaches_the_transport() {
    let connector = FakeConnector::always_ok();
    let manager = manager(Arc::clone(&connector));
    manager.connect().await.unwrap();

    let handle = manager_handle(&connector).await;
    assert_eq!(handle.auth.identity, "user-1");
    assert_eq!(handle.auth.target_resource, "scene://studio/42");
    assert_eq!(manager.status(), TransportStatus::Connected);
}

async fn manager_handle(connector: &Arc<FakeConnector>) -> Arc<FakeHandle> {
    settle().await;
    connector.latest()
}

#[tokio::test(start_paused = true)]
async fn deferred_messages_flush_in_order_exactly_once() {
    let connector = FakeConnector::always_ok();
    let manager = manager(Arc::clone(&connector));

    for id in ["m-1", "m-2", "m-3"] {
        let outcome = manager
            .send(OutboundIntent::command("add_cube").with_message_id(id))
            .unwrap();
        assert!(outcome.is_deferred());
    }
    assert_eq!(manager.queued_messages(), 3);

    manager.connect().await.unwrap();
    settle().await;

    let sent = connector.latest().sent();
    let ids: Vec<&str> = sent
        .iter()
        .map(|v| v["message_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["m-1", "m-2", "m-3"]);
    assert_eq!(manager.queued_messages(), 0);

    // Post-reconnect traffic lands after the flushed backlog.
    let outcome = manager
        .send(OutboundIntent::command("add_cube").with_message_id("m-4"))
        .unwrap();
    assert!(!outcome.is_deferred());
    settle().await;
    assert_eq!(connector.latest().sent().len(), 4);
    assert_eq!(connector.latest().sent()[3]["message_id"], "m-4");
}

#[tokio::test(start_paused = true)]
async fn scenario_a_session_then_engine() {
    let connector = FakeConnector::always_ok();
    let manager = manager(Arc::clone(&connector));
    manager.connect().await.unwrap();
    let handle = manager_handle(&connector).await;

    handle.push(session_created(false));
    settle().await;
    assert_eq!(manager.state(), ConnectionState::BrowserConnected);
    assert_eq!(manager.session_id().as_deref(), Some("s-1"));

    handle.push(engine_connected());
    settle().await;
    assert_eq!(manager.state(), ConnectionState::FullyConnected);
}

#[tokio::test(start_paused = true)]
async fn scenario_b_unexpected_close_then_recovery() {
    let connector = FakeConnector::always_ok();
    let manager = manager(Arc::clone(&connector));
    manager.connect().await.unwrap();
    let first = manager_handle(&connector).await;

    first.push(session_created(false));
    first.push(engine_connected());
    settle().await;
    assert_eq!(manager.state(), ConnectionState::FullyConnected);

    first.close();
    settle().await;
    assert_eq!(manager.status(), TransportStatus::Disconnected);
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    // First automatic retry lands after the base delay.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(connector.calls(), 2);
    assert_eq!(manager.status(), TransportStatus::Connected);

    let second = connector.latest();
    second.push(session_created(true));
    settle().await;
    assert_eq!(manager.state(), ConnectionState::BrowserConnected);

    // Reconnection cancelled the cleanup deadline: no unreachability
    // declaration later.
    tokio::time::sleep(Duration::from_secs(400)).await;
    assert_eq!(manager.state(), ConnectionState::BrowserConnected);
}

#[tokio::test(start_paused = true)]
async fn scenario_c_cleanup_deadline_purges_session() {
    let connector = FakeConnector::scripted([true, false, false, false, false, false]);
    let manager = manager(Arc::clone(&connector));
    manager.connect().await.unwrap();
    let handle = manager_handle(&connector).await;

    handle.push(session_created(false));
    handle.push(json!({"type": "scene_context_updated", "context": {"objects": ["Cube"]}}));
    settle().await;
    assert!(manager.scene_context().is_some());

    handle.close();
    settle().await;

    // All retries fail; the budget burns out well before the deadline.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(manager.status(), TransportStatus::Failed);
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(manager.state(), ConnectionState::ServerUnavailable);
    assert_eq!(manager.session_id(), None);
    assert_eq!(manager.scene_context(), None);
}

#[tokio::test(start_paused = true)]
async fn scenario_d_budget_exhaustion_stops_retrying() {
    let connector = FakeConnector::scripted([false, false, false, false, false, false, false]);
    let manager = ConnectionManager::new(Arc::clone(&connector) as Arc<dyn Connector>, config())
        .with_policy(ReconnectPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        });

    let err = manager.connect().await.unwrap_err();
    assert!(err.is_transient());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.calls(), 5);
    assert_eq!(manager.status(), TransportStatus::Failed);

    // No sixth automatic attempt, ever.
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.calls(), 5);

    // An explicit retry resets the budget.
    let _ = manager.connect().await;
    assert_eq!(connector.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn manual_disconnect_never_reconnects() {
    let connector = FakeConnector::always_ok();
    let manager = manager(Arc::clone(&connector));
    manager.connect().await.unwrap();
    let handle = manager_handle(&connector).await;
    handle.push(session_created(false));
    settle().await;

    manager.disconnect();
    settle().await;
    assert_eq!(manager.status(), TransportStatus::Disconnected);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.calls(), 1);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn foregrounding_retries_immediately_with_a_fresh_budget() {
    let connector = FakeConnector::scripted([false, true]);
    let manager = manager(Arc::clone(&connector));

    let _ = manager.connect().await;
    assert_eq!(manager.status(), TransportStatus::Disconnected);
    assert_eq!(connector.calls(), 1);

    // Well before the scheduled backoff retry.
    manager.notify_foregrounded();
    settle().await;
    assert_eq!(connector.calls(), 2);
    assert_eq!(manager.status(), TransportStatus::Connected);

    // The stale backoff retry fires later and finds nothing to do.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn explicit_reconnect_on_open_transport_sends_recovery_signal() {
    let connector = FakeConnector::always_ok();
    let manager = manager(Arc::clone(&connector));
    manager.connect().await.unwrap();
    let handle = manager_handle(&connector).await;
    handle.push(session_created(false));
    settle().await;

    manager.reconnect().await.unwrap();
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);
    assert_eq!(connector.calls(), 1, "cheap path must not reopen the transport");
    let sent = handle.sent();
    assert_eq!(sent.last().unwrap(), &json!({"recovery": true}));

    handle.push(session_created(true));
    settle().await;
    assert_eq!(manager.state(), ConnectionState::BrowserConnected);
}

#[tokio::test(start_paused = true)]
async fn engine_detach_clears_scene_context_and_reattach_restores() {
    let connector = FakeConnector::always_ok();
    let manager = manager(Arc::clone(&connector));
    manager.connect().await.unwrap();
    let handle = manager_handle(&connector).await;

    handle.push(session_created(false));
    handle.push(engine_connected());
    handle.push(json!({"type": "scene_context_updated", "context": {"objects": ["Cube"]}}));
    settle().await;
    assert_eq!(manager.state(), ConnectionState::FullyConnected);
    assert!(manager.scene_context().is_some());

    handle.push(json!({"type": "engine_disconnected", "reason": "addon reload"}));
    settle().await;
    assert_eq!(manager.state(), ConnectionState::EngineDisconnected);
    assert_eq!(manager.scene_context(), None);

    handle.push(engine_connected());
    settle().await;
    assert_eq!(manager.state(), ConnectionState::FullyConnected);
}

#[tokio::test(start_paused = true)]
async fn inbound_events_are_broadcast_in_arrival_order() {
    let connector = FakeConnector::always_ok();
    let manager = manager(Arc::clone(&connector));
    let mut events = manager.subscribe_events();
    manager.connect().await.unwrap();
    let handle = manager_handle(&connector).await;

    handle.push(session_created(false));
    handle.push(json!({"type": "command_completed", "message_id": "m-1", "result": {}}));
    handle.push(json!({
        "type": "command_failed",
        "message_id": "m-2",
        "error": {"message": "boom", "detail": "Traceback…"}
    }));
    settle().await;

    use scenelink_protocol::ProtocolEvent;
    assert!(matches!(
        events.recv().await.unwrap(),
        ProtocolEvent::SessionCreated { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        ProtocolEvent::CommandCompleted { .. }
    ));
    match events.recv().await.unwrap() {
        ProtocolEvent::CommandFailed { message_id, error } => {
            assert_eq!(message_id, "m-2");
            assert_eq!(error.message, "boom");
            assert_eq!(error.detail.as_deref(), Some("Traceback…"));
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn streaming_signals_are_separated_from_session_events() {
    let connector = FakeConnector::always_ok();
    let manager = manager(Arc::clone(&connector));
    let mut events = manager.subscribe_events();
    let mut signals = manager.subscribe_signals();
    manager.connect().await.unwrap();
    let handle = manager_handle(&connector).await;

    handle.push(json!({
        "command": "webrtc",
        "signalType": "answer",
        "signalData": {"type": "answer", "sdp": "v=0…"}
    }));
    handle.push(session_created(false));
    settle().await;

    let signal = signals.recv().await.unwrap();
    assert_eq!(
        signal.signal_type,
        scenelink_protocol::SignalType::Answer
    );
    // The signal never leaks into the session event stream.
    assert!(matches!(
        events.recv().await.unwrap(),
        scenelink_protocol::ProtocolEvent::SessionCreated { .. }
    ));
}
