//! Logical session state machine.
//!
//! The logical session is the three-party relationship between this client,
//! the backend relay, and the engine add-on. It is distinct from raw
//! transport connectivity: the relay and the add-on connect and disconnect
//! independently, so the machine derives one [`ConnectionState`] from
//! inbound protocol events plus transport closures.
//!
//! The machine is pure: [`SessionStateMachine::apply`] mutates only the
//! state and returns the side effects the connection manager must execute.
//! That keeps every transition unit-testable without I/O and makes the
//! dispatch exhaustive — an unhandled input is a compile error, not a
//! silently missing handler.

use scenelink_protocol::ProtocolEvent;

/// Logical session state. Derived, never set directly by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport, or transport up but no session handshake yet.
    Disconnected,
    /// Backend session established; engine add-on not attached.
    BrowserConnected,
    /// Backend and engine both attached.
    FullyConnected,
    /// Engine add-on detached while the backend session stays up.
    EngineDisconnected,
    /// Explicit session recovery in flight on an open transport.
    Reconnecting,
    /// Cleanup deadline passed; backend declared unreachable. Exited only
    /// by explicit user action.
    ServerUnavailable,
}

/// Inputs that can move the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateInput {
    /// Backend created (or restored) the logical session.
    SessionCreated { resumed: bool },
    /// Engine add-on attached.
    EngineConnected { resumed: bool },
    /// Engine add-on detached.
    EngineDisconnected,
    /// Caller requested session recovery while the transport is open.
    RecoveryRequested,
    /// Transport closed.
    TransportClosed { manual: bool },
    /// Cleanup timer fired with no reconnection.
    CleanupFired,
}

/// Side effects the connection manager must execute after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// A brand-new session was established.
    MarkFreshSession,
    /// An existing session was restored after an interruption.
    MarkResumedSession,
    /// Engine left; cached scene-object context is stale.
    ClearSceneContext,
    /// Transport dropped unexpectedly; start the unreachability deadline.
    ArmCleanupTimer,
    /// Session came back (or was closed deliberately) before the deadline.
    CancelCleanupTimer,
    /// Backend unreachable; local session identity must not outlive it.
    PurgeSessionIdentity,
    /// Ask the backend to re-establish the session on the open transport.
    EmitRecoverySignal,
}

/// Derives [`ConnectionState`] from protocol events and transport status.
#[derive(Debug)]
pub struct SessionStateMachine {
    state: ConnectionState,
    /// Set once a session handshake completed on the current transport.
    /// Guards the invariant that `FullyConnected` is only reachable through
    /// `BrowserConnected`: engine events without a prior handshake on this
    /// transport are ignored.
    handshake_done: bool,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            handshake_done: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the logical session is usable for outbound traffic.
    pub fn is_session_up(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::BrowserConnected
                | ConnectionState::FullyConnected
                | ConnectionState::EngineDisconnected
        )
    }

    /// Map an inbound protocol event to a machine input, if it is one the
    /// machine cares about.
    pub fn input_for_event(event: &ProtocolEvent) -> Option<StateInput> {
        match event {
            ProtocolEvent::SessionCreated { resumed, .. } => {
                Some(StateInput::SessionCreated { resumed: *resumed })
            }
            ProtocolEvent::EngineConnected { resumed, .. } => {
                Some(StateInput::EngineConnected { resumed: *resumed })
            }
            ProtocolEvent::EngineDisconnected { .. } => Some(StateInput::EngineDisconnected),
            _ => None,
        }
    }

    /// Apply one input, returning the effects to execute.
    pub fn apply(&mut self, input: StateInput) -> Vec<Effect> {
        use ConnectionState::*;

        match input {
            StateInput::SessionCreated { resumed } => match self.state {
                Disconnected | Reconnecting | ServerUnavailable => {
                    self.state = BrowserConnected;
                    self.handshake_done = true;
                    let mark = if resumed {
                        Effect::MarkResumedSession
                    } else {
                        Effect::MarkFreshSession
                    };
                    vec![mark, Effect::CancelCleanupTimer]
                }
                // Duplicate handshake on a live session: backend restart
                // raced a recovery. Treat as a session reset.
                BrowserConnected | FullyConnected | EngineDisconnected => {
                    self.state = BrowserConnected;
                    vec![Effect::ClearSceneContext]
                }
            },
            StateInput::EngineConnected { resumed } => match self.state {
                BrowserConnected | EngineDisconnected if self.handshake_done => {
                    self.state = FullyConnected;
                    if resumed {
                        vec![Effect::MarkResumedSession]
                    } else {
                        vec![]
                    }
                }
                // Never synthesize full connectivity without a session
                // handshake on this transport.
                _ => vec![],
            },
            StateInput::EngineDisconnected => match self.state {
                FullyConnected => {
                    self.state = EngineDisconnected;
                    vec![Effect::ClearSceneContext]
                }
                _ => vec![],
            },
            StateInput::RecoveryRequested => match self.state {
                BrowserConnected | FullyConnected | EngineDisconnected => {
                    self.state = Reconnecting;
                    vec![Effect::EmitRecoverySignal]
                }
                _ => vec![],
            },
            StateInput::TransportClosed { manual } => {
                self.state = Disconnected;
                self.handshake_done = false;
                if manual {
                    vec![Effect::CancelCleanupTimer]
                } else {
                    vec![Effect::ArmCleanupTimer]
                }
            }
            StateInput::CleanupFired => match self.state {
                Disconnected | Reconnecting => {
                    self.state = ServerUnavailable;
                    vec![Effect::PurgeSessionIdentity]
                }
                _ => vec![],
            },
        }
    }
}
