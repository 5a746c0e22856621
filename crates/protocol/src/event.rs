//! Inbound protocol events.
//!
//! The backend tags every inbound message with a `type` field from a fixed
//! enumeration. [`ProtocolEvent`] models that enumeration exhaustively so
//! consumers dispatch with a match instead of a name-keyed handler table.
//! Unknown types deserialize into [`ProtocolEvent::Unknown`] and are dropped
//! by the runtime without failing the session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tagged union of everything the backend sends on the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// The backend accepted the handshake and created (or restored) the
    /// logical session.
    SessionCreated {
        session_id: String,
        /// True when the backend restored an existing session rather than
        /// minting a fresh one.
        #[serde(default)]
        resumed: bool,
    },
    /// The backend finished wiring the session and is ready for traffic.
    SessionReady {
        session_id: String,
    },
    /// The engine add-on attached to this session.
    EngineConnected {
        /// True when the add-on re-attached to a session it had before.
        #[serde(default)]
        resumed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        addon_version: Option<String>,
    },
    /// The engine add-on detached; the backend relay is still up.
    EngineDisconnected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// A direct command finished successfully.
    CommandCompleted {
        message_id: String,
        #[serde(default)]
        result: Value,
    },
    /// A direct command failed inside the engine.
    CommandFailed {
        message_id: String,
        error: ErrorDetail,
    },
    /// The agent produced a response to a query.
    AgentResponse {
        message_id: String,
        response: String,
        /// Optional structured actions the agent wants applied.
        #[serde(default)]
        actions: Value,
    },
    /// The agent failed to answer a query.
    AgentError {
        message_id: String,
        error: ErrorDetail,
    },
    /// The engine hit an error outside any single command.
    ExecutionError {
        error: ErrorDetail,
    },
    /// Fresh scene-object context snapshot. Last write wins.
    SceneContextUpdated {
        context: Value,
    },
    /// The backend flushed its pending-message inbox for this session.
    InboxCleared,
    /// Forward-compatible catch-all for event types this build predates.
    #[serde(other)]
    Unknown,
}

/// Backend-declared failure: a user-facing message plus technical detail
/// kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_created_parses() {
        let event: ProtocolEvent =
            serde_json::from_value(json!({"type": "session_created", "session_id": "s-1"}))
                .unwrap();
        match event {
            ProtocolEvent::SessionCreated {
                session_id,
                resumed,
            } => {
                assert_eq!(session_id, "s-1");
                assert!(!resumed);
            }
            other => panic!("expected SessionCreated, got {other:?}"),
        }
    }

    #[test]
    fn engine_connected_carries_resume_flag() {
        let event: ProtocolEvent = serde_json::from_value(
            json!({"type": "engine_connected", "resumed": true, "addon_version": "1.4.2"}),
        )
        .unwrap();
        match event {
            ProtocolEvent::EngineConnected {
                resumed,
                addon_version,
            } => {
                assert!(resumed);
                assert_eq!(addon_version.as_deref(), Some("1.4.2"));
            }
            other => panic!("expected EngineConnected, got {other:?}"),
        }
    }

    #[test]
    fn command_failed_carries_both_message_and_detail() {
        let event: ProtocolEvent = serde_json::from_value(json!({
            "type": "command_failed",
            "message_id": "m-9",
            "error": {"message": "Could not add cube", "detail": "KeyError: 'mesh'"}
        }))
        .unwrap();
        match event {
            ProtocolEvent::CommandFailed { message_id, error } => {
                assert_eq!(message_id, "m-9");
                assert_eq!(error.message, "Could not add cube");
                assert_eq!(error.detail.as_deref(), Some("KeyError: 'mesh'"));
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_types_do_not_fail() {
        let event: ProtocolEvent =
            serde_json::from_value(json!({"type": "telemetry_snapshot", "data": {}})).unwrap();
        assert!(matches!(event, ProtocolEvent::Unknown));
    }

    #[test]
    fn inbox_cleared_is_a_bare_tag() {
        let event: ProtocolEvent =
            serde_json::from_value(json!({"type": "inbox_cleared"})).unwrap();
        assert!(matches!(event, ProtocolEvent::InboxCleared));
    }
}
