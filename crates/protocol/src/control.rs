//! Bare control messages: handshake auth and session recovery.
//!
//! These bypass the envelope. The auth payload is the first frame on a
//! fresh transport; the recovery signal re-establishes the logical session
//! on a transport that is still open; the ready signal tells the backend
//! the client finished wiring its consumers.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Credentials presented when opening a transport.
///
/// Both fields are required; the runtime refuses to attempt a connection
/// without them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Authenticated user identity (token or subject id).
    pub identity: String,
    /// Reference to the scene/project resource this session controls.
    pub target_resource: String,
}

/// Bare `{"recovery": true}` message requesting session re-establishment
/// on an already-open transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySignal {
    pub recovery: bool,
}

impl RecoverySignal {
    pub fn request() -> Self {
        Self { recovery: true }
    }
}

/// Raw ready signal. Idempotent, unenveloped, carries no id.
pub fn ready_signal() -> Value {
    json!({"type": "ready"})
}
