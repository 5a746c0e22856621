//! Outbound message envelope.
//!
//! Every user or UI intent that reaches the backend travels as exactly one
//! [`Envelope`]:
//!
//! ```json
//! {
//!   "message_id": "…",
//!   "type": "command" | "agent_query",
//!   "payload": { … },
//!   "metadata": { "timestamp": …, "source": "browser", "route": "direct" | "agent", "refresh_context": false }
//! }
//! ```
//!
//! The two payload shapes correspond to the two delivery routes: `direct`
//! commands are executed by a named engine add-on, `agent` queries are
//! free-form text handed to the backend agent together with a structured
//! scene/inventory context.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed `metadata.source` tag identifying this client.
pub const SOURCE_BROWSER: &str = "browser";

/// Delivery route for an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Command executed directly by an engine add-on.
    Direct,
    /// Free-form query answered by the backend agent.
    Agent,
}

/// Complete outbound protocol message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique id used to correlate completion/failure events.
    pub message_id: String,
    /// `type` + `payload` pair on the wire.
    #[serde(flatten)]
    pub body: EnvelopeBody,
    /// Client-side metadata attached to every message.
    pub metadata: Metadata,
}

/// The `type`-tagged payload of an [`Envelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EnvelopeBody {
    /// Direct command for an engine add-on.
    Command(CommandPayload),
    /// Agent query with scene context.
    AgentQuery(AgentQueryPayload),
}

/// Payload for the `direct` route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPayload {
    /// Target add-on inside the engine.
    pub addon_id: String,
    /// Command name understood by the add-on.
    pub command: String,
    /// Command parameters, shape defined by the add-on.
    #[serde(default)]
    pub params: Value,
}

/// Payload for the `agent` route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentQueryPayload {
    /// Free-form user text.
    pub message: String,
    /// Structured scene/inventory references the agent may consult.
    #[serde(default)]
    pub context: Value,
}

/// Metadata attached to every outbound envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Unix timestamp in milliseconds, client clock.
    pub timestamp: i64,
    /// Always [`SOURCE_BROWSER`] for messages produced by this crate.
    pub source: String,
    /// Route the message was dispatched on.
    pub route: Route,
    /// Whether the backend should rebuild its scene context before handling.
    pub refresh_context: bool,
}

impl Metadata {
    /// Create metadata with the current timestamp.
    pub fn now(route: Route, refresh_context: bool) -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0),
            source: SOURCE_BROWSER.to_string(),
            route,
            refresh_context,
        }
    }
}
