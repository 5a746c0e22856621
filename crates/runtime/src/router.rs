//! Outbound message router.
//!
//! Converts an [`OutboundIntent`] into exactly one wire message, or fails
//! loudly. Routing happens before queueing, so a malformed intent is
//! rejected synchronously whether or not the transport is up — a missing
//! route is a programming-contract violation, not a transient fault, and
//! retrying it cannot succeed.

use serde_json::Value;
use uuid::Uuid;

use scenelink_protocol::{
    AgentQueryPayload, CommandPayload, Envelope, EnvelopeBody, Metadata, Route, ready_signal,
};

use crate::error::{Error, Result};

/// Add-on targeted when a direct command names none.
pub const DEFAULT_ADDON_ID: &str = "scenelink_addon";

/// One user/UI intent awaiting routing. Ephemeral; built per action.
#[derive(Debug, Clone, Default)]
pub struct OutboundIntent {
    pub route: Option<Route>,
    pub command: Option<String>,
    pub params: Value,
    pub message: Option<String>,
    pub context: Value,
    pub addon_id: Option<String>,
    pub message_id: Option<String>,
    pub refresh_context: Option<bool>,
    ready: bool,
}

impl OutboundIntent {
    /// Direct command for an engine add-on.
    pub fn command(name: impl Into<String>) -> Self {
        Self {
            route: Some(Route::Direct),
            command: Some(name.into()),
            ..Self::default()
        }
    }

    /// Free-form agent query.
    pub fn agent(message: impl Into<String>) -> Self {
        Self {
            route: Some(Route::Agent),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Internal ready signal. Bypasses the envelope entirely.
    pub fn ready() -> Self {
        Self {
            ready: true,
            ..Self::default()
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_addon_id(mut self, addon_id: impl Into<String>) -> Self {
        self.addon_id = Some(addon_id.into());
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_refresh_context(mut self, refresh: bool) -> Self {
        self.refresh_context = Some(refresh);
        self
    }
}

/// Result of routing one intent.
#[derive(Debug, Clone)]
pub enum RoutedMessage {
    /// Enveloped protocol message with an id to correlate on.
    Envelope(Envelope),
    /// Bare control message, no id.
    Control(Value),
}

impl RoutedMessage {
    /// Id of the routed message, when it has one.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            RoutedMessage::Envelope(envelope) => Some(&envelope.message_id),
            RoutedMessage::Control(_) => None,
        }
    }

    /// Serialize to the wire value.
    pub fn into_wire(self) -> Result<Value> {
        match self {
            RoutedMessage::Envelope(envelope) => Ok(serde_json::to_value(&envelope)?),
            RoutedMessage::Control(value) => Ok(value),
        }
    }
}

/// Shapes every outbound intent into a protocol message.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    default_addon_id: String,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            default_addon_id: DEFAULT_ADDON_ID.to_string(),
        }
    }

    pub fn with_default_addon_id(mut self, addon_id: impl Into<String>) -> Self {
        self.default_addon_id = addon_id.into();
        self
    }

    /// Route one intent. Errors here are contract violations: nothing was
    /// sent and nothing will be retried.
    pub fn route(&self, intent: OutboundIntent) -> Result<RoutedMessage> {
        if intent.ready {
            return Ok(RoutedMessage::Control(ready_signal()));
        }

        let route = intent.route.ok_or(Error::RouteMissing)?;
        let message_id = intent
            .message_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let refresh_context = intent.refresh_context.unwrap_or(false);

        let body = match route {
            Route::Direct => {
                let command = intent
                    .command
                    .ok_or_else(|| Error::InvalidIntent("direct route without a command".into()))?;
                EnvelopeBody::Command(CommandPayload {
                    addon_id: intent
                        .addon_id
                        .unwrap_or_else(|| self.default_addon_id.clone()),
                    command,
                    params: intent.params,
                })
            }
            Route::Agent => {
                let message = intent
                    .message
                    .ok_or_else(|| Error::InvalidIntent("agent route without a message".into()))?;
                EnvelopeBody::AgentQuery(AgentQueryPayload {
                    message,
                    context: intent.context,
                })
            }
        };

        Ok(RoutedMessage::Envelope(Envelope {
            message_id,
            body,
            metadata: Metadata::now(route, refresh_context),
        }))
    }
}
