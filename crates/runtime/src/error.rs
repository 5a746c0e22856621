//! Error types for the scenelink runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the scenelink runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// No identity available; the connection attempt was refused before any
    /// network call.
    #[error("No identity configured. Sign in before connecting.")]
    MissingIdentity,

    /// Failed to establish the transport connection.
    #[error("Failed to connect to backend: {0}")]
    ConnectionFailed(String),

    /// Transport-level error (WebSocket communication).
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Protocol-level error (malformed or unexpected traffic).
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Outbound intent had no delivery route. Programming-contract
    /// violation: never sent, never retried.
    #[error("Outbound intent has no route; refusing to send")]
    RouteMissing,

    /// Outbound intent was malformed for its route.
    #[error("Invalid outbound intent: {0}")]
    InvalidIntent(String),

    /// Operation requires an open transport.
    #[error("Transport is not connected")]
    NotConnected,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal channel closed unexpectedly.
    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

impl Error {
    /// True for caller mistakes the runtime will never retry.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::RouteMissing | Error::InvalidIntent(_))
    }

    /// True for faults the reconnect policy is allowed to recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed(_) | Error::TransportError(_) | Error::ChannelClosed
        )
    }
}
