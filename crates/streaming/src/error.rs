//! Error types for streaming negotiation.

use thiserror::Error;

/// Result type alias for streaming operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during streaming negotiation.
///
/// None of these are session-fatal; the caller falls back to the
/// non-streaming frame path.
#[derive(Debug, Error)]
pub enum Error {
    /// A negotiation is already connected or in flight.
    #[error("Streaming negotiation already active")]
    AlreadyActive,

    /// No discovery session established yet.
    #[error("No discovery session; signal has nowhere to go")]
    NoSession,

    /// Signaling channel refused the message.
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Discovery endpoint transport error.
    #[error("Discovery transport error: {0}")]
    Transport(String),

    /// Peer connection error from the WebRTC stack.
    #[error("Peer connection error: {0}")]
    Peer(#[from] webrtc::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
