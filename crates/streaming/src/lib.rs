//! Scenelink streaming — peer-to-peer viewport media negotiation.
//!
//! Once the logical session is fully connected, the client can negotiate a
//! low-latency video stream of the engine viewport. Two topologies are
//! supported:
//!
//! - **Control-channel signaling**: offer/answer/ICE travel as typed
//!   control messages on the existing session transport. The
//!   [`StreamingNegotiator`] sends the offer.
//! - **Discovery**: a dedicated signaling endpoint announces available
//!   producers; the [`DiscoveryClient`] matches the configured producer
//!   identity, starts a session, and relays signals. The producer sends
//!   the offer.
//!
//! Streaming failures never escalate to the session: on any peer failure
//! the negotiator tears down and flips its availability flag, and callers
//! fall back to the snapshot frame path.

pub mod discovery;
pub mod error;
pub mod negotiator;

pub use discovery::{DiscoveryClient, DiscoverySession};
pub use error::{Error, Result};
pub use negotiator::{MediaSink, SignalSink, StreamingNegotiator};

// Re-exported so media sinks can be implemented without a direct webrtc dep
pub use webrtc::track::track_remote::TrackRemote;
