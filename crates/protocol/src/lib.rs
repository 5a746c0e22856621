//! Wire types for the scenelink control protocol.
//!
//! Everything that crosses the event channel between the client and the
//! creative-control backend is defined here: the outbound message envelope,
//! the inbound event union, the streaming signal schema, and the bare
//! control messages used for handshake and session recovery.
//!
//! This crate contains no I/O and no policy — serialization shapes only.
//! The runtime crate decides when and whether a message is sent.

pub mod control;
pub mod envelope;
pub mod event;
pub mod signal;

pub use control::{AuthPayload, RecoverySignal, ready_signal};
pub use envelope::{AgentQueryPayload, CommandPayload, Envelope, EnvelopeBody, Metadata, Route};
pub use event::{ErrorDetail, ProtocolEvent};
pub use signal::{IceCandidateData, SdpData, SignalType, StreamSignal};
