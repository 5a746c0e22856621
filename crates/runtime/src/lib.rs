//! Scenelink runtime — session connection, state machine, and routing.
//!
//! This crate owns everything between a user intent and the wire:
//!
//! - **Transport**: one persistent bidirectional channel to the backend
//!   (WebSocket in production, trait-seamed for tests)
//! - **Connection**: open/close/reconnect lifecycle, offline queueing,
//!   exponential backoff, the disconnect cleanup timer
//! - **State machine**: the logical three-party session state derived from
//!   inbound events and transport status
//! - **Router**: shaping outbound intents into protocol envelopes
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  consumers   │  CLI / UI, streaming negotiator
//! └──────┬───────┘
//!        │ intents in, state + events out
//! ┌──────▼───────┐
//! │   runtime    │  This crate
//! │  ┌────────┐  │
//! │  │ Router │  │  intent → envelope
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Conn   │  │  queue, backoff, cleanup timer, state machine
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  WebSocket transport
//! │  └────────┘  │
//! └──────────────┘
//! ```
//!
//! The connection is the only component that performs I/O. The state
//! machine and router are pure and unit-tested in isolation.

pub mod cleanup;
pub mod connection;
pub mod error;
pub mod reconnect;
pub mod router;
pub mod state;
pub mod transport;

// Re-export key types at crate root
pub use cleanup::{CleanupTimer, DEFAULT_CLEANUP_AFTER};
pub use connection::{
    ConfigSource, ConnectionManager, SendOutcome, SessionConfig, TransportStatus,
};
pub use error::{Error, Result};
pub use reconnect::ReconnectPolicy;
pub use router::{MessageRouter, OutboundIntent, RoutedMessage};
pub use state::{ConnectionState, Effect, SessionStateMachine, StateInput};
pub use transport::{Connector, Transport, TransportParts, TransportReceiver, WsConnector};
