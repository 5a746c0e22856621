//! Streaming signal payloads.
//!
//! Peer-to-peer media negotiation multiplexes over the same control channel
//! as everything else, wrapped in a fixed command marker:
//!
//! ```json
//! {"command": "webrtc", "signalType": "offer", "signalData": {…}}
//! ```
//!
//! The discovery topology instead talks to a dedicated signaling endpoint
//! that announces available producers; those messages are modeled by
//! [`DiscoveryMessage`] / [`DiscoveryRequest`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `command` marker distinguishing streaming signals from session traffic.
pub const SIGNAL_COMMAND: &str = "webrtc";

/// One streaming signal carried on the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSignal {
    /// Always [`SIGNAL_COMMAND`].
    pub command: String,
    #[serde(rename = "signalType")]
    pub signal_type: SignalType,
    #[serde(rename = "signalData")]
    pub signal_data: Value,
}

impl StreamSignal {
    pub fn new(signal_type: SignalType, signal_data: Value) -> Self {
        Self {
            command: SIGNAL_COMMAND.to_string(),
            signal_type,
            signal_data,
        }
    }

    /// Whether a raw inbound value looks like a streaming signal.
    pub fn matches(value: &Value) -> bool {
        value.get("command").and_then(Value::as_str) == Some(SIGNAL_COMMAND)
    }
}

/// Kind of signal being exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalType {
    Offer,
    Answer,
    IceCandidate,
}

/// SDP description matching `RTCSessionDescription`: `{type, sdp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdpData {
    #[serde(rename = "type")]
    pub sdp_type: String,
    pub sdp: String,
}

/// ICE candidate matching `RTCIceCandidateInit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidateData {
    pub candidate: String,
    #[serde(rename = "sdpMid", skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

/// Messages the discovery signaling endpoint sends to a consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DiscoveryMessage {
    /// Endpoint assigned this client a peer id.
    Welcome { peer_id: String },
    /// A producer became available.
    ProducerAdded {
        peer_id: String,
        #[serde(default)]
        meta: Value,
    },
    /// A producer went away.
    ProducerRemoved { peer_id: String },
    /// Result of listing currently-registered producers.
    List { producers: Vec<ProducerEntry> },
    /// A media session with a producer was established.
    SessionStarted {
        peer_id: String,
        session_id: String,
    },
    /// A media session ended.
    EndSession { session_id: String },
    /// Signal relayed from the producer inside an established session.
    Peer {
        session_id: String,
        #[serde(flatten)]
        signal: Value,
    },
    /// Endpoint-reported error.
    Error { details: String },
    #[serde(other)]
    Unknown,
}

/// One advertised producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerEntry {
    pub peer_id: String,
    #[serde(default)]
    pub meta: Value,
}

/// Requests a consumer sends to the discovery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DiscoveryRequest {
    /// Register as a listener so producer announcements are delivered.
    SetPeerStatus { roles: Vec<String> },
    /// List currently-registered producers.
    List,
    /// Ask the endpoint to open a session with the given producer.
    StartSession { peer_id: String },
    /// Relay a signal to the producer inside an established session.
    Peer {
        session_id: String,
        #[serde(flatten)]
        signal: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_signal_wire_shape() {
        let signal = StreamSignal::new(
            SignalType::IceCandidate,
            json!({"candidate": "candidate:1 1 UDP …", "sdpMid": "0"}),
        );
        let wire = serde_json::to_value(&signal).unwrap();
        assert_eq!(wire["command"], "webrtc");
        assert_eq!(wire["signalType"], "ice-candidate");
        assert_eq!(wire["signalData"]["sdpMid"], "0");
    }

    #[test]
    fn signal_types_are_kebab_case() {
        assert_eq!(
            serde_json::to_value(SignalType::Offer).unwrap(),
            json!("offer")
        );
        assert_eq!(
            serde_json::to_value(SignalType::IceCandidate).unwrap(),
            json!("ice-candidate")
        );
    }

    #[test]
    fn matches_recognizes_signals_only() {
        let signal = serde_json::to_value(StreamSignal::new(
            SignalType::Offer,
            json!({"type": "offer", "sdp": "v=0…"}),
        ))
        .unwrap();
        assert!(StreamSignal::matches(&signal));
        assert!(!StreamSignal::matches(
            &json!({"type": "session_created", "session_id": "s"})
        ));
    }

    #[test]
    fn discovery_producer_added_parses() {
        let message: DiscoveryMessage = serde_json::from_value(json!({
            "type": "producerAdded",
            "peerId": "p-7",
            "meta": {"name": "engine-viewport"}
        }))
        .unwrap();
        match message {
            DiscoveryMessage::ProducerAdded { peer_id, meta } => {
                assert_eq!(peer_id, "p-7");
                assert_eq!(meta["name"], "engine-viewport");
            }
            other => panic!("expected ProducerAdded, got {other:?}"),
        }
    }

    #[test]
    fn discovery_requests_are_camel_case() {
        let wire = serde_json::to_value(DiscoveryRequest::StartSession {
            peer_id: "p-7".to_string(),
        })
        .unwrap();
        assert_eq!(wire["type"], "startSession");
        assert_eq!(wire["peerId"], "p-7");
    }
}
