//! Discovery-topology signaling client.
//!
//! Instead of signaling over the session transport, this topology talks to
//! a dedicated endpoint that announces available media producers. The
//! client registers as a listener, matches the configured producer
//! identity, asks the endpoint to start a session, and from then on relays
//! offer/answer/ICE signals between the endpoint and the
//! [`StreamingNegotiator`]. The producer sends the offer; the negotiator
//! answers.
//!
//! Closing the endpoint socket tears down the peer connection: a media
//! session cannot outlive its signaling path.

use std::sync::Arc;

use futures_util::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use scenelink_protocol::signal::{DiscoveryMessage, DiscoveryRequest, ProducerEntry};
use scenelink_protocol::StreamSignal;

use crate::error::{Error, Result};
use crate::negotiator::{SignalSink, StreamingNegotiator};

/// Signal sink bound to an established discovery session.
///
/// Created empty; [`DiscoveryClient::run`] attaches the socket writer and
/// the session id once the endpoint provides them. Signals sent before
/// that fail with [`Error::NoSession`] — the negotiator only produces them
/// in response to an offer, which only arrives inside a session.
pub struct DiscoverySession {
    outbound: Mutex<Option<mpsc::UnboundedSender<Value>>>,
    session_id: Mutex<Option<String>>,
}

impl DiscoverySession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outbound: Mutex::new(None),
            session_id: Mutex::new(None),
        })
    }

    fn attach(&self, outbound: mpsc::UnboundedSender<Value>) {
        *self.outbound.lock() = Some(outbound);
    }

    fn open_session(&self, session_id: String) {
        *self.session_id.lock() = Some(session_id);
    }

    fn close_session(&self) {
        *self.session_id.lock() = None;
    }

    fn session_matches(&self, session_id: &str) -> bool {
        self.session_id.lock().as_deref() == Some(session_id)
    }

    fn send_request(&self, request: &DiscoveryRequest) -> Result<()> {
        let wire = serde_json::to_value(request)?;
        let outbound = self.outbound.lock();
        let tx = outbound.as_ref().ok_or(Error::NoSession)?;
        tx.send(wire).map_err(|_| Error::NoSession)
    }
}

impl SignalSink for DiscoverySession {
    fn send_signal(&self, signal: StreamSignal) -> Result<()> {
        let session_id = self.session_id.lock().clone().ok_or(Error::NoSession)?;
        self.send_request(&DiscoveryRequest::Peer {
            session_id,
            signal: serde_json::to_value(&signal)?,
        })
    }
}

/// Consumer against the discovery signaling endpoint.
pub struct DiscoveryClient {
    url: String,
    producer_identity: String,
}

impl DiscoveryClient {
    pub fn new(url: impl Into<String>, producer_identity: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            producer_identity: producer_identity.into(),
        }
    }

    /// Run the discovery loop until the endpoint socket closes.
    ///
    /// `session` must be the same [`DiscoverySession`] the negotiator was
    /// constructed with, so its answers and candidates are relayed back
    /// through the session this loop establishes.
    pub async fn run(
        &self,
        negotiator: &StreamingNegotiator,
        session: &Arc<DiscoverySession>,
    ) -> Result<()> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        tracing::debug!(url = %self.url, "discovery endpoint connected");
        let (mut sink, mut stream) = socket.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Value>();
        session.attach(outbound_tx);

        let writer = tokio::spawn(async move {
            while let Some(value) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&value) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "discovery request serialization failed");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        session.send_request(&DiscoveryRequest::SetPeerStatus {
            roles: vec!["listener".to_string()],
        })?;
        session.send_request(&DiscoveryRequest::List)?;

        let result = self.read_loop(&mut stream, negotiator, session).await;

        // Any close of the signaling path tears down the media session.
        session.close_session();
        negotiator.shutdown().await;
        writer.abort();
        result
    }

    async fn read_loop<S>(
        &self,
        stream: &mut S,
        negotiator: &StreamingNegotiator,
        session: &Arc<DiscoverySession>,
    ) -> Result<()>
    where
        S: Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        while let Some(frame) = stream.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => return Ok(()),
                Ok(_) => continue,
                Err(e) => return Err(Error::Transport(e.to_string())),
            };
            let message: DiscoveryMessage = match serde_json::from_str(&text) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed discovery message");
                    continue;
                }
            };
            self.handle_message(message, negotiator, session).await?;
        }
        Ok(())
    }

    async fn handle_message(
        &self,
        message: DiscoveryMessage,
        negotiator: &StreamingNegotiator,
        session: &Arc<DiscoverySession>,
    ) -> Result<()> {
        match message {
            DiscoveryMessage::Welcome { peer_id } => {
                tracing::debug!(%peer_id, "registered with discovery endpoint");
            }
            DiscoveryMessage::List { producers } => {
                if let Some(entry) = producers.iter().find(|p| self.is_target(p)) {
                    self.start_session(&entry.peer_id, session)?;
                }
            }
            DiscoveryMessage::ProducerAdded { peer_id, meta } => {
                let entry = ProducerEntry {
                    peer_id: peer_id.clone(),
                    meta,
                };
                if self.is_target(&entry) {
                    self.start_session(&peer_id, session)?;
                }
            }
            DiscoveryMessage::ProducerRemoved { peer_id } => {
                tracing::debug!(%peer_id, "producer went away");
            }
            DiscoveryMessage::SessionStarted {
                peer_id,
                session_id,
            } => {
                tracing::info!(%peer_id, %session_id, "media session started");
                session.open_session(session_id);
            }
            DiscoveryMessage::EndSession { session_id } => {
                if session.session_matches(&session_id) {
                    tracing::info!(%session_id, "media session ended by endpoint");
                    session.close_session();
                    negotiator.shutdown().await;
                }
            }
            DiscoveryMessage::Peer { session_id, signal } => {
                if !session.session_matches(&session_id) {
                    tracing::debug!(%session_id, "signal for a session we are not in");
                    return Ok(());
                }
                match serde_json::from_value::<StreamSignal>(signal) {
                    Ok(signal) => {
                        if let Err(e) = negotiator.handle_signal(signal).await {
                            tracing::warn!(error = %e, "negotiator rejected relayed signal");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "malformed relayed signal"),
                }
            }
            DiscoveryMessage::Error { details } => {
                tracing::warn!(%details, "discovery endpoint error");
            }
            DiscoveryMessage::Unknown => {
                tracing::debug!("ignoring unknown discovery message type");
            }
        }
        Ok(())
    }

    fn is_target(&self, entry: &ProducerEntry) -> bool {
        entry.meta.get("name").and_then(Value::as_str) == Some(self.producer_identity.as_str())
    }

    fn start_session(&self, peer_id: &str, session: &Arc<DiscoverySession>) -> Result<()> {
        if session.session_id.lock().is_some() {
            // One media session at a time; a second matching producer is
            // ignored until the current session ends.
            return Ok(());
        }
        tracing::info!(%peer_id, producer = %self.producer_identity, "matching producer found");
        session.send_request(&DiscoveryRequest::StartSession {
            peer_id: peer_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenelink_protocol::SignalType;
    use serde_json::json;

    #[test]
    fn signals_without_a_session_are_refused() {
        let session = DiscoverySession::new();
        let signal = StreamSignal::new(SignalType::Answer, json!({"type": "answer", "sdp": ""}));
        assert!(matches!(
            session.send_signal(signal),
            Err(Error::NoSession)
        ));
    }

    #[test]
    fn signals_are_wrapped_in_peer_requests() {
        let session = DiscoverySession::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.attach(tx);
        session.open_session("sess-1".to_string());

        let signal = StreamSignal::new(SignalType::Answer, json!({"type": "answer", "sdp": "v=0"}));
        session.send_signal(signal).unwrap();

        let wire = rx.try_recv().unwrap();
        assert_eq!(wire["type"], "peer");
        assert_eq!(wire["sessionId"], "sess-1");
        assert_eq!(wire["command"], "webrtc");
        assert_eq!(wire["signalType"], "answer");
    }

    #[test]
    fn session_close_clears_binding() {
        let session = DiscoverySession::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        session.attach(tx);
        session.open_session("sess-1".to_string());
        assert!(session.session_matches("sess-1"));

        session.close_session();
        assert!(!session.session_matches("sess-1"));
        let signal = StreamSignal::new(SignalType::Answer, json!({}));
        assert!(matches!(
            session.send_signal(signal),
            Err(Error::NoSession)
        ));
    }
}
