//! Streaming negotiator: one peer connection, gracefully degraded.
//!
//! The negotiator owns at most one peer connection at a time. Establishment
//! is guarded by a phase flag read under the lock at call time — a
//! re-entrant `connect()` is refused rather than racing a second peer
//! connection into existence. Any peer failure tears the session down and
//! flips the availability watch to false; the session itself is untouched.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_remote::TrackRemote;

use scenelink_protocol::{IceCandidateData, SdpData, SignalType, StreamSignal};

use crate::error::{Error, Result};

/// Outbound signaling seam. The control-channel topology adapts the
/// session connection to this; the discovery topology uses
/// [`crate::DiscoverySession`].
pub trait SignalSink: Send + Sync {
    fn send_signal(&self, signal: StreamSignal) -> Result<()>;
}

/// Where remote media lands once negotiated.
pub trait MediaSink: Send + Sync {
    fn bind_track(&self, track: Arc<TrackRemote>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting,
    Connected,
}

/// Negotiates and maintains the peer-to-peer media session.
pub struct StreamingNegotiator {
    inner: Arc<NegotiatorInner>,
}

struct NegotiatorInner {
    signals: Arc<dyn SignalSink>,
    media: Arc<dyn MediaSink>,
    phase: Mutex<Phase>,
    peer: Mutex<Option<Arc<RTCPeerConnection>>>,
    available_tx: watch::Sender<bool>,
    ice_servers: Vec<String>,
    /// Bumped on every new peer connection and every explicit teardown.
    /// Peer-connection callbacks carry the generation they were registered
    /// under and are discarded when it is stale, so a dying old peer can
    /// never tear down its replacement.
    generation: AtomicU64,
}

impl StreamingNegotiator {
    pub fn new(signals: Arc<dyn SignalSink>, media: Arc<dyn MediaSink>) -> Self {
        let (available_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(NegotiatorInner {
                signals,
                media,
                phase: Mutex::new(Phase::Idle),
                peer: Mutex::new(None),
                available_tx,
                ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Replaces the ICE server list. Call before `connect()`.
    pub fn with_ice_servers(mut self, servers: Vec<String>) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_ice_servers called after the negotiator was shared")
            .ice_servers = servers;
        self
    }

    /// True while streaming media is flowing.
    pub fn watch_available(&self) -> watch::Receiver<bool> {
        self.inner.available_tx.subscribe()
    }

    /// Whether a negotiation is connected or in flight.
    pub fn is_active(&self) -> bool {
        *self.inner.phase.lock() != Phase::Idle
    }

    /// Start a client-initiated negotiation (control-channel topology):
    /// create the peer connection and send an offer.
    ///
    /// Refused while a negotiation is already connected or connecting —
    /// the phase is read at call time, so re-entrant calls cannot race a
    /// duplicate peer connection into existence.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut phase = self.inner.phase.lock();
            if *phase != Phase::Idle {
                return Err(Error::AlreadyActive);
            }
            *phase = Phase::Connecting;
        }
        if let Err(e) = self.inner.establish_as_offerer().await {
            self.inner.teardown().await;
            return Err(e);
        }
        Ok(())
    }

    /// Feed one inbound signal to the negotiation.
    ///
    /// Signals arriving after teardown are ignored: the peer connection is
    /// read at call time, and a missing one means the negotiation is over.
    pub async fn handle_signal(&self, signal: StreamSignal) -> Result<()> {
        match signal.signal_type {
            SignalType::Offer => self.inner.accept_offer(signal.signal_data).await,
            SignalType::Answer => self.inner.apply_answer(signal.signal_data).await,
            SignalType::IceCandidate => self.inner.add_remote_candidate(signal.signal_data).await,
        }
    }

    /// Tear down the peer connection, if any. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.teardown().await;
    }
}

impl NegotiatorInner {
    async fn new_peer(self: &Arc<Self>) -> Result<Arc<RTCPeerConnection>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let peer = Arc::new(api.new_peer_connection(config).await?);

        // We only ever consume the viewport stream.
        peer.add_transceiver_from_kind(
            RTPCodecType::Video,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await?;

        let inner = Arc::clone(self);
        peer.on_track(Box::new(move |track, _receiver, _transceiver| {
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                if inner.generation.load(Ordering::SeqCst) == generation {
                    inner.on_remote_track(track);
                }
            })
        }));

        let inner = Arc::clone(self);
        peer.on_ice_candidate(Box::new(move |candidate| {
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                if inner.generation.load(Ordering::SeqCst) == generation {
                    inner.forward_local_candidate(&candidate);
                }
            })
        }));

        let inner = Arc::clone(self);
        peer.on_peer_connection_state_change(Box::new(move |state| {
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                // Stale generation: this peer was already replaced or torn
                // down; its state changes are nobody's business.
                if inner.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                match state {
                    RTCPeerConnectionState::Connected => {
                        *inner.phase.lock() = Phase::Connected;
                        tracing::info!("streaming peer connected");
                    }
                    RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Disconnected
                    | RTCPeerConnectionState::Closed => {
                        tracing::info!(?state, "streaming peer lost; falling back to frames");
                        inner.teardown().await;
                    }
                    _ => {}
                }
            })
        }));

        Ok(peer)
    }

    async fn establish_as_offerer(self: &Arc<Self>) -> Result<()> {
        let peer = self.new_peer().await?;
        *self.peer.lock() = Some(Arc::clone(&peer));

        let offer = peer.create_offer(None).await?;
        let sdp = SdpData {
            sdp_type: "offer".to_string(),
            sdp: offer.sdp.clone(),
        };
        peer.set_local_description(offer).await?;
        self.signals.send_signal(StreamSignal::new(
            SignalType::Offer,
            serde_json::to_value(&sdp)?,
        ))?;
        tracing::debug!("streaming offer sent");
        Ok(())
    }

    /// Producer-initiated negotiation (discovery topology): answer an
    /// inbound offer.
    async fn accept_offer(self: &Arc<Self>, data: Value) -> Result<()> {
        {
            let mut phase = self.phase.lock();
            if *phase != Phase::Idle {
                tracing::warn!("offer received while a negotiation is active; refusing");
                return Err(Error::AlreadyActive);
            }
            *phase = Phase::Connecting;
        }
        if let Err(e) = self.answer_offer(data).await {
            self.teardown().await;
            return Err(e);
        }
        Ok(())
    }

    async fn answer_offer(self: &Arc<Self>, data: Value) -> Result<()> {
        let peer = self.new_peer().await?;
        *self.peer.lock() = Some(Arc::clone(&peer));

        let sdp: SdpData = serde_json::from_value(data)?;
        peer.set_remote_description(RTCSessionDescription::offer(sdp.sdp)?)
            .await?;
        let answer = peer.create_answer(None).await?;
        let reply = SdpData {
            sdp_type: "answer".to_string(),
            sdp: answer.sdp.clone(),
        };
        peer.set_local_description(answer).await?;
        self.signals.send_signal(StreamSignal::new(
            SignalType::Answer,
            serde_json::to_value(&reply)?,
        ))?;
        tracing::debug!("streaming answer sent");
        Ok(())
    }

    async fn apply_answer(&self, data: Value) -> Result<()> {
        let Some(peer) = self.current_peer() else {
            tracing::debug!("answer after teardown; ignoring");
            return Ok(());
        };
        let sdp: SdpData = serde_json::from_value(data)?;
        peer.set_remote_description(RTCSessionDescription::answer(sdp.sdp)?)
            .await?;
        Ok(())
    }

    async fn add_remote_candidate(&self, data: Value) -> Result<()> {
        // No further ICE accepted after close.
        let Some(peer) = self.current_peer() else {
            tracing::debug!("ICE candidate after teardown; ignoring");
            return Ok(());
        };
        let data: IceCandidateData = serde_json::from_value(data)?;
        peer.add_ice_candidate(RTCIceCandidateInit {
            candidate: data.candidate,
            sdp_mid: data.sdp_mid,
            sdp_mline_index: data.sdp_m_line_index,
            username_fragment: None,
        })
        .await?;
        Ok(())
    }

    fn current_peer(&self) -> Option<Arc<RTCPeerConnection>> {
        self.peer.lock().clone()
    }

    fn forward_local_candidate(&self, candidate: &webrtc::ice_transport::ice_candidate::RTCIceCandidate) {
        if self.current_peer().is_none() {
            return;
        }
        match candidate.to_json() {
            Ok(init) => {
                let data = IceCandidateData {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                };
                match serde_json::to_value(&data) {
                    Ok(value) => {
                        if let Err(e) = self
                            .signals
                            .send_signal(StreamSignal::new(SignalType::IceCandidate, value))
                        {
                            tracing::debug!(error = %e, "dropping local ICE candidate");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "ICE candidate serialization failed"),
                }
            }
            Err(e) => tracing::warn!(error = %e, "ICE candidate marshalling failed"),
        }
    }

    fn on_remote_track(&self, track: Arc<TrackRemote>) {
        tracing::info!(
            kind = %track.kind(),
            ssrc = track.ssrc(),
            "remote viewport track arrived"
        );
        self.media.bind_track(track);
        // Flips to true exactly once per established connection.
        self.available_tx.send_if_modified(|available| {
            if *available {
                false
            } else {
                *available = true;
                true
            }
        });
    }

    async fn teardown(self: &Arc<Self>) {
        // Invalidate callbacks from the peer being dropped, then take it
        // so re-entrant teardown finds nothing to do.
        self.generation.fetch_add(1, Ordering::SeqCst);
        let peer = self.peer.lock().take();
        *self.phase.lock() = Phase::Idle;
        self.available_tx.send_if_modified(|available| {
            if *available {
                *available = false;
                true
            } else {
                false
            }
        });
        if let Some(peer) = peer {
            if let Err(e) = peer.close().await {
                tracing::debug!(error = %e, "peer close reported an error");
            }
            tracing::info!("streaming session torn down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingSink {
        sent: Mutex<Vec<StreamSignal>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        /// ICE candidates trickle in on gatherer threads; count only the
        /// deterministic offer/answer traffic.
        fn offers(&self) -> usize {
            self.sent
                .lock()
                .iter()
                .filter(|s| s.signal_type == SignalType::Offer)
                .count()
        }
    }

    impl SignalSink for RecordingSink {
        fn send_signal(&self, signal: StreamSignal) -> Result<()> {
            self.sent.lock().push(signal);
            Ok(())
        }
    }

    struct NullMedia;

    impl MediaSink for NullMedia {
        fn bind_track(&self, _track: Arc<TrackRemote>) {}
    }

    fn negotiator(sink: Arc<RecordingSink>) -> StreamingNegotiator {
        StreamingNegotiator::new(sink, Arc::new(NullMedia))
    }

    #[tokio::test]
    async fn connect_sends_an_offer() {
        let sink = RecordingSink::new();
        let negotiator = negotiator(Arc::clone(&sink));

        negotiator.connect().await.unwrap();
        let sent = sink.sent.lock();
        let offer = sent
            .iter()
            .find(|s| s.signal_type == SignalType::Offer)
            .expect("no offer sent");
        assert_eq!(offer.command, "webrtc");
        assert!(
            offer.signal_data["sdp"]
                .as_str()
                .is_some_and(|sdp| sdp.starts_with("v=0"))
        );
    }

    #[tokio::test]
    async fn reentrant_connect_is_refused() {
        let sink = RecordingSink::new();
        let negotiator = negotiator(Arc::clone(&sink));

        negotiator.connect().await.unwrap();
        assert!(negotiator.is_active());
        assert!(matches!(
            negotiator.connect().await,
            Err(Error::AlreadyActive)
        ));
        // Still exactly one offer on the wire.
        assert_eq!(sink.offers(), 1);
    }

    #[tokio::test]
    async fn shutdown_returns_to_idle_and_ignores_late_signals() {
        let sink = RecordingSink::new();
        let negotiator = negotiator(Arc::clone(&sink));

        negotiator.connect().await.unwrap();
        negotiator.shutdown().await;
        assert!(!negotiator.is_active());
        assert!(!*negotiator.watch_available().borrow());

        // Late ICE after teardown: ignored, not an error.
        let late = StreamSignal::new(
            SignalType::IceCandidate,
            serde_json::json!({"candidate": "candidate:1 1 UDP 1 127.0.0.1 9 typ host"}),
        );
        negotiator.handle_signal(late).await.unwrap();

        // And the slot is free for a fresh negotiation.
        negotiator.connect().await.unwrap();
        assert_eq!(sink.offers(), 2);
    }

    #[tokio::test]
    async fn availability_starts_false() {
        let sink = RecordingSink::new();
        let negotiator = negotiator(sink);
        assert!(!*negotiator.watch_available().borrow());
    }

    #[tokio::test]
    async fn answer_after_teardown_is_ignored() {
        let sink = RecordingSink::new();
        let negotiator = negotiator(sink);
        let answer = StreamSignal::new(
            SignalType::Answer,
            serde_json::json!({"type": "answer", "sdp": "v=0\r\n"}),
        );
        negotiator.handle_signal(answer).await.unwrap();
        assert!(!negotiator.is_active());
    }
}
