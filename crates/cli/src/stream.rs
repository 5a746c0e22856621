//! Glue between the session connection and the streaming negotiator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use scenelink_protocol::StreamSignal;
use scenelink_runtime::ConnectionManager;
use scenelink_streaming::{Error as StreamError, MediaSink, SignalSink, TrackRemote};

/// Control-channel topology: signals ride the session transport.
pub struct ControlChannelSink {
    manager: Arc<ConnectionManager>,
}

impl ControlChannelSink {
    pub fn new(manager: Arc<ConnectionManager>) -> Arc<Self> {
        Arc::new(Self { manager })
    }
}

impl SignalSink for ControlChannelSink {
    fn send_signal(&self, signal: StreamSignal) -> scenelink_streaming::Result<()> {
        self.manager
            .send_signal(&signal)
            .map_err(|e| StreamError::Signaling(e.to_string()))
    }
}

/// Drains remote viewport media, reporting packet counts at debug level.
/// A real consumer would hand the track to a decoder.
pub struct ConsoleMediaSink;

impl ConsoleMediaSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl MediaSink for ConsoleMediaSink {
    fn bind_track(&self, track: Arc<TrackRemote>) {
        info!(kind = %track.kind(), "viewport stream bound");
        tokio::spawn(async move {
            let packets = AtomicU64::new(0);
            loop {
                match track.read_rtp().await {
                    Ok(_) => {
                        let count = packets.fetch_add(1, Ordering::Relaxed) + 1;
                        if count % 500 == 0 {
                            debug!(count, "viewport RTP packets received");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "viewport track ended");
                        break;
                    }
                }
            }
        });
    }
}
