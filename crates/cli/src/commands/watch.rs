use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::broadcast;
use tracing::{info, warn};

use scenelink_runtime::{ConnectionManager, ConnectionState};
use scenelink_streaming::{DiscoveryClient, DiscoverySession, StreamingNegotiator};

use crate::config::Settings;
use crate::stream::{ConsoleMediaSink, ControlChannelSink};

use super::build_manager;

pub async fn run(settings: Settings, stream: bool, discover: bool) -> Result<()> {
    let manager = build_manager(&settings);
    let mut events = manager.subscribe_events();
    let mut state_rx = manager.watch_state();
    manager.connect().await?;

    if stream {
        if discover {
            spawn_discovery_streaming(&settings, &manager)?;
        } else {
            spawn_control_channel_streaming(&manager);
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; disconnecting");
                manager.disconnect();
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            changed = state_rx.changed() => {
                changed.context("connection manager went away")?;
                let state = *state_rx.borrow_and_update();
                info!(?state, "session state changed");
            }
        }
    }
}

/// Topology (a): signal over the session transport; we send the offer once
/// the session reaches full connectivity.
fn spawn_control_channel_streaming(manager: &Arc<ConnectionManager>) {
    let negotiator = Arc::new(StreamingNegotiator::new(
        ControlChannelSink::new(Arc::clone(manager)),
        ConsoleMediaSink::new(),
    ));

    // Inbound signals from the control channel feed the negotiation.
    {
        let negotiator = Arc::clone(&negotiator);
        let mut signals = manager.subscribe_signals();
        tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(signal) => {
                        if let Err(e) = negotiator.handle_signal(signal).await {
                            warn!(error = %e, "streaming signal rejected");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "streaming signals lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    // Negotiate on full connectivity, tear down when the session drops.
    let mut state_rx = manager.watch_state();
    tokio::spawn(async move {
        loop {
            let state = *state_rx.borrow_and_update();
            match state {
                ConnectionState::FullyConnected => {
                    if !negotiator.is_active() {
                        if let Err(e) = negotiator.connect().await {
                            warn!(error = %e, "streaming unavailable; staying on frames");
                        }
                    }
                }
                ConnectionState::Disconnected | ConnectionState::ServerUnavailable => {
                    negotiator.shutdown().await;
                }
                _ => {}
            }
            if state_rx.changed().await.is_err() {
                negotiator.shutdown().await;
                break;
            }
        }
    });
}

/// Topology (b): discovery endpoint announces producers; the producer
/// offers, we answer.
fn spawn_discovery_streaming(
    settings: &Settings,
    manager: &Arc<ConnectionManager>,
) -> Result<()> {
    let Some(signaling_url) = settings.signaling_url.clone() else {
        bail!("--discover needs a signaling endpoint; pass --signaling or set SCENELINK_SIGNALING");
    };
    let Some(producer) = settings.producer_identity.clone() else {
        bail!("--discover needs a producer identity; pass --producer or set SCENELINK_PRODUCER");
    };

    let session = DiscoverySession::new();
    let negotiator = Arc::new(StreamingNegotiator::new(
        Arc::clone(&session) as Arc<dyn scenelink_streaming::SignalSink>,
        ConsoleMediaSink::new(),
    ));

    let mut state_rx = manager.watch_state();
    tokio::spawn(async move {
        // Hold discovery until the engine is actually producing.
        loop {
            if *state_rx.borrow_and_update() == ConnectionState::FullyConnected {
                break;
            }
            if state_rx.changed().await.is_err() {
                return;
            }
        }
        let client = DiscoveryClient::new(signaling_url, producer);
        if let Err(e) = client.run(&negotiator, &session).await {
            warn!(error = %e, "discovery streaming ended; staying on frames");
        }
    });
    Ok(())
}
