use std::time::Duration;

use anyhow::{Context, Result, bail};

use scenelink_protocol::ProtocolEvent;
use scenelink_runtime::OutboundIntent;

use crate::config::Settings;

use super::{build_manager, wait_for_session};

pub async fn run(settings: Settings, message: String, refresh_context: bool) -> Result<()> {
    let manager = build_manager(&settings);
    let mut events = manager.subscribe_events();
    manager.connect().await?;
    wait_for_session(&manager).await?;

    let mut intent = OutboundIntent::agent(&message).with_refresh_context(refresh_context);
    if let Some(context) = manager.scene_context() {
        intent = intent.with_context(context);
    }

    let outcome = manager.send(intent)?;
    let message_id = outcome
        .message_id()
        .expect("agent envelopes always carry an id")
        .to_string();

    // Agents think; give them longer than commands.
    let response = tokio::time::timeout(Duration::from_secs(300), async {
        loop {
            match events.recv().await.context("event stream closed")? {
                ProtocolEvent::AgentResponse {
                    message_id: id,
                    response,
                    ..
                } if id == message_id => return Ok(response),
                ProtocolEvent::AgentError {
                    message_id: id,
                    error,
                } if id == message_id => {
                    bail!(
                        "{}{}",
                        error.message,
                        error
                            .detail
                            .map(|d| format!(" ({d})"))
                            .unwrap_or_default()
                    )
                }
                _ => {}
            }
        }
    })
    .await
    .context("timed out waiting for the agent response")??;

    println!("{response}");
    manager.disconnect();
    Ok(())
}
