use std::time::Duration;

use anyhow::{Context, Result, bail};

use scenelink_protocol::ProtocolEvent;
use scenelink_runtime::OutboundIntent;

use crate::config::Settings;

use super::{build_manager, wait_for_session};

pub async fn run(
    settings: Settings,
    name: String,
    params: Option<String>,
    addon: Option<String>,
) -> Result<()> {
    let manager = build_manager(&settings);
    let mut events = manager.subscribe_events();
    manager.connect().await?;
    wait_for_session(&manager).await?;

    let mut intent = OutboundIntent::command(&name);
    if let Some(params) = params {
        intent = intent.with_params(
            serde_json::from_str(&params).context("--params must be valid JSON")?,
        );
    }
    if let Some(addon) = addon {
        intent = intent.with_addon_id(addon);
    }

    let outcome = manager.send(intent)?;
    let message_id = outcome
        .message_id()
        .expect("command envelopes always carry an id")
        .to_string();

    let result = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match events.recv().await.context("event stream closed")? {
                ProtocolEvent::CommandCompleted {
                    message_id: id,
                    result,
                } if id == message_id => return Ok(result),
                ProtocolEvent::CommandFailed {
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
    .context("timed out waiting for the command result")??;

    println!("{}", serde_json::to_string_pretty(&result)?);
    manager.disconnect();
    Ok(())
}
