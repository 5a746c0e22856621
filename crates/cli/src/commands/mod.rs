use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use scenelink_runtime::{ConnectionManager, ConnectionState, WsConnector};

use crate::cli::{Cli, Commands};
use crate::config::Settings;

mod ask;
mod command;
mod watch;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let settings = Settings::resolve(&cli)?;
    match cli.command {
        Commands::Watch { stream, discover } => watch::run(settings, stream, discover).await,
        Commands::Command {
            name,
            params,
            addon,
        } => command::run(settings, name, params, addon).await,
        Commands::Ask {
            message,
            refresh_context,
        } => ask::run(settings, message, refresh_context).await,
    }
}

fn build_manager(settings: &Settings) -> Arc<ConnectionManager> {
    let connector = Arc::new(WsConnector::new(settings.server_url.clone()));
    Arc::new(ConnectionManager::new(connector, settings.config_source()))
}

/// Wait until the backend session handshake completes.
async fn wait_for_session(manager: &ConnectionManager) -> Result<()> {
    let mut state_rx = manager.watch_state();
    let deadline = Duration::from_secs(30);
    tokio::time::timeout(deadline, async {
        loop {
            let state = *state_rx.borrow_and_update();
            match state {
                ConnectionState::BrowserConnected
                | ConnectionState::FullyConnected
                | ConnectionState::EngineDisconnected => return Ok(()),
                ConnectionState::ServerUnavailable => {
                    bail!("backend declared unreachable")
                }
                _ => {}
            }
            state_rx
                .changed()
                .await
                .context("connection manager went away")?;
        }
    })
    .await
    .context("timed out waiting for the session handshake")?
}
