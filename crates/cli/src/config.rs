//! Environment-backed settings, overridable by flags.

use std::sync::Arc;

use anyhow::{Context, Result};
use url::Url;

use scenelink_runtime::{ConfigSource, SessionConfig};

use crate::cli::Cli;

/// Resolved configuration for one invocation. Consumed read-only.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub signaling_url: Option<String>,
    pub producer_identity: Option<String>,
    pub identity: Option<String>,
    pub target_resource: String,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Settings {
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let server_url = cli
            .server
            .clone()
            .or_else(|| env_var("SCENELINK_SERVER"))
            .context("no backend endpoint; pass --server or set SCENELINK_SERVER")?;
        Url::parse(&server_url)
            .with_context(|| format!("invalid backend endpoint: {server_url}"))?;

        let signaling_url = cli.signaling.clone().or_else(|| env_var("SCENELINK_SIGNALING"));
        if let Some(url) = &signaling_url {
            Url::parse(url).with_context(|| format!("invalid signaling endpoint: {url}"))?;
        }

        let target_resource = cli
            .scene
            .clone()
            .or_else(|| env_var("SCENELINK_SCENE"))
            .context("no scene resource; pass --scene or set SCENELINK_SCENE")?;

        Ok(Self {
            server_url,
            signaling_url,
            producer_identity: cli.producer.clone().or_else(|| env_var("SCENELINK_PRODUCER")),
            identity: cli.identity.clone().or_else(|| env_var("SCENELINK_IDENTITY")),
            target_resource,
        })
    }

    /// Read accessor handed to the connection manager.
    pub fn config_source(&self) -> Arc<dyn ConfigSource> {
        let identity = self.identity.clone();
        let target_resource = self.target_resource.clone();
        Arc::new(move || SessionConfig {
            identity: identity.clone(),
            target_resource: target_resource.clone(),
        })
    }
}
