/// Kapacitor API client implementation
pub mod client;
pub mod models;

use anyhow::{Context, Result};
use tracing::info;

pub use client::{KapacitorClient, TaskApi};

use crate::config::ProviderConfig;

/// Build a client from provider settings and make sure the server answers
pub async fn configure(config: &ProviderConfig) -> Result<KapacitorClient> {
    let client = KapacitorClient::new(config).context("error creating client")?;

    let version = client.ping().await.context("error pinging server")?;
    info!("Connected to Kapacitor {} at {}", version, config.url);

    Ok(client)
}
