//! NATS plumbing between the engine and the send workers.

pub mod listener;
pub mod publisher;

pub use listener::StatusListener;
pub use publisher::NatsDispatchQueue;

use campaign_core::config::NatsConfig;
use tracing::info;

/// Connect to the first configured NATS server.
pub async fn connect(config: &NatsConfig) -> anyhow::Result<async_nats::Client> {
    let url = config
        .urls
        .first()
        .cloned()
        .unwrap_or_else(|| "nats://localhost:4222".to_string());

    info!(url = %url, "Connecting to NATS");
    let client = async_nats::ConnectOptions::new()
        .max_reconnects(Some(config.max_reconnects))
        .connect(&url)
        .await?;
    info!("NATS connection established");
    Ok(client)
}
