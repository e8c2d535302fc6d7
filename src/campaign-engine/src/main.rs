//! Campaign Engine: campaign orchestration and audience targeting service.
//!
//! Main entry point that wires the store, engine, NATS dispatch and REST API.

mod server;

use std::sync::Arc;
use std::time::Duration;

use campaign_core::config::AppConfig;
use campaign_core::dispatch::{noop_dispatch, DispatchQueue};
use campaign_dispatch::{NatsDispatchQueue, StatusListener};
use campaign_management::ManagementState;
use campaign_orchestration::CampaignEngine;
use campaign_store::{CampaignStore, DEMO_USER_ID};
use clap::Parser;
use tracing::{error, info, warn};

use crate::server::ApiServer;

#[derive(Parser, Debug)]
#[command(name = "campaign-engine")]
#[command(about = "Campaign orchestration and audience targeting engine")]
#[command(version)]
struct Cli {
    /// Optional TOML config file; environment variables still apply on top
    #[arg(long, env = "CAMPAIGN_ENGINE_CONFIG")]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "CAMPAIGN_ENGINE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CAMPAIGN_ENGINE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Skip NATS and drop dispatch triggers (API-only mode)
    #[arg(long, default_value_t = false)]
    api_only: bool,

    /// Load demo workspaces and contacts on startup
    #[arg(long, default_value_t = false)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_engine=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Campaign Engine starting up");

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        nats_enabled = config.nats.enabled && !cli.api_only,
        "Configuration loaded"
    );

    let store = Arc::new(CampaignStore::new());
    if cli.seed_demo {
        store.seed_demo_data();
        info!(user_id = %DEMO_USER_ID, "Demo data seeded");
    }

    // NATS is optional: without it dispatch triggers are dropped and workers
    // report status over REST.
    let nats = if config.nats.enabled && !cli.api_only {
        match campaign_dispatch::connect(&config.nats).await {
            Ok(client) => Some(client),
            Err(e) => {
                error!(error = %e, "Failed to connect to NATS, running without dispatch");
                None
            }
        }
    } else {
        info!("Running in API-only mode (no NATS dispatch)");
        None
    };

    let dispatch: Arc<dyn DispatchQueue> = match &nats {
        Some(client) => Arc::new(NatsDispatchQueue::spawn(
            client.clone(),
            config.nats.dispatch_subject(),
            config.nats.queue_capacity,
        )),
        None => noop_dispatch(),
    };

    let engine = Arc::new(CampaignEngine::new(
        store.clone(),
        dispatch,
        config.engine.clone(),
    ));

    if let Some(client) = nats {
        StatusListener::new(config.node_id.clone(), engine.clone())
            .spawn(client, config.nats.status_subject());
    }

    // Scheduled-launch sweep.
    let scheduler_engine = engine.clone();
    let period = Duration::from_secs(config.engine.scheduler_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            scheduler_engine.launch_due_scheduled(chrono::Utc::now());
        }
    });

    let api_server = ApiServer::new(
        config.clone(),
        ManagementState::new(engine, config.node_id.clone()),
    );

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Campaign Engine is ready to serve traffic");

    api_server.start_http().await?;

    Ok(())
}
