use serde::Deserialize;

use crate::audience::MissingParameterPolicy;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CAMPAIGN_ENGINE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_nats_enabled")]
    pub enabled: bool,
    #[serde(default = "default_nats_urls")]
    pub urls: Vec<String>,
    /// Subjects are `<prefix>.campaign-dispatch` and `<prefix>.recipient-status`.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default = "default_nats_max_reconnects")]
    pub max_reconnects: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Tunables for the orchestration engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_preview_sample_size")]
    pub preview_sample_size: usize,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    #[serde(default)]
    pub missing_audience_parameter: MissingParameterPolicy,
    #[serde(default = "default_scheduler_interval_secs")]
    pub scheduler_interval_secs: u64,
    #[serde(default = "default_dispatch_batch_limit")]
    pub dispatch_batch_limit: usize,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_nats_enabled() -> bool {
    false
}
fn default_nats_urls() -> Vec<String> {
    vec!["nats://localhost:4222".to_string()]
}
fn default_subject_prefix() -> String {
    "campaigns".to_string()
}
fn default_nats_max_reconnects() -> usize {
    60
}
fn default_queue_capacity() -> usize {
    10_000
}
fn default_preview_sample_size() -> usize {
    5
}
fn default_page_size() -> usize {
    25
}
fn default_max_page_size() -> usize {
    100
}
fn default_scheduler_interval_secs() -> u64 {
    30
}
fn default_dispatch_batch_limit() -> usize {
    500
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            enabled: default_nats_enabled(),
            urls: default_nats_urls(),
            subject_prefix: default_subject_prefix(),
            max_reconnects: default_nats_max_reconnects(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl NatsConfig {
    pub fn dispatch_subject(&self) -> String {
        format!("{}.campaign-dispatch", self.subject_prefix)
    }

    pub fn status_subject(&self) -> String {
        format!("{}.recipient-status", self.subject_prefix)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_sample_size: default_preview_sample_size(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            missing_audience_parameter: MissingParameterPolicy::default(),
            scheduler_interval_secs: default_scheduler_interval_secs(),
            dispatch_batch_limit: default_dispatch_batch_limit(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            nats: NatsConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and the environment.
    /// Environment variables win over file values.
    pub fn load(file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_ENGINE")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("nats.urls"),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
