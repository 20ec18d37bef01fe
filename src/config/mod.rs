use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::host::DEFAULT_INSTANCE;

/// Complete relay configuration.
///
/// Loaded from an optional TOML file, then overridden by environment
/// variables (see [`RelayConfig::apply_env`]), then validated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Source platform API access.
#[derive(Clone, Deserialize)]
pub struct SourceConfig {
    /// API base URL, e.g. `https://eu.example-rmm.com`
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Per-request timeout for the token exchange and activity fetch
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// Keep the client secret out of logs
impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Downstream webhook delivery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub webhook_url: String,
    /// Log activities instead of posting them
    #[serde(default)]
    pub test_mode: bool,
    /// Requests schema transformation; no transform beyond identity exists yet
    #[serde(default)]
    pub transform_enabled: bool,
}

/// Collection cycle timing and identity.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Delay between the end of one cycle and the next wake
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// How often the alarm driver checks for a due wake
    #[serde(default = "default_alarm_tick")]
    pub alarm_tick_millis: u64,
    /// Logical singleton name the durable state is scoped to
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_alarm_tick() -> u64 {
    1000
}

fn default_instance_name() -> String {
    DEFAULT_INSTANCE.to_string()
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            alarm_tick_millis: default_alarm_tick(),
            instance_name: default_instance_name(),
        }
    }
}

/// Durable state location.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "relay.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Inbound HTTP surface.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8787
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl RelayConfig {
    /// Loads configuration for the running process.
    ///
    /// Reads the TOML file named by `RELAY_CONFIG` when set, applies
    /// environment overrides and validates the result.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("RELAY_CONFIG") {
            Ok(path) => load_config(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides settings from environment variables, when present.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("SOURCE_API_BASE_URL") {
            self.source.base_url = v;
        }
        if let Ok(v) = std::env::var("SOURCE_CLIENT_ID") {
            self.source.client_id = v;
        }
        if let Ok(v) = std::env::var("SOURCE_CLIENT_SECRET") {
            self.source.client_secret = v;
        }
        if let Ok(v) = std::env::var("SOURCE_REQUEST_TIMEOUT_SECS") {
            self.source.request_timeout_secs = v
                .parse()
                .context("SOURCE_REQUEST_TIMEOUT_SECS must be a number of seconds")?;
        }
        if let Ok(v) = std::env::var("WEBHOOK_URL") {
            self.sink.webhook_url = v;
        }
        if let Ok(v) = std::env::var("TEST_MODE") {
            self.sink.test_mode = v == "true";
        }
        if let Ok(v) = std::env::var("TRANSFORM_ENABLED") {
            self.sink.transform_enabled = v == "true";
        }
        if let Ok(v) = std::env::var("RELAY_POLL_INTERVAL_SECS") {
            self.collector.poll_interval_secs = v
                .parse()
                .context("RELAY_POLL_INTERVAL_SECS must be a number of seconds")?;
        }
        if let Ok(v) = std::env::var("RELAY_ALARM_TICK_MILLIS") {
            self.collector.alarm_tick_millis = v
                .parse()
                .context("RELAY_ALARM_TICK_MILLIS must be a number of milliseconds")?;
        }
        if let Ok(v) = std::env::var("RELAY_INSTANCE_NAME") {
            self.collector.instance_name = v;
        }
        if let Ok(v) = std::env::var("RELAY_DB_PATH") {
            self.storage.db_path = v;
        }
        if let Ok(v) = std::env::var("RELAY_API_PORT") {
            self.api.port = v
                .parse()
                .context("RELAY_API_PORT must be a valid port number")?;
        }
        Ok(())
    }

    /// Checks required settings and normalizes the base URL.
    pub fn validate(&mut self) -> Result<()> {
        self.source.base_url = self.source.base_url.trim_end_matches('/').to_string();

        if self.source.base_url.is_empty() {
            bail!("SOURCE_API_BASE_URL is required (source.base_url)");
        }
        if self.source.client_id.is_empty() {
            bail!("SOURCE_CLIENT_ID is required (source.client_id)");
        }
        if self.source.client_secret.is_empty() {
            bail!("SOURCE_CLIENT_SECRET is required (source.client_secret)");
        }
        if self.sink.webhook_url.is_empty() && !self.sink.test_mode {
            bail!("WEBHOOK_URL is required unless TEST_MODE=true (sink.webhook_url)");
        }
        if self.collector.poll_interval_secs == 0 {
            bail!("collector.poll_interval_secs must be greater than zero");
        }
        if self.collector.alarm_tick_millis == 0 {
            bail!("collector.alarm_tick_millis must be greater than zero");
        }
        Ok(())
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<RelayConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: RelayConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}
