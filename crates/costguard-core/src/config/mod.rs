//! Deployment configuration.
//!
//! Loaded from TOML. Discovery reads `~/.costguard/config.toml` and then
//! `./costguard.toml`, merging tables so the local file overrides single keys
//! of the global one. Environment overrides are applied last.

use crate::analytics::{PolicyConfig, PolicyKind, ThresholdConfigError};
use crate::notify::AlertOn;
use crate::sources::Granularity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default store key of the prediction artifact.
pub const DEFAULT_STORE_KEY: &str = "predicted_cost.json";

/// Days of history fetched for a forecast.
pub const DEFAULT_HISTORY_DAYS: u32 = 60;

/// Errors that can occur during configuration loading.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// A required adapter parameter is absent.
    #[error("Missing configuration value: {0}")]
    Missing(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Rejected policy threshold.
    #[error(transparent)]
    Threshold(#[from] ThresholdConfigError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Where cost data is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Billing history JSON file.
    #[default]
    File,
    /// Cost-explorer style HTTP endpoint.
    Http,
}

/// `[source]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source backend.
    pub kind: SourceKind,
    /// History file for `kind = "file"`.
    pub path: Option<PathBuf>,
    /// Endpoint for `kind = "http"`.
    pub url: Option<String>,
    /// Days of history used for forecasting.
    pub history_days: u32,
    /// HTTP request timeout.
    pub timeout_secs: u64,
    /// Granularity of the verify fetch.
    pub granularity: Granularity,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::File,
            path: None,
            url: None,
            history_days: DEFAULT_HISTORY_DAYS,
            timeout_secs: 30,
            granularity: Granularity::Daily,
        }
    }
}

/// Where predictions are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// One JSON file per key in a directory.
    #[default]
    File,
    /// SQLite database file.
    Sqlite,
    /// Process memory; lost on exit.
    Memory,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store backend.
    pub kind: StoreKind,
    /// Directory (`file`) or database file (`sqlite`).
    pub path: Option<PathBuf>,
    /// Key the prediction is stored under.
    pub key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            path: None,
            key: DEFAULT_STORE_KEY.to_string(),
        }
    }
}

/// How alerts are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Alerts become `warn` log events.
    #[default]
    Log,
    /// Alerts are POSTed as JSON.
    Webhook,
}

/// `[notifier]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Notifier backend.
    pub kind: NotifierKind,
    /// Webhook endpoint.
    pub url: Option<String>,
    /// Optional bearer token for the webhook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Channel (topic) alerts are published to.
    pub channel: String,
    /// Subject override for anomaly alerts.
    pub subject: Option<String>,
    /// Which verdicts are published.
    pub alert_on: AlertOn,
    /// Webhook request timeout.
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
            url: None,
            token: None,
            channel: "cost-alerts".to_string(),
            subject: None,
            alert_on: AlertOn::Anomaly,
            timeout_secs: 10,
        }
    }
}

/// Full deployment configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cost data source.
    pub source: SourceConfig,
    /// Prediction store.
    pub store: StoreConfig,
    /// Deviation policy.
    pub policy: PolicyConfig,
    /// Alert delivery.
    pub notifier: NotifierConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        Self::from_table(read_table(path)?)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?;
        Self::from_table(table)
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".costguard")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("costguard.toml")
    }

    /// Discover and load configuration files.
    ///
    /// Loads configuration from:
    /// 1. Global config (~/.costguard/config.toml)
    /// 2. Local config (./costguard.toml)
    ///
    /// Missing files are skipped; a file that exists but does not parse is an
    /// error.
    pub fn discover_and_load() -> ConfigResult<Self> {
        Self::load_layers(&[Self::default_global_path(), Self::default_local_path()])
    }

    /// Loads and merges `paths` in order, later files overriding earlier ones.
    pub fn load_layers(paths: &[PathBuf]) -> ConfigResult<Self> {
        let mut merged = toml::Table::new();
        for path in paths {
            if !path.exists() {
                continue;
            }
            debug!(path = %path.display(), "Loading configuration layer");
            merge_tables(&mut merged, read_table(path)?);
        }
        Self::from_table(merged)
    }

    /// Applies `COSTGUARD_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides read through `lookup`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup("COSTGUARD_POLICY") {
            let kind: PolicyKind = kind
                .parse()
                .map_err(|e: String| ConfigError::InvalidValue(format!("COSTGUARD_POLICY: {}", e)))?;
            if kind != self.policy.kind {
                // A value tuned for the other policy is meaningless here.
                self.policy.value = None;
            }
            self.policy.kind = kind;
        }
        if let Some(threshold) = lookup("COSTGUARD_THRESHOLD") {
            let value: f64 = threshold.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!("COSTGUARD_THRESHOLD: '{}' is not a number", threshold))
            })?;
            self.policy.value = Some(value);
        }
        if let Some(channel) = lookup("COSTGUARD_CHANNEL") {
            self.notifier.channel = channel;
        }
        if let Some(path) = lookup("COSTGUARD_STORE_PATH") {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("COSTGUARD_SOURCE_PATH") {
            self.source.path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Checks thresholds and required adapter parameters.
    pub fn validate(&self) -> ConfigResult<()> {
        self.policy.validate()?;

        if self.source.history_days < 2 {
            return Err(ConfigError::InvalidValue(format!(
                "source.history_days must be at least 2, got {}",
                self.source.history_days
            )));
        }
        match self.source.kind {
            SourceKind::File if self.source.path.is_none() => {
                return Err(ConfigError::Missing("source.path is required for kind = \"file\"".to_string()));
            }
            SourceKind::Http if self.source.url.is_none() => {
                return Err(ConfigError::Missing("source.url is required for kind = \"http\"".to_string()));
            }
            _ => {}
        }

        if self.store.key.trim().is_empty() {
            return Err(ConfigError::InvalidValue("store.key must not be empty".to_string()));
        }
        if matches!(self.store.kind, StoreKind::File | StoreKind::Sqlite) && self.store.path.is_none() {
            return Err(ConfigError::Missing(format!(
                "store.path is required for kind = \"{}\"",
                match self.store.kind {
                    StoreKind::Sqlite => "sqlite",
                    _ => "file",
                }
            )));
        }

        if self.notifier.kind == NotifierKind::Webhook && self.notifier.url.is_none() {
            return Err(ConfigError::Missing(
                "notifier.url is required for kind = \"webhook\"".to_string(),
            ));
        }

        Ok(())
    }

    fn from_table(table: toml::Table) -> ConfigResult<Self> {
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))
    }
}

fn read_table(path: &Path) -> ConfigResult<toml::Table> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

    content
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
}

/// Recursively merges `overlay` into `base`; overlay scalars win.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
