//! # labelsync-config
//!
//! Configuration for the labelsync controller.
//!
//! Values are layered with the `config` crate:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (explicit path, or `labelsync.toml` in the
//!    working directory)
//! 3. Environment overrides, e.g. `LABELSYNC__CONTROLLER__WORKERS=4`
//!
//! The merged result is validated before it is returned.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default file looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "labelsync.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "LABELSYNC";

/// Label mirrored from APIExports onto their APIBindings.
pub const DEFAULT_MARKER_LABEL: &str = "workload.kcp.dev/compute";

const VALID_LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[source] config::ConfigError),

    #[error("config deserialize error: {0}")]
    Deserialize(#[source] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LabelSyncConfig {
    #[serde(default)]
    pub controller: ControllerSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LabelSyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.workers == 0 {
            return Err(ConfigError::invalid("controller.workers must be > 0"));
        }
        if self.controller.marker_label.trim().is_empty() {
            return Err(ConfigError::invalid("controller.marker_label must not be empty"));
        }
        if self.queue.base_delay_ms > self.queue.max_delay_ms {
            return Err(ConfigError::invalid(
                "queue.base_delay_ms must be <= queue.max_delay_ms",
            ));
        }
        if self.queue.qps.is_nan() || self.queue.qps <= 0.0 {
            return Err(ConfigError::invalid("queue.qps must be > 0"));
        }
        if self.queue.burst == 0 {
            return Err(ConfigError::invalid("queue.burst must be > 0"));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&lvl.as_str()) {
            return Err(ConfigError::invalid(format!(
                "logging.level must be one of {VALID_LOG_LEVELS:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerSettings {
    /// Number of concurrent reconcile workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_marker_label")]
    pub marker_label: String,
    /// Period of the informer resync; 0 disables it.
    #[serde(default)]
    pub resync_period_secs: u64,
}

fn default_workers() -> usize {
    2
}
fn default_marker_label() -> String {
    DEFAULT_MARKER_LABEL.into()
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            marker_label: default_marker_label(),
            resync_period_secs: 0,
        }
    }
}

impl ControllerSettings {
    pub fn resync_period(&self) -> Option<Duration> {
        (self.resync_period_secs > 0).then(|| Duration::from_secs(self.resync_period_secs))
    }
}

/// Work queue rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSettings {
    /// First per-item retry delay; doubles on each consecutive failure.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound of the per-item retry delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Sustained rate of the overall token bucket.
    #[serde(default = "default_qps")]
    pub qps: f64,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_base_delay_ms() -> u64 {
    5
}
fn default_max_delay_ms() -> u64 {
    1_000_000
}
fn default_qps() -> f64 {
    10.0
}
fn default_burst() -> u32 {
    100
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            qps: default_qps(),
            burst: default_burst(),
        }
    }
}

impl QueueSettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Load configuration from an optional TOML file and the environment.
///
/// A missing file is not an error; defaults and environment values apply.
pub fn load_config(path: Option<&str>) -> Result<LabelSyncConfig, ConfigError> {
    let mut builder = Config::builder();
    let file = path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if file.exists() {
        debug!(path = %file.display(), "Loading configuration file");
        builder = builder.add_source(File::from(file));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__"),
    );
    let cfg = builder.build().map_err(ConfigError::Build)?;
    let merged: LabelSyncConfig = cfg.try_deserialize().map_err(ConfigError::Deserialize)?;
    merged.validate()?;
    Ok(merged)
}
