use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::trace;

use crate::checks::cleanup::DEFAULT_RETENTION_HOURS;
use crate::checks::retry::{
    DEFAULT_JITTER, DEFAULT_MAX_DELETE_RETRIES, DEFAULT_MAX_GET_RETRIES, DEFAULT_MAX_RETRY_DELAY,
    DEFAULT_MAX_RETRY_TIME, DEFAULT_MAX_SAVE_RETRIES, DEFAULT_RETRY_DELAY,
};
use crate::checks::{CheckSettings, CheckType, RetryPolicy};

/// SQLite storage configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,

    /// Rows older than this are deleted by the cleanup check
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
            retention_hours: default_retention_hours(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./metrics.db")
}

fn default_retention_hours() -> u32 {
    DEFAULT_RETENTION_HOURS
}

/// Retry ceilings and backoff timing shared by all checks
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_get_retries")]
    pub max_get_retries: u32,
    #[serde(default = "default_save_retries")]
    pub max_save_retries: u32,
    #[serde(default = "default_delete_retries")]
    pub max_delete_retries: u32,
    #[serde(default = "default_retry_time_secs")]
    pub max_retry_time_secs: u64,
    #[serde(default = "default_delay_millis")]
    pub delay_millis: u64,
    #[serde(default = "default_max_delay_millis")]
    pub max_delay_millis: u64,
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_get_retries: default_get_retries(),
            max_save_retries: default_save_retries(),
            max_delete_retries: default_delete_retries(),
            max_retry_time_secs: default_retry_time_secs(),
            delay_millis: default_delay_millis(),
            max_delay_millis: default_max_delay_millis(),
            jitter: default_jitter(),
        }
    }
}

fn default_get_retries() -> u32 {
    DEFAULT_MAX_GET_RETRIES
}

fn default_save_retries() -> u32 {
    DEFAULT_MAX_SAVE_RETRIES
}

fn default_delete_retries() -> u32 {
    DEFAULT_MAX_DELETE_RETRIES
}

fn default_retry_time_secs() -> u64 {
    DEFAULT_MAX_RETRY_TIME.as_secs()
}

fn default_delay_millis() -> u64 {
    DEFAULT_RETRY_DELAY.as_millis() as u64
}

fn default_max_delay_millis() -> u64 {
    DEFAULT_MAX_RETRY_DELAY.as_millis() as u64
}

fn default_jitter() -> f64 {
    DEFAULT_JITTER
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_get_retries: config.max_get_retries,
            max_save_retries: config.max_save_retries,
            max_delete_retries: config.max_delete_retries,
            max_retry_time: Duration::from_secs(config.max_retry_time_secs),
            delay: Duration::from_millis(config.delay_millis),
            max_delay: Duration::from_millis(config.max_delay_millis),
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }
}

/// Remote endpoint the uplink posts metrics to
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UplinkConfig {
    pub url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Slots in each of the success and failure queues
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Interval overrides in seconds, keyed by check type
    #[serde(default)]
    pub intervals: HashMap<CheckType, u64>,

    /// Metrics are only logged when no uplink is configured
    pub uplink: Option<UplinkConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            buffer_capacity: default_buffer_capacity(),
            retry: RetryConfig::default(),
            intervals: HashMap::new(),
            uplink: None,
        }
    }
}

fn default_buffer_capacity() -> usize {
    100
}

impl Config {
    pub fn check_settings(&self) -> CheckSettings {
        CheckSettings {
            policy: RetryPolicy::from(&self.retry),
            retention: chrono::Duration::hours(self.storage.retention_hours.into()),
            intervals: self
                .intervals
                .iter()
                .map(|(check_type, secs)| (*check_type, Duration::from_secs(*secs)))
                .collect(),
        }
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    serde_json::from_str(&file_content)
        .context("Invalid configuration file provided!")
        .inspect(|config| trace!("loaded config: {config:?}"))
}
