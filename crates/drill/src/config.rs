//! Driver configuration
//!
//! TOML, versioned with `config_version`. Every setting is optional and a
//! missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
const DEFAULT_MANUAL_REST_SECONDS: u32 = 60;
const DEFAULT_REST_EXTEND_SECONDS: u32 = 60;
const DEFAULT_SAVE_TIMEOUT_SECONDS: u64 = 10;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ConfigIssue> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A single rejected setting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("driver.tick_interval_ms must be greater than zero")]
    ZeroTickInterval,

    #[error("save.timeout_seconds must be greater than zero")]
    ZeroSaveTimeout,

    #[error("save.endpoint must be an http:// or https:// URL, got '{0}'")]
    InvalidEndpoint(String),
}

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    pub config_version: u32,

    #[serde(default)]
    pub driver: RawDriverConfig,

    #[serde(default)]
    pub save: RawSaveConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDriverConfig {
    /// Milliseconds per engine tick (one simulated second)
    pub tick_interval_ms: Option<u64>,

    /// Length of a rest started with a bare `rest` command
    pub manual_rest_seconds: Option<u32>,

    /// Seconds added by a bare `more` command
    pub rest_extend_seconds: Option<u32>,

    /// Directory for the database and the file archive
    pub data_dir: Option<PathBuf>,

    /// Root of the week directories searched by `run --today`
    pub sessions_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSaveConfig {
    /// Remote save endpoint; nothing is uploaded when unset
    pub endpoint: Option<String>,

    pub timeout_seconds: Option<u64>,
}

/// Validated driver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub tick_interval: Duration,
    pub manual_rest_seconds: u32,
    pub rest_extend_seconds: u32,
    pub data_dir: Option<PathBuf>,
    pub sessions_dir: Option<PathBuf>,
    pub save: SaveConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveConfig {
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            manual_rest_seconds: DEFAULT_MANUAL_REST_SECONDS,
            rest_extend_seconds: DEFAULT_REST_EXTEND_SECONDS,
            data_dir: None,
            sessions_dir: None,
            save: SaveConfig {
                endpoint: None,
                timeout: Duration::from_secs(DEFAULT_SAVE_TIMEOUT_SECONDS),
            },
        }
    }
}

impl Config {
    fn from_raw(raw: RawConfig) -> Self {
        let driver = raw.driver;
        let save = raw.save;
        Self {
            tick_interval: Duration::from_millis(
                driver.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS),
            ),
            manual_rest_seconds: driver
                .manual_rest_seconds
                .unwrap_or(DEFAULT_MANUAL_REST_SECONDS),
            rest_extend_seconds: driver
                .rest_extend_seconds
                .unwrap_or(DEFAULT_REST_EXTEND_SECONDS),
            data_dir: driver.data_dir,
            sessions_dir: driver.sessions_dir,
            save: SaveConfig {
                endpoint: save.endpoint,
                timeout: Duration::from_secs(
                    save.timeout_seconds.unwrap_or(DEFAULT_SAVE_TIMEOUT_SECONDS),
                ),
            },
        }
    }
}

/// Check a raw configuration, collecting every issue
pub fn validate_config(raw: &RawConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    if raw.driver.tick_interval_ms == Some(0) {
        issues.push(ConfigIssue::ZeroTickInterval);
    }
    if raw.save.timeout_seconds == Some(0) {
        issues.push(ConfigIssue::ZeroSaveTimeout);
    }
    if let Some(endpoint) = &raw.save.endpoint
        && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
    {
        issues.push(ConfigIssue::InvalidEndpoint(endpoint.clone()));
    }

    issues
}

/// Load and validate configuration; a missing file gives the defaults
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let path = path.as_ref();
    if !path.exists() {
        info!(config_path = %path.display(), "No config file, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Config::from_raw(raw))
}
