//! Client configuration: where the bus lives and how to log.
//!
//! The allow-list is fixed at build time and is not configurable here.

use serde::Deserialize;
use thiserror::Error;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Pub/sub transport settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pub/sub transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Redis connection URL.
    #[serde(default = "default_bus_url")]
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_bus_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

// Log output shares the terminal with displayed events, so stay quiet by default.
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `TRACKER_BUS_URL` overrides `bus.url`
/// - `TRACKER_LOG_LEVEL` overrides `logging.level`
/// - `TRACKER_LOG_JSON` overrides `logging.json`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

fn load_config_with(
    path: Option<&str>,
    var: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => parse_file(p)?,
        None => Config::default(),
    };
    apply_env_overrides(&mut config, var);
    Ok(config)
}

fn parse_file(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path, "client config not found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(ConfigError::FileRead(e)),
    }
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var("TRACKER_BUS_URL") {
        config.bus.url = url;
    }
    if let Some(level) = var("TRACKER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("TRACKER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
