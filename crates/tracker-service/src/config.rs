//! Service configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use tracker_types::{default_seed_accounts, Account};

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Account store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Pub/sub transport settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Publish queue settings.
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Accounts written to the store at startup.
    #[serde(default = "default_seed_accounts")]
    pub accounts: Vec<Account>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Account store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Pub/sub transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Redis connection URL.
    #[serde(default = "default_bus_url")]
    pub url: String,
}

/// Publish queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// Events that may wait for the bus before new ones are shed.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long shutdown waits for queued events to be published.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "tracker_service=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "tracker.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_bus_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_drain_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            bus: BusConfig::default(),
            publisher: PublisherConfig::default(),
            logging: LoggingConfig::default(),
            accounts: default_seed_accounts(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_bus_url(),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            drain_timeout_ms: default_drain_timeout_ms(),
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
/// - `TRACKER_HOST` overrides `server.host`
/// - `TRACKER_PORT` overrides `server.port`
/// - `TRACKER_DB_PATH` overrides `database.path`
/// - `TRACKER_BUS_URL` overrides `bus.url`
/// - `TRACKER_PUBLISH_QUEUE` overrides `publisher.queue_capacity`
/// - `TRACKER_LOG_LEVEL` overrides `logging.level`
/// - `TRACKER_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => parse_file(p)?,
        None => Config::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn parse_file(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path, "config file not found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(ConfigError::FileRead(e)),
    }
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(parsed) = var("TRACKER_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = var("TRACKER_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(db_path) = var("TRACKER_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(url) = var("TRACKER_BUS_URL") {
        config.bus.url = url;
    }
    if let Some(parsed) = var("TRACKER_PUBLISH_QUEUE").and_then(|v| v.parse().ok()) {
        config.publisher.queue_capacity = parsed;
    }
    if let Some(level) = var("TRACKER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("TRACKER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_listen_on_8080_with_seed_accounts() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.accounts.len(), 4);
        assert_eq!(config.publisher.queue_capacity, 1024);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = parse_file(path.to_str().unwrap()).expect("missing file is not an error");
        assert_eq!(config.database.path, "tracker.db");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[[accounts]]
accountId = "a"
accountName = "Alpha"
isActive = false
"#
        )
        .unwrap();

        let config = parse_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.accounts, vec![Account::new("a", "Alpha", false)]);
        assert_eq!(config.bus.url, "redis://127.0.0.1:6379/");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        let err = parse_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("TRACKER_PORT", "7000"),
            ("TRACKER_HOST", "not-an-ip"),
            ("TRACKER_BUS_URL", "redis://bus:6379/"),
            ("TRACKER_PUBLISH_QUEUE", "16"),
            ("TRACKER_LOG_JSON", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.bus.url, "redis://bus:6379/");
        assert_eq!(config.publisher.queue_capacity, 16);
        assert!(config.logging.json);
    }
}
