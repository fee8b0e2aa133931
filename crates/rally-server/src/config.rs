//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Awaiting-invitation reminder job.
    #[serde(default)]
    pub reminders: ReminderConfig,

    /// Users allowed to call privileged endpoints.
    #[serde(default)]
    pub admin: AdminConfig,
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

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    /// Milliseconds a request waits for a pooled connection before failing.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "rally_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Reminder job configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    /// Seconds between runs. `0` disables the job.
    #[serde(default = "default_reminder_interval")]
    pub interval_seconds: u64,

    /// How far ahead of now an event must start to be reminded about.
    /// Accepted range is `1..=MAX_LOOKAHEAD_MINUTES`.
    #[serde(default = "default_reminder_lookahead")]
    pub lookahead_minutes: i64,
}

/// Privileged access configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub user_ids: Vec<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "rally.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reminder_interval() -> u64 {
    300
}

fn default_reminder_lookahead() -> i64 {
    60
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
            acquire_timeout_ms: default_acquire_timeout_ms(),
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

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_reminder_interval(),
            lookahead_minutes: default_reminder_lookahead(),
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

    /// A value parsed but is outside its accepted range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Longest reminder lookahead accepted, one week.
pub const MAX_LOOKAHEAD_MINUTES: i64 = 7 * 24 * 60;

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `RALLY_HOST` overrides `server.host`
/// - `RALLY_PORT` overrides `server.port`
/// - `RALLY_DB_PATH` overrides `database.path`
/// - `RALLY_DB_ACQUIRE_TIMEOUT_MS` overrides `database.acquire_timeout_ms`
/// - `RALLY_LOG_LEVEL` overrides `logging.level`
/// - `RALLY_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `RALLY_REMINDER_INTERVAL_SECONDS` overrides `reminders.interval_seconds`
/// - `RALLY_REMINDER_LOOKAHEAD_MINUTES` overrides `reminders.lookahead_minutes`
/// - `RALLY_ADMIN_USERS` overrides `admin.user_ids` (comma separated)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if a value is out of range after overrides are applied.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Checks ranges serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lookahead = self.reminders.lookahead_minutes;
        if !(1..=MAX_LOOKAHEAD_MINUTES).contains(&lookahead) {
            return Err(ConfigError::Invalid(format!(
                "reminders.lookahead_minutes must be 1..={MAX_LOOKAHEAD_MINUTES}, got {lookahead}"
            )));
        }
        if self.database.pool_max_size == 0 {
            return Err(ConfigError::Invalid(
                "database.pool_max_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Applies `RALLY_*` overrides read through `var`. Unparseable values are
/// ignored.
pub fn apply_env_overrides(mut config: Config, var: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(host) = var("RALLY_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("RALLY_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = var("RALLY_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(timeout) = var("RALLY_DB_ACQUIRE_TIMEOUT_MS") {
        if let Ok(parsed) = timeout.parse() {
            config.database.acquire_timeout_ms = parsed;
        }
    }
    if let Some(level) = var("RALLY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("RALLY_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(interval) = var("RALLY_REMINDER_INTERVAL_SECONDS") {
        if let Ok(parsed) = interval.parse() {
            config.reminders.interval_seconds = parsed;
        }
    }
    if let Some(lookahead) = var("RALLY_REMINDER_LOOKAHEAD_MINUTES") {
        if let Ok(parsed) = lookahead.parse() {
            config.reminders.lookahead_minutes = parsed;
        }
    }
    if let Some(admins) = var("RALLY_ADMIN_USERS") {
        config.admin.user_ids = admins
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_section_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [reminders]
            interval_seconds = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, default_host());
        assert_eq!(config.database.path, "rally.db");
        assert_eq!(config.reminders.interval_seconds, 0);
        assert_eq!(config.reminders.lookahead_minutes, 60);
        assert!(config.admin.user_ids.is_empty());
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = [
            ("RALLY_PORT", "9090"),
            ("RALLY_HOST", "not-an-ip"),
            ("RALLY_LOG_JSON", "1"),
            ("RALLY_REMINDER_LOOKAHEAD_MINUTES", "15"),
            ("RALLY_ADMIN_USERS", "alice, bob,,"),
        ]
        .into_iter()
        .collect();

        let config = apply_env_overrides(Config::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, default_host(), "bad host is ignored");
        assert!(config.logging.json);
        assert_eq!(config.reminders.lookahead_minutes, 15);
        assert_eq!(config.admin.user_ids, vec!["alice", "bob"]);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.database.acquire_timeout_ms, 5_000);
    }

    #[test]
    fn out_of_range_lookahead_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rally.toml");
        std::fs::write(&path, "[reminders]\nlookahead_minutes = 9223372036854775807\n").unwrap();

        let err = load_config(path.to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("lookahead_minutes")));

        for bad in ["0", "-5", "10081"] {
            let config = apply_env_overrides(Config::default(), |key| {
                (key == "RALLY_REMINDER_LOOKAHEAD_MINUTES").then(|| bad.to_string())
            });
            assert!(config.validate().is_err(), "lookahead {bad} should be rejected");
        }

        let mut config = Config::default();
        config.reminders.lookahead_minutes = MAX_LOOKAHEAD_MINUTES;
        assert!(config.validate().is_ok());
    }
}
