//! Configuration management
//!
//! Loads configuration from config.toml at startup and writes it back on
//! graceful shutdown so a refreshed directory token survives restarts.
//! All timing values are configurable to avoid hardcoded constants.

use crate::discovery::client::{DEFAULT_API_BASE, DEFAULT_ID_BASE};
use crate::discovery::{AccessToken, DiscoverySettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file, overridden by `CONFIG_PATH`
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Persisted configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Channels queued at startup (without `#`)
    #[serde(default)]
    pub channels: Vec<String>,

    /// Chat login
    #[serde(default)]
    pub account: AccountConfig,

    /// Session pool settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Directory discovery settings
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chat login
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccountConfig {
    /// Login name
    #[serde(default)]
    pub user: String,

    /// OAuth chat token, with or without the `oauth:` prefix
    #[serde(default)]
    pub token: String,
}

impl AccountConfig {
    /// Token as sent with PASS
    pub fn wire_token(&self) -> String {
        if self.token.starts_with("oauth:") {
            self.token.clone()
        } else {
            format!("oauth:{}", self.token)
        }
    }
}

/// Session pool settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PoolConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Pause after the first connect before joins begin
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,

    /// Pause between two joins (server join-rate limit)
    #[serde(default = "default_join_interval_ms")]
    pub join_interval_ms: u64,

    /// Wait when the join queue is empty
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    /// Pause after the login handshake
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Received frames per minute at which a new session is opened
    #[serde(default = "default_autoscale_threshold")]
    pub autoscale_threshold: u64,

    /// Period of the dead-session check
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    /// Period of the status line
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

/// Directory discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DirectoryConfig {
    /// Join every live channel inside the viewer window
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_id_base")]
    pub id_base: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_viewers_min")]
    pub viewers_min: u64,

    #[serde(default = "default_viewers_max")]
    pub viewers_max: u64,

    /// Cached app token, rewritten on shutdown
    #[serde(default)]
    pub app_token: AccessToken,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            start_delay_ms: default_start_delay_ms(),
            join_interval_ms: default_join_interval_ms(),
            idle_interval_ms: default_idle_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            autoscale_threshold: default_autoscale_threshold(),
            health_check_interval_secs: default_health_check_interval_secs(),
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_id: String::new(),
            client_secret: String::new(),
            api_base: default_api_base(),
            id_base: default_id_base(),
            page_size: default_page_size(),
            poll_interval_secs: default_poll_interval_secs(),
            viewers_min: default_viewers_min(),
            viewers_max: default_viewers_max(),
            app_token: AccessToken::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            dir: default_log_dir(),
        }
    }
}

fn default_host() -> String {
    "irc.chat.twitch.tv".to_string()
}

fn default_port() -> u16 {
    6667
}

fn default_start_delay_ms() -> u64 {
    2_000
}

fn default_join_interval_ms() -> u64 {
    2_000
}

fn default_idle_interval_ms() -> u64 {
    30_000
}

fn default_settle_delay_ms() -> u64 {
    2_000
}

fn default_autoscale_threshold() -> u64 {
    4_500
}

fn default_health_check_interval_secs() -> u64 {
    60
}

fn default_status_interval_secs() -> u64 {
    10
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_id_base() -> String {
    DEFAULT_ID_BASE.to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_viewers_min() -> u64 {
    10
}

fn default_viewers_max() -> u64 {
    10_000
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Config {
    /// Path from `CONFIG_PATH`, falling back to config.toml
    pub fn path() -> PathBuf {
        std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load and validate the configuration file
    ///
    /// # Errors
    /// A missing, unreadable, unparseable or incomplete file is an error;
    /// the process cannot log in without it.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration back to `CONFIG_PATH`
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path())
    }

    /// Write through a temporary file and rename over `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        let tmp = path.with_extension("toml.tmp");

        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        std::fs::write(&tmp, contents).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    /// Reject values the pool cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account.user.trim().is_empty() {
            return Err(ConfigError::Invalid("account.user is empty".to_string()));
        }
        if self.account.token.trim().is_empty() {
            return Err(ConfigError::Invalid("account.token is empty".to_string()));
        }
        if self.pool.autoscale_threshold == 0 {
            return Err(ConfigError::Invalid(
                "pool.autoscale_threshold must be positive".to_string(),
            ));
        }
        if self.pool.health_check_interval_secs == 0 || self.pool.status_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "pool health and status intervals must be positive".to_string(),
            ));
        }
        if self.directory.viewers_min > self.directory.viewers_max {
            return Err(ConfigError::Invalid(format!(
                "directory.viewers_min ({}) exceeds viewers_max ({})",
                self.directory.viewers_min, self.directory.viewers_max
            )));
        }
        if self.directory.enabled
            && (self.directory.client_id.is_empty() || self.directory.client_secret.is_empty())
        {
            return Err(ConfigError::Invalid(
                "directory.enabled requires client_id and client_secret".to_string(),
            ));
        }
        Ok(())
    }
}

impl PoolConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn join_interval(&self) -> Duration {
        Duration::from_millis(self.join_interval_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }
}

impl DirectoryConfig {
    pub fn discovery_settings(&self) -> DiscoverySettings {
        DiscoverySettings {
            viewers_min: self.viewers_min,
            viewers_max: self.viewers_max,
            page_size: self.page_size,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading or writing the file
    #[error("Failed to access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Invalid TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Config could not be rendered back to TOML
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Parsed but unusable
    #[error("Invalid config: {0}")]
    Invalid(String),
}
