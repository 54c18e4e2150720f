//! Configuration module for the feed sync service.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::feed::{validate_url, DateFormat, FeedFormat};
use crate::sync::FirstRunPolicy;
use crate::watermark::{ScanMode, DEFAULT_SEEN_CAPACITY};
use crate::{Result, SyncError};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/meowbah.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/meowbah-sync.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// HTTP fetch limits.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Overall request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_read_timeout() -> u64 {
    15
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// How often to look for due feeds, in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Retryable failures in a row before a feed is disabled.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    /// Identifiers remembered per feed.
    #[serde(default = "default_seen_capacity")]
    pub seen_capacity: usize,
}

fn default_check_interval() -> u64 {
    60
}

fn default_max_consecutive_errors() -> u32 {
    5
}

fn default_seen_capacity() -> usize {
    DEFAULT_SEEN_CAPACITY
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            max_consecutive_errors: default_max_consecutive_errors(),
            seen_capacity: default_seen_capacity(),
        }
    }
}

/// Where watermark state is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    /// `watermarks` table in the main database.
    #[default]
    Sqlite,
    /// One JSON file per feed under `dir`.
    Files,
}

/// Watermark state configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackend,
    /// Directory for the `files` backend.
    #[serde(default = "default_state_dir")]
    pub dir: String,
}

fn default_state_dir() -> String {
    "data/state".to_string()
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            dir: default_state_dir(),
        }
    }
}

/// Destination of a feed's new entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Cache rows in `feed_entries`.
    #[default]
    Store,
    /// Post a "new upload" notification.
    Notify,
}

/// One polled feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Unique name, also the watermark namespace.
    pub name: String,
    pub url: String,
    #[serde(default = "default_feed_format")]
    pub format: FeedFormat,
    #[serde(default)]
    pub sink: SinkKind,
    /// Poll interval in seconds.
    #[serde(default = "default_feed_interval")]
    pub interval_secs: u64,
    /// Defaults to baseline for notify sinks and publish_all for store sinks.
    #[serde(default)]
    pub first_run: Option<FirstRunPolicy>,
    #[serde(default)]
    pub scan_mode: ScanMode,
    /// Overrides the format's date format.
    #[serde(default)]
    pub date_format: Option<DateFormat>,
    /// Notification headline for notify sinks.
    #[serde(default = "default_notify_title")]
    pub notify_title: String,
    /// Deliver notifications to this webhook instead of the log.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_feed_format() -> FeedFormat {
    FeedFormat::YoutubeAtom
}

fn default_feed_interval() -> u64 {
    900
}

fn default_notify_title() -> String {
    "New from Meowbah!".to_string()
}

impl FeedConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            format: default_feed_format(),
            sink: SinkKind::default(),
            interval_secs: default_feed_interval(),
            first_run: None,
            scan_mode: ScanMode::default(),
            date_format: None,
            notify_title: default_notify_title(),
            webhook_url: None,
        }
    }

    /// First-run policy after applying the per-sink default.
    pub fn effective_first_run(&self) -> FirstRunPolicy {
        self.first_run.unwrap_or(match self.sink {
            SinkKind::Notify => FirstRunPolicy::Baseline,
            SinkKind::Store => FirstRunPolicy::PublishAll,
        })
    }

    /// Date format after applying the format's default.
    pub fn effective_date_format(&self) -> DateFormat {
        self.date_format.unwrap_or_else(|| self.format.date_format())
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(SyncError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| SyncError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `MEOWBAH_DB_PATH`: Override the database path
    /// - `MEOWBAH_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MEOWBAH_DB_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("MEOWBAH_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - a feed name is empty or used twice
    /// - a feed or webhook URL is not an absolute http(s) URL
    /// - an interval or the seen capacity is zero
    pub fn validate(&self) -> Result<()> {
        if self.sync.check_interval_secs == 0 {
            return Err(SyncError::Config(
                "sync.check_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.sync.seen_capacity == 0 {
            return Err(SyncError::Config(
                "sync.seen_capacity must be greater than 0".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                return Err(SyncError::Config("feed name must not be empty".to_string()));
            }
            if !names.insert(feed.name.as_str()) {
                return Err(SyncError::Config(format!(
                    "duplicate feed name: {}",
                    feed.name
                )));
            }
            if feed.interval_secs == 0 {
                return Err(SyncError::Config(format!(
                    "feed {}: interval_secs must be greater than 0",
                    feed.name
                )));
            }
            validate_url(&feed.url)
                .map_err(|e| SyncError::Config(format!("feed {}: {e}", feed.name)))?;
            if let Some(webhook) = &feed.webhook_url {
                validate_url(webhook)
                    .map_err(|e| SyncError::Config(format!("feed {} webhook: {e}", feed.name)))?;
            }
        }
        Ok(())
    }
}
