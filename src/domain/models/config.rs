use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration structure for hubrelay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Public listener for inbound deliveries
    #[serde(default = "default_webhook_addr")]
    pub webhook_addr: String,

    /// Private listener for the query/replay API and metrics
    #[serde(default = "default_api_addr")]
    pub api_addr: String,

    /// Shared HMAC secret; `file:<path>` reads it from disk
    #[serde(default)]
    pub webhook_secret: String,

    /// Downstream target (`http(s)://...` or `unix:///path`); unset = log-only
    #[serde(default)]
    pub target_url: Option<String>,

    /// Reject deliveries from outside the source's published address ranges
    #[serde(default = "default_true")]
    pub validate_origin: bool,

    /// Take the client address from `X-Forwarded-For` instead of the socket
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Origin allowlist configuration
    #[serde(default)]
    pub allowlist: AllowlistConfig,

    /// Forwarding engine configuration
    #[serde(default)]
    pub forwarder: ForwarderConfig,

    /// Statistics collector configuration
    #[serde(default)]
    pub stats: StatsConfig,

    /// Replay configuration
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_webhook_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_api_addr() -> String {
    "127.0.0.1:8081".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_addr: default_webhook_addr(),
            api_addr: default_api_addr(),
            webhook_secret: String::new(),
            target_url: None,
            validate_origin: true,
            trust_forwarded_for: false,
            database: DatabaseConfig::default(),
            allowlist: AllowlistConfig::default(),
            forwarder: ForwarderConfig::default(),
            stats: StatsConfig::default(),
            replay: ReplayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Database URI (`sqlite:hubrelay.db`, `postgres://...`, `mysql://...`, `memory:`)
    #[serde(default = "default_database_uri")]
    pub uri: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_uri() -> String {
    "sqlite:hubrelay.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: default_database_uri(),
            max_connections: default_max_connections(),
        }
    }
}

/// Origin allowlist configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AllowlistConfig {
    /// Metadata endpoint publishing the source's `hooks` CIDR ranges
    #[serde(default = "default_meta_url")]
    pub meta_url: String,

    /// Seconds between refreshes (0 disables periodic refresh)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_meta_url() -> String {
    "https://api.github.com/meta".to_string()
}

const fn default_refresh_interval_secs() -> u64 {
    3600
}

impl AllowlistConfig {
    pub const fn refresh_interval(&self) -> Option<Duration> {
        non_zero_secs(self.refresh_interval_secs)
    }
}

impl Default for AllowlistConfig {
    fn default() -> Self {
        Self {
            meta_url: default_meta_url(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

/// Forwarding engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ForwarderConfig {
    /// Safety-net sweep interval in seconds (0 disables it)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Outbound request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

const fn default_timeout_secs() -> u64 {
    30
}

impl ForwarderConfig {
    pub const fn sweep_interval(&self) -> Option<Duration> {
        non_zero_secs(self.sweep_interval_secs)
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Statistics collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StatsConfig {
    /// Periodic refresh in seconds (0 disables it)
    #[serde(default = "default_stats_interval_secs")]
    pub interval_secs: u64,

    /// Only count events newer than this many seconds
    #[serde(default)]
    pub window_secs: Option<u64>,
}

const fn default_stats_interval_secs() -> u64 {
    300
}

impl StatsConfig {
    pub const fn interval(&self) -> Option<Duration> {
        non_zero_secs(self.interval_secs)
    }

    pub fn window(&self) -> Option<Duration> {
        self.window_secs.map(Duration::from_secs)
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_stats_interval_secs(),
            window_secs: None,
        }
    }
}

/// Replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReplayConfig {
    /// Events replayed by a range request that gives no explicit limit
    #[serde(default = "default_replay_limit")]
    pub default_limit: u32,
}

const fn default_replay_limit() -> u32 {
    100
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            default_limit: default_replay_limit(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Keep writing to stdout when a log directory is set
    #[serde(default = "default_true")]
    pub enable_stdout: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            enable_stdout: true,
        }
    }
}

const fn non_zero_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}
