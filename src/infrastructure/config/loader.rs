use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::Serialize;
use thiserror::Error;

use crate::domain::models::Config;

/// Default config file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "hubrelay.yaml";

/// Prefix marking a secret that lives in a file
const SECRET_FILE_PREFIX: &str = "file:";

/// Longest stats window accepted, one hundred years
pub const MAX_STATS_WINDOW_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("webhook_secret must be set")]
    EmptySecret,

    #[error("Failed to read secret file {path}: {source}")]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database URI cannot be empty")]
    EmptyDatabaseUri,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid replay default_limit: {0}. Must be at least 1")]
    InvalidReplayLimit(u32),

    #[error("Invalid forwarder timeout: {0}s. Must be at least 1")]
    InvalidTimeout(u64),

    #[error("Invalid stats window_secs: {0}. Must be between 1 and {max}", max = MAX_STATS_WINDOW_SECS)]
    InvalidStatsWindow(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Invalid {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Invalid target_url: {0}. Must start with http://, https:// or unix://")]
    InvalidTargetUrl(String),
}

/// Values given on the command line, highest precedence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    pub webhook_addr: Option<String>,
    pub api_addr: Option<String>,
    pub webhook_secret: Option<String>,
    pub target_url: Option<String>,
    pub validate_origin: Option<bool>,
    pub database_uri: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

impl ConfigOverrides {
    fn apply(&self, mut figment: Figment) -> Figment {
        let string_keys = [
            ("webhook_addr", &self.webhook_addr),
            ("api_addr", &self.api_addr),
            ("webhook_secret", &self.webhook_secret),
            ("target_url", &self.target_url),
            ("database.uri", &self.database_uri),
            ("logging.level", &self.log_level),
            ("logging.format", &self.log_format),
        ];
        for (key, value) in string_keys {
            if let Some(value) = value {
                figment = figment.merge(Serialized::default(key, value));
            }
        }
        if let Some(validate) = self.validate_origin {
            figment = figment.merge(Serialized::default("validate_origin", validate));
        }
        figment
    }
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `path`, or ./hubrelay.yaml when no path is given (optional)
    /// 3. Environment variables (HUBRELAY_* prefix, `__` between sections)
    /// 4. Command-line overrides
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Config> {
        let file = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        if path.is_some() && !file.exists() {
            anyhow::bail!("Config file not found: {}", file.display());
        }

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&file))
            .merge(Env::prefixed("HUBRELAY_").split("__"));

        let mut config: Config = overrides
            .apply(figment)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::resolve_secret(&mut config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Replace a `file:<path>` secret with the trimmed file contents
    pub fn resolve_secret(config: &mut Config) -> Result<(), ConfigError> {
        if let Some(path) = config.webhook_secret.strip_prefix(SECRET_FILE_PREFIX) {
            let path = PathBuf::from(path);
            let secret = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::SecretFile { path, source })?;
            config.webhook_secret = secret.trim().to_string();
        }
        Ok(())
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.webhook_secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        for (field, value) in [
            ("webhook_addr", &config.webhook_addr),
            ("api_addr", &config.api_addr),
        ] {
            if value.parse::<SocketAddr>().is_err() {
                return Err(ConfigError::InvalidAddress {
                    field,
                    value: value.clone(),
                });
            }
        }

        if let Some(target) = &config.target_url {
            let supported = ["http://", "https://", "unix://"];
            if !supported.iter().any(|scheme| target.starts_with(scheme)) {
                return Err(ConfigError::InvalidTargetUrl(target.clone()));
            }
        }

        if config.database.uri.is_empty() {
            return Err(ConfigError::EmptyDatabaseUri);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        if config.replay.default_limit == 0 {
            return Err(ConfigError::InvalidReplayLimit(config.replay.default_limit));
        }

        if config.forwarder.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.forwarder.timeout_secs));
        }

        if let Some(window) = config.stats.window_secs {
            if window == 0 || window > MAX_STATS_WINDOW_SECS {
                return Err(ConfigError::InvalidStatsWindow(window));
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        Ok(())
    }
}
