//! CLI type definitions
//!
//! Flags here override the config file and `HUBRELAY_*` environment variables.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::infrastructure::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(name = "hubrelay")]
#[command(about = "Hubrelay - durable webhook relay with replay", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (defaults to ./hubrelay.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Address for inbound webhooks
    #[arg(long, global = true)]
    pub webhook_addr: Option<String>,

    /// Address for the query/replay API and metrics
    #[arg(long, global = true)]
    pub api_addr: Option<String>,

    /// Webhook secret, or file:<path> to read it from disk
    #[arg(long, global = true)]
    pub secret: Option<String>,

    /// Forward target: http(s)://host/path or unix:///path/to.sock
    #[arg(short, long, global = true)]
    pub target: Option<String>,

    /// Database URI: sqlite:<path>, postgres://..., mysql://..., memory:
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Reject deliveries from outside the published source ranges
    #[arg(long, global = true)]
    pub validate_origin: Option<bool>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

impl GlobalArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            webhook_addr: self.webhook_addr.clone(),
            api_addr: self.api_addr.clone(),
            webhook_secret: self.secret.clone(),
            target_url: self.target.clone(),
            validate_origin: self.validate_origin,
            database_uri: self.db.clone(),
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the relay (default)
    Serve,

    /// Validate configuration and print the effective values
    CheckConfig,
}
