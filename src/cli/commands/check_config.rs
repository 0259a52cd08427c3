use anyhow::Result;

use crate::domain::models::Config;

/// Print the effective configuration with the secret masked.
pub fn execute(mut config: Config) -> Result<()> {
    config.webhook_secret = "<redacted>".to_string();
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
