//! Hubrelay entry point.

use clap::Parser;

use hubrelay::cli::{commands, handle_error, Cli, Commands};
use hubrelay::infrastructure::config::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load(cli.global.config.as_deref(), &cli.global.overrides()) {
        Ok(config) => config,
        Err(err) => handle_error(err),
    };

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve::execute(config).await,
        Commands::CheckConfig => commands::check_config::execute(config),
    };

    if let Err(err) = result {
        handle_error(err);
    }
}
