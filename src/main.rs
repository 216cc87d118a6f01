//! Portfolio backtesting CLI application.

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use logging::setup_logging;
use quant_config::load_config_or_default;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the config file unless overridden
    let config = load_config_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let log_level = match cli.log_level {
        Some(cli::LogLevel::Trace) => "trace",
        Some(cli::LogLevel::Debug) => "debug",
        Some(cli::LogLevel::Info) => "info",
        Some(cli::LogLevel::Warn) => "warn",
        Some(cli::LogLevel::Error) => "error",
        None => config.logging.level.as_str(),
    };
    let _guard = setup_logging(
        log_level,
        cli.json_logs || config.logging.is_json(),
        config.logging.file.as_deref(),
    );

    // Execute command
    match cli.command {
        Commands::Run(args) => cli::commands::run::run(args, &config).await,
        Commands::Runs(args) => cli::commands::runs::run(args, &config).await,
        Commands::Strategies => cli::commands::strategies::run().await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config).await,
    }
}
