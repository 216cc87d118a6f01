//! Validate configuration command.

use anyhow::Result;
use quant_config::load_config;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let result = load_config(config_path)
        .map_err(anyhow::Error::from)
        .and_then(|config| {
            config.validate()?;
            Ok(config)
        });

    match result {
        Ok(config) => {
            let backtest = &config.backtest;
            println!("Configuration is valid!");
            println!();
            println!("App: {}", config.app.name);
            println!("Environment: {}", config.app.environment);
            println!("Log level: {}", config.logging.level);
            println!("Initial capital: {}", backtest.initial_capital);
            println!(
                "Costs: {} per trade + {}% commission, {}% slippage",
                backtest.commission_per_trade,
                backtest.commission_rate * rust_decimal::Decimal::ONE_HUNDRED,
                backtest.slippage_rate * rust_decimal::Decimal::ONE_HUNDRED
            );
            println!("Rebalance: {}", backtest.rebalance);
            println!(
                "Benchmark: {}",
                backtest.benchmark.as_deref().unwrap_or("none")
            );
            println!("Data directory: {}", config.data.dir.display());
        }
        Err(e) => {
            println!("Configuration error: {:#}", e);
            return Err(e);
        }
    }

    Ok(())
}
