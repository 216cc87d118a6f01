//! Run command implementation.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use quant_backtest::{BacktestEngine, BacktestReport, RebalanceFrequency, RunSpec};
use quant_config::AppConfig;
use quant_core::{MarketDataProvider, Strategy};
use quant_data::{CachedDataSource, CsvDataSource};
use quant_store::{FileRunStore, RunStore};
use quant_strategies::StrategyRegistry;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cli::{OutputFormat, RunArgs};

pub async fn run(args: RunArgs, config: &AppConfig) -> Result<()> {
    let engine_config = config
        .backtest
        .to_engine_config()
        .context("Invalid backtest settings")?;
    let engine = BacktestEngine::new(engine_config);
    let spec = build_spec(&args, config)?;

    info!(
        strategies = ?args.strategy,
        universe = spec.universe.len(),
        start = %spec.start,
        end = %spec.end,
        rebalance = %spec.rebalance,
        "Starting backtest"
    );

    // Create strategies
    let strategy_config = match &args.strategy_config {
        Some(path) => read_strategy_config(path).await?,
        None => serde_json::Value::Null,
    };
    let registry = StrategyRegistry::new();
    let strategies = args
        .strategy
        .iter()
        .map(|name| {
            registry
                .create(name, strategy_config.clone(), args.symbols.clone())
                .with_context(|| format!("Failed to create strategy '{}'", name))
        })
        .collect::<Result<Vec<_>>>()?;

    // Market data
    let data_dir = args.data.clone().unwrap_or_else(|| config.data.dir.clone());
    let source = CsvDataSource::new(&data_dir)
        .with_context(|| format!("Cannot read market data from {}", data_dir.display()))?;
    let provider: Box<dyn MarketDataProvider> = if config.data.cache {
        Box::new(CachedDataSource::new(source))
    } else {
        Box::new(source)
    };

    // Ctrl-C stops the simulation after the current date
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping backtest");
            cancel.cancel();
        }
    });

    let results = if strategies.len() == 1 {
        let strategy = &strategies[0];
        vec![engine.run(strategy.as_ref(), provider.as_ref(), &spec).await]
    } else {
        let data = engine
            .load_market_data(provider.as_ref(), &spec)
            .await
            .context("Failed to load market data")?;
        let strategies: Vec<Arc<dyn Strategy>> = strategies.into_iter().map(Arc::from).collect();
        engine.run_batch(strategies, Arc::new(data), spec.clone()).await
    };

    // Output results
    let store = args.save.then(|| FileRunStore::new(&config.output.dir));
    let total = results.len();
    let mut failed = 0;

    for result in results {
        let report = match result {
            Ok(report) => report,
            Err(failure) => {
                error!(
                    error = %failure.error,
                    retryable = failure.is_retryable(),
                    "Backtest failed"
                );
                failed += 1;
                *failure.report
            }
        };

        print_report(&report, args.output)?;

        if let Some(store) = &store {
            store.save(&report).await.context("Failed to save run")?;
            println!(
                "Saved run {} to {}",
                report.id(),
                store.run_dir(report.id()).display()
            );
        }
    }

    if failed > 0 {
        bail!("{} of {} backtests failed", failed, total);
    }
    Ok(())
}

pub(crate) fn print_report(report: &BacktestReport, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => println!("{}", report.summary()),
    }
    Ok(())
}

fn build_spec(args: &RunArgs, config: &AppConfig) -> Result<RunSpec> {
    let start = parse_date(&args.start)?;
    let end = parse_date(&args.end)?;
    let rebalance = match &args.rebalance {
        Some(value) => value
            .parse::<RebalanceFrequency>()
            .context("Invalid rebalance frequency")?,
        None => config.backtest.rebalance_frequency()?,
    };

    let mut spec = RunSpec::new(args.symbols.clone(), start, end)
        .with_capital(args.capital.unwrap_or(config.backtest.initial_capital))
        .with_rebalance(rebalance);
    if let Some(benchmark) = args.benchmark.as_ref().or(config.backtest.benchmark.as_ref()) {
        spec = spec.with_benchmark(benchmark.clone());
    }

    spec.validate()?;
    Ok(spec)
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))
}

async fn read_strategy_config(path: &Path) -> Result<serde_json::Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read strategy config {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Strategy config {} is not valid JSON", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn args() -> RunArgs {
        RunArgs {
            strategy: vec!["buy_and_hold".into()],
            symbols: vec!["AAPL".into(), "MSFT".into()],
            start: "2024-01-02".into(),
            end: "2024-06-28".into(),
            capital: None,
            rebalance: None,
            benchmark: None,
            strategy_config: None,
            data: None,
            output: OutputFormat::Text,
            save: false,
        }
    }

    #[test]
    fn test_spec_uses_configured_defaults() {
        let mut config = AppConfig::default();
        config.backtest.benchmark = Some("SPY".into());

        let spec = build_spec(&args(), &config).unwrap();
        assert_eq!(spec.initial_capital, dec!(100000));
        assert_eq!(spec.rebalance, RebalanceFrequency::Monthly);
        assert_eq!(spec.benchmark.as_deref(), Some("SPY"));
    }

    #[test]
    fn test_spec_arguments_override_config() {
        let mut args = args();
        args.capital = Some(dec!(5000));
        args.rebalance = Some("weekly".into());
        args.benchmark = Some("QQQ".into());

        let spec = build_spec(&args, &AppConfig::default()).unwrap();
        assert_eq!(spec.initial_capital, dec!(5000));
        assert_eq!(spec.rebalance, RebalanceFrequency::Weekly);
        assert_eq!(spec.benchmark.as_deref(), Some("QQQ"));
    }

    #[test]
    fn test_spec_rejects_bad_input() {
        let mut bad_date = args();
        bad_date.start = "01/02/2024".into();
        assert!(build_spec(&bad_date, &AppConfig::default()).is_err());

        let mut reversed = args();
        reversed.start = "2024-07-01".into();
        assert!(build_spec(&reversed, &AppConfig::default()).is_err());

        let mut bad_rebalance = args();
        bad_rebalance.rebalance = Some("hourly".into());
        assert!(build_spec(&bad_rebalance, &AppConfig::default()).is_err());
    }
}
