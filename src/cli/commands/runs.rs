//! Saved runs command.

use anyhow::{Context, Result};
use quant_config::AppConfig;
use quant_store::{FileRunStore, RunStore};

use super::run::print_report;
use crate::cli::{OutputFormat, RunsArgs};

pub async fn run(args: RunsArgs, config: &AppConfig) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| config.output.dir.clone());
    let store = FileRunStore::new(dir);

    if let Some(id) = args.show {
        let report = store
            .load(id)
            .await
            .with_context(|| format!("Failed to load run {}", id))?;
        return print_report(&report, args.output);
    }

    let runs = store.list().await.context("Failed to list saved runs")?;
    if let OutputFormat::Json = args.output {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    println!("Saved Runs ({})", store.root().display());
    println!("═══════════════════════════════════════════════════════════");
    println!();

    if runs.is_empty() {
        println!("  No saved runs. Use `run --save` to keep one.");
        return Ok(());
    }

    for run in &runs {
        let total_return = if run.initial_capital.is_zero() {
            rust_decimal::Decimal::ZERO
        } else {
            (run.final_value / run.initial_capital - rust_decimal::Decimal::ONE)
                * rust_decimal::Decimal::ONE_HUNDRED
        };
        println!("  {}", run.id);
        println!("  ───────────────────────────────────────────────────────");
        println!("  Strategy:   {} ({})", run.strategy, run.status);
        println!("  Period:     {} to {}", run.start_date, run.end_date);
        println!("  Created:    {}", run.created_at.format("%Y-%m-%d %H:%M:%S"));
        println!("  Return:     {:.2}%", total_return);
        println!();
    }

    println!("Use --show <id> to print a full report.");
    Ok(())
}
