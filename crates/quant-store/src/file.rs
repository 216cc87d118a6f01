//! Directory-per-run file store.

use async_trait::async_trait;
use quant_backtest::{BacktestReport, RunSummary};
use quant_core::{BacktestError, BacktestResult, Trade};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::RunStore;

const REPORT_FILE: &str = "report.json";
const EQUITY_FILE: &str = "equity.csv";
const TRADES_FILE: &str = "trades.csv";

/// Stores each run under `<root>/<run-id>/`:
/// - `report.json`: the full report
/// - `equity.csv`: one row per simulated date
/// - `trades.csv`: the trade log
#[derive(Debug, Clone)]
pub struct FileRunStore {
    root: PathBuf,
}

impl FileRunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the artifacts of run `id`.
    pub fn run_dir(&self, id: Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn save(&self, report: &BacktestReport) -> BacktestResult<()> {
        let dir = self.run_dir(report.id());
        tokio::fs::create_dir_all(&dir).await?;

        let json = report.to_json()?;
        tokio::fs::write(dir.join(REPORT_FILE), json).await?;
        tokio::fs::write(dir.join(EQUITY_FILE), report.equity_to_csv()).await?;
        tokio::fs::write(dir.join(TRADES_FILE), trades_to_csv(&report.trades)?).await?;

        info!(
            run_id = %report.id(),
            path = %dir.display(),
            trades = report.trades.len(),
            "Saved backtest run"
        );
        Ok(())
    }

    async fn load(&self, id: Uuid) -> BacktestResult<BacktestReport> {
        let path = self.run_dir(id).join(REPORT_FILE);
        let json = tokio::fs::read_to_string(&path).await?;
        debug!(run_id = %id, "Loaded backtest run");
        BacktestReport::from_json(&json)
    }

    async fn list(&self) -> BacktestResult<Vec<RunSummary>> {
        let mut runs = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(runs),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join(REPORT_FILE);
            if !path.is_file() {
                continue;
            }
            let json = tokio::fs::read_to_string(&path).await?;
            match BacktestReport::from_json(&json) {
                Ok(report) => runs.push(report.run),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable report"),
            }
        }

        runs.sort_by_key(|run| run.created_at);
        Ok(runs)
    }
}

/// Render the trade log as CSV.
pub(crate) fn trades_to_csv(trades: &[Trade]) -> BacktestResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "symbol",
        "side",
        "quantity",
        "market_price",
        "execution_price",
        "commission",
        "slippage",
        "reason",
    ])
    .map_err(csv_error)?;

    for t in trades {
        wtr.write_record([
            &t.date.to_string(),
            &t.symbol,
            &t.side().to_string(),
            &t.quantity.abs().to_string(),
            &t.market_price.to_string(),
            &t.execution_price.to_string(),
            &t.commission.to_string(),
            &t.slippage.to_string(),
            &format!("{:?}", t.reason).to_lowercase(),
        ])
        .map_err(csv_error)?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| BacktestError::Serialization(e.to_string()))?;
    String::from_utf8(data).map_err(|e| BacktestError::Serialization(e.to_string()))
}

fn csv_error(e: csv::Error) -> BacktestError {
    BacktestError::Serialization(e.to_string())
}
