//! Persistence for backtest reports.
//!
//! A saved run is a directory named after the run id holding the full
//! report as JSON plus CSV exports of the equity curve and the trade log.

mod file;

pub use file::FileRunStore;

use async_trait::async_trait;
use quant_backtest::{BacktestReport, RunSummary};
use quant_core::BacktestResult;
use uuid::Uuid;

/// Storage for completed (or partial) backtest runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a report, replacing any earlier save of the same run.
    async fn save(&self, report: &BacktestReport) -> BacktestResult<()>;

    /// Load a report by run id.
    async fn load(&self, id: Uuid) -> BacktestResult<BacktestReport>;

    /// Summaries of every stored run, oldest first.
    async fn list(&self) -> BacktestResult<Vec<RunSummary>>;
}
