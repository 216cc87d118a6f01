//! Backtesting engine.
//!
//! Simulates a strategy over end-of-day bars: a rebalance schedule decides
//! when the strategy is consulted, the rebalancer turns its target weights
//! into costed trades, and the portfolio tracker records a snapshot for
//! every trading date. The performance analyzer turns those snapshots into
//! return and risk statistics.

pub mod costs;
mod engine;
pub mod performance;
mod portfolio;
mod rebalance;
mod report;
pub mod schedule;

pub use costs::CostModel;
pub use engine::{benchmark_series, BacktestConfig, BacktestEngine, CancelToken, RunFailure, RunSpec};
pub use performance::{
    AlphaBeta, BenchmarkComparison, BenchmarkPoint, Drawdown, MetricError, PerformanceAnalyzer, PerformanceReport,
};
pub use portfolio::{EventKind, MarkOutcome, Portfolio, PortfolioEvent};
pub use rebalance::{target_weights, CashPolicy, OrderIntent, Rebalancer};
pub use report::{BacktestReport, RunStatus, RunSummary};
pub use schedule::{rebalance_dates, RebalanceFrequency};
