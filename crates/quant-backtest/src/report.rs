//! Backtest report generation.

use chrono::{DateTime, NaiveDate, Utc};
use quant_core::{BacktestResult, Snapshot, Trade};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::BacktestConfig;
use crate::performance::{BenchmarkPoint, PerformanceAnalyzer, PerformanceReport};
use crate::portfolio::PortfolioEvent;
use crate::schedule::RebalanceFrequency;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Identity, inputs and headline numbers of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub strategy: String,
    pub description: String,
    pub parameters: serde_json::Value,
    pub universe: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rebalance: RebalanceFrequency,
    pub benchmark: Option<String>,
    pub initial_capital: Decimal,
    pub final_value: Decimal,
    pub trading_days: usize,
    pub rebalance_count: usize,
    pub total_trades: usize,
    pub total_commission: Decimal,
    pub total_slippage: Decimal,
    pub status: RunStatus,
    /// Error that ended a failed run
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Complete backtest report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub run: RunSummary,
    /// Configuration used
    pub config: BacktestConfig,
    pub metrics: PerformanceReport,
    /// One snapshot per simulated trading date
    pub snapshots: Vec<Snapshot>,
    /// Trade log in execution order
    pub trades: Vec<Trade>,
    pub events: Vec<PortfolioEvent>,
    pub benchmark: Option<Vec<BenchmarkPoint>>,
}

impl BacktestReport {
    pub fn id(&self) -> Uuid {
        self.run.id
    }

    pub fn is_complete(&self) -> bool {
        self.run.status == RunStatus::Completed
    }

    pub fn final_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Total value per simulated date.
    pub fn equity_curve(&self) -> Vec<(NaiveDate, Decimal)> {
        self.snapshots.iter().map(|s| (s.date, s.total_value)).collect()
    }

    /// Recompute the metrics from the stored snapshots, e.g. with a
    /// different risk-free rate.
    pub fn recompute_metrics(&self, analyzer: &PerformanceAnalyzer) -> PerformanceReport {
        analyzer.analyze(&self.snapshots, self.benchmark.as_deref())
    }

    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let m = &self.metrics;
        let mut s = String::new();

        s.push_str("═══════════════════════════════════════════════════════════\n");
        s.push_str("                     BACKTEST REPORT                        \n");
        s.push_str("═══════════════════════════════════════════════════════════\n\n");

        s.push_str("RUN\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Id:                  {}\n", self.run.id));
        s.push_str(&format!("  Strategy:            {}\n", self.run.strategy));
        s.push_str(&format!(
            "  Period:              {} to {}\n",
            self.run.start_date, self.run.end_date
        ));
        s.push_str(&format!("  Universe:            {} symbols\n", self.run.universe.len()));
        s.push_str(&format!("  Rebalance:           {}\n", self.run.rebalance));
        s.push_str(&format!("  Status:              {}\n", self.run.status));
        if let Some(error) = &self.run.error {
            s.push_str(&format!("  Error:               {}\n", error));
        }
        s.push('\n');

        s.push_str("PERFORMANCE\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Initial Capital:     ${:.2}\n", self.run.initial_capital));
        s.push_str(&format!("  Final Value:         ${:.2}\n", self.run.final_value));
        s.push_str(&format!("  Total Return:        {:.2}%\n", m.total_return * 100.0));
        s.push_str(&format!("  Annualized Return:   {:.2}%\n", m.annualized_return * 100.0));
        s.push_str(&format!("  Max Drawdown:        {:.2}%\n", m.max_drawdown.depth * 100.0));
        s.push_str(&format!("  Win Rate:            {:.2}%\n", m.win_rate * 100.0));
        s.push('\n');

        s.push_str("RISK METRICS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Volatility:          {:.2}%\n", m.volatility * 100.0));
        s.push_str(&format!("  Sharpe Ratio:        {:.2}\n", m.sharpe_ratio));
        s.push_str(&format!("  Sortino Ratio:       {:.2}\n", m.sortino_ratio));
        s.push_str(&format!("  Calmar Ratio:        {:.2}\n", m.calmar_ratio));
        s.push('\n');

        if let Some(benchmark) = &m.benchmark {
            s.push_str("BENCHMARK\n");
            s.push_str("───────────────────────────────────────────────────────────\n");
            if let Some(symbol) = &self.run.benchmark {
                s.push_str(&format!("  Symbol:              {}\n", symbol));
            }
            s.push_str(&format!("  Total Return:        {:.2}%\n", benchmark.total_return * 100.0));
            s.push_str(&format!("  Excess Return:       {:.2}%\n", benchmark.excess_return * 100.0));
            if let Some(ab) = &benchmark.alpha_beta {
                s.push_str(&format!("  Alpha (annual):      {:.4}\n", ab.alpha_annualized));
                s.push_str(&format!("  Beta:                {:.2}\n", ab.beta));
                s.push_str(&format!("  Correlation:         {:.2}\n", ab.correlation));
            }
            s.push('\n');
        }

        s.push_str("EXECUTION\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Trading Days:        {}\n", self.run.trading_days));
        s.push_str(&format!("  Rebalances:          {}\n", self.run.rebalance_count));
        s.push_str(&format!("  Total Trades:        {}\n", self.run.total_trades));
        s.push_str(&format!("  Commission Paid:     ${:.2}\n", self.run.total_commission));
        s.push_str(&format!("  Slippage Cost:       ${:.2}\n", self.run.total_slippage));
        s.push_str(&format!("  Warnings:            {}\n", self.events.len()));
        s.push('\n');

        if !m.metric_errors.is_empty() {
            s.push_str("UNAVAILABLE METRICS\n");
            s.push_str("───────────────────────────────────────────────────────────\n");
            for err in &m.metric_errors {
                s.push_str(&format!("  {}: {}\n", err.metric, err.message));
            }
            s.push('\n');
        }

        s.push_str("═══════════════════════════════════════════════════════════\n");

        s
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> BacktestResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Export the daily snapshots as CSV.
    pub fn equity_to_csv(&self) -> String {
        let mut csv = String::from("date,cash,positions_value,total_value,rebalanced\n");
        for snapshot in &self.snapshots {
            csv.push_str(&format!(
                "{},{},{},{},{}\n",
                snapshot.date, snapshot.cash, snapshot.positions_value, snapshot.total_value, snapshot.rebalanced
            ));
        }
        csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn report() -> BacktestReport {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let snapshots: Vec<Snapshot> = [(start, dec!(100000)), (end, dec!(110000))]
            .into_iter()
            .map(|(date, value)| Snapshot {
                date,
                cash: value,
                positions: BTreeMap::new(),
                positions_value: Decimal::ZERO,
                total_value: value,
                rebalanced: date == start,
            })
            .collect();
        let metrics = PerformanceAnalyzer::default().analyze(&snapshots, None);

        BacktestReport {
            run: RunSummary {
                id: Uuid::new_v4(),
                strategy: "buy_and_hold".into(),
                description: String::new(),
                parameters: serde_json::json!({ "symbols": ["AAPL"] }),
                universe: vec!["AAPL".into()],
                start_date: start,
                end_date: end,
                rebalance: RebalanceFrequency::Monthly,
                benchmark: None,
                initial_capital: dec!(100000),
                final_value: dec!(110000),
                trading_days: 2,
                rebalance_count: 1,
                total_trades: 0,
                total_commission: Decimal::ZERO,
                total_slippage: Decimal::ZERO,
                status: RunStatus::Completed,
                error: None,
                created_at: Utc::now(),
            },
            config: BacktestConfig::default(),
            metrics,
            snapshots,
            trades: Vec::new(),
            events: Vec::new(),
            benchmark: None,
        }
    }

    #[test]
    fn test_report_summary() {
        let summary = report().summary();
        assert!(summary.contains("Total Return"));
        assert!(summary.contains("10.00%"));
        assert!(summary.contains("buy_and_hold"));
    }

    #[test]
    fn test_json_round_trip_preserves_run() {
        let report = report();
        let json = report.to_json().unwrap();
        let parsed = BacktestReport::from_json(&json).unwrap();

        assert_eq!(parsed.run, report.run);
        assert_eq!(parsed.snapshots, report.snapshots);
    }

    #[test]
    fn test_equity_csv() {
        let csv = report().equity_to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2024-01-02,100000,0,100000,true");
    }
}
