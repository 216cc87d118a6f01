//! Performance analytics over a finished equity curve.

use chrono::NaiveDate;
use num_traits::ToPrimitive;
use quant_core::{BacktestError, BacktestResult, Snapshot};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Default annual risk-free rate.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Standard deviations below this are treated as zero.
const EPSILON: f64 = 1e-12;

/// One observation of a benchmark price or value series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// The deepest peak-to-trough decline of an equity curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    /// Decline as a fraction of the peak, zero or negative
    pub depth: f64,
    pub peak_date: Option<NaiveDate>,
    pub trough_date: Option<NaiveDate>,
    /// First date the curve regained the peak, if it did
    pub recovery_date: Option<NaiveDate>,
}

/// Regression of strategy returns on benchmark returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlphaBeta {
    /// Mean per-period excess over `beta` times the benchmark
    pub alpha: f64,
    pub alpha_annualized: f64,
    pub beta: f64,
    pub correlation: f64,
    /// Number of overlapping return periods used
    pub periods: usize,
}

/// Strategy performance relative to a benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub total_return: f64,
    pub annualized_return: f64,
    /// Strategy total return minus benchmark total return
    pub excess_return: f64,
    pub alpha_beta: Option<AlphaBeta>,
}

/// A metric that could not be computed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricError {
    pub metric: String,
    pub message: String,
}

/// Aggregate performance statistics of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Number of snapshots
    pub observations: usize,
    pub initial_value: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    /// Annualized sample standard deviation of period returns
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: Drawdown,
    /// Fraction of rebalance periods with a positive return
    pub win_rate: f64,
    pub rebalance_periods: usize,
    pub best_period: f64,
    pub worst_period: f64,
    pub benchmark: Option<BenchmarkComparison>,
    #[serde(default)]
    pub metric_errors: Vec<MetricError>,
}

impl Default for PerformanceReport {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            observations: 0,
            initial_value: 0.0,
            final_value: 0.0,
            total_return: 0.0,
            annualized_return: 0.0,
            volatility: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            max_drawdown: Drawdown::default(),
            win_rate: 0.0,
            rebalance_periods: 0,
            best_period: 0.0,
            worst_period: 0.0,
            benchmark: None,
            metric_errors: Vec::new(),
        }
    }
}

/// Computes return and risk statistics from a snapshot sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalyzer {
    /// Annual risk-free rate
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            periods_per_year: TRADING_DAYS_PER_YEAR,
        }
    }
}

impl PerformanceAnalyzer {
    pub fn new(risk_free_rate: f64) -> Self {
        Self {
            risk_free_rate,
            ..Self::default()
        }
    }

    /// Risk-free rate per period.
    pub fn period_risk_free(&self) -> f64 {
        self.risk_free_rate / self.periods_per_year
    }

    /// Compute every metric for `snapshots`, optionally against a benchmark.
    ///
    /// Metrics that need more data than available are reported as zero and
    /// listed in `metric_errors`.
    pub fn analyze(&self, snapshots: &[Snapshot], benchmark: Option<&[BenchmarkPoint]>) -> PerformanceReport {
        let mut report = PerformanceReport {
            observations: snapshots.len(),
            ..PerformanceReport::default()
        };
        let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
            return report;
        };

        let dates: Vec<NaiveDate> = snapshots.iter().map(|s| s.date).collect();
        let values = equity_values(snapshots);
        let returns = period_returns(&values);

        report.start_date = Some(first.date);
        report.end_date = Some(last.date);
        report.initial_value = values[0];
        report.final_value = values[values.len() - 1];
        report.total_return = total_return(&values);
        report.annualized_return = self.annualized_return(report.total_return, returns.len());
        report.max_drawdown = max_drawdown(&dates, &values);

        if returns.len() < 2 {
            for metric in ["volatility", "sharpe_ratio", "sortino_ratio"] {
                report.metric_errors.push(MetricError {
                    metric: metric.into(),
                    message: format!("need at least 2 period returns, have {}", returns.len()),
                });
            }
        }
        report.volatility = self.volatility(&returns);
        report.sharpe_ratio = self.sharpe_ratio(&returns);
        report.sortino_ratio = self.sortino_ratio(&returns);
        report.calmar_ratio = calmar_ratio(report.annualized_return, report.max_drawdown.depth);
        if !returns.is_empty() {
            report.best_period = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            report.worst_period = returns.iter().copied().fold(f64::INFINITY, f64::min);
        }

        let (win_rate, periods) = win_rate(snapshots);
        report.win_rate = win_rate;
        report.rebalance_periods = periods;

        if let Some(benchmark) = benchmark {
            report.benchmark = self.compare(snapshots, report.total_return, benchmark, &mut report.metric_errors);
        }

        report
    }

    fn compare(
        &self,
        snapshots: &[Snapshot],
        strategy_return: f64,
        benchmark: &[BenchmarkPoint],
        errors: &mut Vec<MetricError>,
    ) -> Option<BenchmarkComparison> {
        let start = snapshots.first()?.date;
        let end = snapshots.last()?.date;
        let window: Vec<f64> = benchmark
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .map(|p| p.value)
            .collect();
        if window.is_empty() {
            errors.push(MetricError {
                metric: "benchmark".into(),
                message: "benchmark has no observations in the run window".into(),
            });
            return None;
        }

        let total = total_return(&window);
        let alpha_beta = match self.alpha_beta(snapshots, benchmark) {
            Ok(ab) => Some(ab),
            Err(e) => {
                errors.push(MetricError {
                    metric: "alpha_beta".into(),
                    message: e.to_string(),
                });
                None
            }
        };

        Some(BenchmarkComparison {
            total_return: total,
            annualized_return: self.annualized_return(total, window.len().saturating_sub(1)),
            excess_return: strategy_return - total,
            alpha_beta,
        })
    }

    /// Geometric annualization of a total return over `periods` returns.
    pub fn annualized_return(&self, total_return: f64, periods: usize) -> f64 {
        if periods == 0 || total_return <= -1.0 {
            return if total_return <= -1.0 { -1.0 } else { 0.0 };
        }
        (1.0 + total_return).powf(self.periods_per_year / periods as f64) - 1.0
    }

    /// Annualized sample standard deviation; zero with fewer than 2 returns.
    pub fn volatility(&self, returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        returns.std_dev() * self.periods_per_year.sqrt()
    }

    /// Annualized mean excess return over its standard deviation.
    pub fn sharpe_ratio(&self, returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let rf = self.period_risk_free();
        let excess: Vec<f64> = returns.iter().map(|r| r - rf).collect();
        let std = (&excess).std_dev();
        if !std.is_finite() || std <= EPSILON {
            return 0.0;
        }
        (&excess).mean() / std * self.periods_per_year.sqrt()
    }

    /// Like Sharpe, but penalizing only returns below the risk-free rate.
    pub fn sortino_ratio(&self, returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let rf = self.period_risk_free();
        let excess: Vec<f64> = returns.iter().map(|r| r - rf).collect();
        let downside = excess
            .iter()
            .map(|r| r.min(0.0).powi(2))
            .sum::<f64>()
            / excess.len() as f64;
        let downside_dev = downside.sqrt();
        if downside_dev <= EPSILON {
            return 0.0;
        }
        (&excess).mean() / downside_dev * self.periods_per_year.sqrt()
    }

    /// Regress strategy period returns on benchmark returns over the dates
    /// both series share.
    pub fn alpha_beta(&self, snapshots: &[Snapshot], benchmark: &[BenchmarkPoint]) -> BacktestResult<AlphaBeta> {
        let by_date: BTreeMap<NaiveDate, f64> = benchmark.iter().map(|p| (p.date, p.value)).collect();
        let pairs: Vec<(f64, f64)> = snapshots
            .iter()
            .filter_map(|s| {
                let bench = by_date.get(&s.date)?;
                Some((s.total_value.to_f64().unwrap_or(0.0), *bench))
            })
            .collect();

        let strategy: Vec<f64> = period_returns(&pairs.iter().map(|p| p.0).collect::<Vec<_>>());
        let bench: Vec<f64> = period_returns(&pairs.iter().map(|p| p.1).collect::<Vec<_>>());

        if strategy.len() < 2 {
            return Err(BacktestError::InsufficientData {
                metric: "alpha_beta".into(),
                required: 2,
                available: strategy.len(),
            });
        }

        let mean_s = (&strategy).mean();
        let mean_b = (&bench).mean();
        let var_b = (&bench).variance();
        let (beta, correlation) = if var_b <= EPSILON * EPSILON {
            (0.0, 0.0)
        } else {
            let cov = (&strategy).covariance(&bench);
            let std_s = (&strategy).std_dev();
            let correlation = if std_s <= EPSILON { 0.0 } else { cov / (std_s * var_b.sqrt()) };
            (cov / var_b, correlation)
        };
        let alpha = mean_s - beta * mean_b;

        Ok(AlphaBeta {
            alpha,
            alpha_annualized: alpha * self.periods_per_year,
            beta,
            correlation,
            periods: strategy.len(),
        })
    }
}

/// Total portfolio value of each snapshot as `f64`.
pub fn equity_values(snapshots: &[Snapshot]) -> Vec<f64> {
    snapshots
        .iter()
        .map(|s| s.total_value.to_f64().unwrap_or(0.0))
        .collect()
}

/// Simple returns between consecutive values. A zero base yields a zero return.
pub fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
        .collect()
}

/// `last / first - 1`, zero for empty or zero-based series.
pub fn total_return(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if *first != 0.0 => last / first - 1.0,
        _ => 0.0,
    }
}

/// Deepest decline from a running peak, with its dates.
pub fn max_drawdown(dates: &[NaiveDate], values: &[f64]) -> Drawdown {
    let mut drawdown = Drawdown::default();
    let mut peak_value = f64::MIN;
    let mut peak_date = None;
    let mut worst_peak_value = 0.0;
    let mut trough_idx = None;

    for (idx, (date, value)) in dates.iter().zip(values).enumerate() {
        if *value > peak_value {
            peak_value = *value;
            peak_date = Some(*date);
        }
        if peak_value <= 0.0 {
            continue;
        }
        let depth = value / peak_value - 1.0;
        if depth < drawdown.depth {
            drawdown.depth = depth;
            drawdown.peak_date = peak_date;
            drawdown.trough_date = Some(*date);
            worst_peak_value = peak_value;
            trough_idx = Some(idx);
        }
    }

    if let Some(trough) = trough_idx {
        drawdown.recovery_date = dates
            .iter()
            .zip(values)
            .skip(trough + 1)
            .find(|(_, v)| **v >= worst_peak_value)
            .map(|(d, _)| *d);
    }

    drawdown
}

/// Annualized return over the magnitude of the maximum drawdown.
pub fn calmar_ratio(annualized_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown.abs() <= EPSILON {
        return 0.0;
    }
    annualized_return / max_drawdown.abs()
}

/// Share of rebalance periods with a positive return.
///
/// A period runs from one rebalance snapshot to the next, the last one ending
/// at the final snapshot. Without rebalance flags every snapshot starts a
/// period.
pub fn win_rate(snapshots: &[Snapshot]) -> (f64, usize) {
    let mut boundaries: Vec<usize> = snapshots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.rebalanced)
        .map(|(i, _)| i)
        .collect();
    if boundaries.is_empty() {
        boundaries = (0..snapshots.len()).collect();
    }
    if let Some(last) = snapshots.len().checked_sub(1) {
        if boundaries.last() != Some(&last) {
            boundaries.push(last);
        }
    }

    let returns: Vec<f64> = boundaries
        .windows(2)
        .map(|w| {
            let start = snapshots[w[0]].total_value.to_f64().unwrap_or(0.0);
            let end = snapshots[w[1]].total_value.to_f64().unwrap_or(0.0);
            if start == 0.0 {
                0.0
            } else {
                end / start - 1.0
            }
        })
        .collect();

    if returns.is_empty() {
        return (0.0, 0);
    }
    let wins = returns.iter().filter(|r| **r > 0.0).count();
    (wins as f64 / returns.len() as f64, returns.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(d as u64)
    }

    fn snapshots(values: &[f64]) -> Vec<Snapshot> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let value = Decimal::try_from(*v).unwrap();
                Snapshot {
                    date: day(i as u32),
                    cash: value,
                    positions: BTreeMap::new(),
                    positions_value: Decimal::ZERO,
                    total_value: value,
                    rebalanced: i == 0,
                }
            })
            .collect()
    }

    #[test]
    fn test_two_day_return() {
        let report = PerformanceAnalyzer::default().analyze(&snapshots(&[100.0, 110.0]), None);
        assert!((report.total_return - 0.10).abs() < 1e-12);
        assert_eq!(report.sharpe_ratio, 0.0);
        assert!(report.metric_errors.iter().any(|e| e.metric == "volatility"));
    }

    #[test]
    fn test_short_series_flags_every_dispersion_metric() {
        for values in [&[100.0][..], &[100.0, 90.0][..]] {
            let report = PerformanceAnalyzer::default().analyze(&snapshots(values), None);
            let flagged: Vec<&str> = report.metric_errors.iter().map(|e| e.metric.as_str()).collect();
            assert_eq!(flagged, vec!["volatility", "sharpe_ratio", "sortino_ratio"]);
            assert_eq!(report.sortino_ratio, 0.0);
        }
    }

    #[test]
    fn test_monotone_curve_has_no_drawdown() {
        let report = PerformanceAnalyzer::default().analyze(&snapshots(&[100.0, 101.0, 103.0, 107.0]), None);
        assert_eq!(report.max_drawdown.depth, 0.0);
        assert!(report.max_drawdown.trough_date.is_none());
        assert_eq!(report.calmar_ratio, 0.0);
    }

    #[test]
    fn test_drawdown_dates() {
        let values = [100.0, 120.0, 90.0, 100.0, 125.0];
        let dates: Vec<NaiveDate> = (0..5).map(day).collect();
        let drawdown = max_drawdown(&dates, &values);

        assert!((drawdown.depth - (-0.25)).abs() < 1e-12);
        assert_eq!(drawdown.peak_date, Some(day(1)));
        assert_eq!(drawdown.trough_date, Some(day(2)));
        assert_eq!(drawdown.recovery_date, Some(day(4)));
    }

    #[test]
    fn test_constant_returns_sharpe_is_zero() {
        let analyzer = PerformanceAnalyzer::default();
        assert_eq!(analyzer.sharpe_ratio(&[0.01, 0.01, 0.01]), 0.0);
        assert_eq!(analyzer.sharpe_ratio(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_sharpe_sign_follows_excess_return() {
        let analyzer = PerformanceAnalyzer::new(0.0);
        assert!(analyzer.sharpe_ratio(&[0.01, 0.02, -0.005, 0.015]) > 0.0);
        assert!(analyzer.sharpe_ratio(&[-0.01, -0.02, 0.005, -0.015]) < 0.0);
    }

    #[test]
    fn test_sortino_without_downside_is_zero() {
        let analyzer = PerformanceAnalyzer::new(0.0);
        assert_eq!(analyzer.sortino_ratio(&[0.01, 0.02]), 0.0);
        assert!(analyzer.sortino_ratio(&[0.02, -0.01, 0.01]) > 0.0);
    }

    #[test]
    fn test_annualized_return() {
        let analyzer = PerformanceAnalyzer::default();
        let annual = analyzer.annualized_return(0.10, 252);
        assert!((annual - 0.10).abs() < 1e-12);
        assert_eq!(analyzer.annualized_return(0.10, 0), 0.0);
    }

    #[test]
    fn test_win_rate_over_rebalance_periods() {
        let mut snaps = snapshots(&[100.0, 105.0, 103.0, 101.0, 99.0]);
        snaps[2].rebalanced = true;
        // periods: 100 -> 103 (win), 103 -> 99 (loss)
        let (rate, periods) = win_rate(&snaps);
        assert_eq!(periods, 2);
        assert!((rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_alpha_beta_against_self() {
        let snaps = snapshots(&[100.0, 102.0, 101.0, 104.0, 103.0]);
        let benchmark: Vec<BenchmarkPoint> = snaps
            .iter()
            .map(|s| BenchmarkPoint {
                date: s.date,
                value: s.total_value.to_f64().unwrap(),
            })
            .collect();

        let ab = PerformanceAnalyzer::default().alpha_beta(&snaps, &benchmark).unwrap();
        assert!((ab.beta - 1.0).abs() < 1e-9);
        assert!(ab.alpha.abs() < 1e-12);
        assert!((ab.correlation - 1.0).abs() < 1e-9);
        assert_eq!(ab.periods, 4);
    }

    #[test]
    fn test_alpha_beta_needs_overlap() {
        let snaps = snapshots(&[100.0, 102.0, 101.0]);
        let benchmark = vec![BenchmarkPoint { date: day(0), value: 50.0 }];

        let result = PerformanceAnalyzer::default().alpha_beta(&snaps, &benchmark);
        assert!(matches!(result, Err(BacktestError::InsufficientData { available: 0, .. })));
    }

    #[test]
    fn test_flat_benchmark_gives_zero_beta() {
        let snaps = snapshots(&[100.0, 102.0, 101.0, 104.0]);
        let benchmark: Vec<BenchmarkPoint> = snaps
            .iter()
            .map(|s| BenchmarkPoint { date: s.date, value: 10.0 })
            .collect();

        let report = PerformanceAnalyzer::default().analyze(&snaps, Some(&benchmark));
        let comparison = report.benchmark.unwrap();
        assert_eq!(comparison.total_return, 0.0);
        let ab = comparison.alpha_beta.unwrap();
        assert_eq!(ab.beta, 0.0);
        assert!(ab.alpha > 0.0);
    }
}
