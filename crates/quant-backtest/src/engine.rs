//! Backtesting engine.

use chrono::{Days, NaiveDate, Utc};
use futures::future::join_all;
use num_traits::ToPrimitive;
use quant_core::{
    BacktestError, BacktestResult, DataError, MarketData, MarketDataProvider, Snapshot, Strategy,
    StrategyError, Trade,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::costs::CostModel;
use crate::performance::{BenchmarkPoint, PerformanceAnalyzer, DEFAULT_RISK_FREE_RATE};
use crate::portfolio::{Portfolio, PortfolioEvent};
use crate::rebalance::{target_weights, CashPolicy, Rebalancer};
use crate::report::{BacktestReport, RunStatus, RunSummary};
use crate::schedule::RebalanceFrequency;

/// Backtest configuration shared by every run of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Commission and slippage
    pub costs: CostModel,
    /// Quantities are rounded down to a multiple of this
    pub lot_size: Decimal,
    pub cash_policy: CashPolicy,
    /// Minimum weight drift before a position is adjusted (0 = always)
    pub rebalance_threshold: Decimal,
    /// Annual risk-free rate for Sharpe and Sortino
    pub risk_free_rate: f64,
    /// Calendar days of history fetched before the start date
    pub lookback_days: u64,
    /// Upper bound on a single data provider request
    pub data_timeout_secs: u64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            costs: CostModel::default(),
            lot_size: Decimal::ONE,
            cash_policy: CashPolicy::default(),
            rebalance_threshold: Decimal::ZERO,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            lookback_days: 365,
            data_timeout_secs: 30,
        }
    }
}

impl BacktestConfig {
    pub fn with_costs(mut self, costs: CostModel) -> Self {
        self.costs = costs;
        self
    }

    pub fn with_cash_policy(mut self, policy: CashPolicy) -> Self {
        self.cash_policy = policy;
        self
    }

    pub fn with_lot_size(mut self, lot_size: Decimal) -> Self {
        self.lot_size = lot_size;
        self
    }

    pub fn validate(&self) -> BacktestResult<()> {
        self.costs.validate()?;
        if self.lot_size <= Decimal::ZERO {
            return Err(BacktestError::Config("lot_size must be positive".into()));
        }
        if self.rebalance_threshold < Decimal::ZERO || self.rebalance_threshold >= Decimal::ONE {
            return Err(BacktestError::Config(
                "rebalance_threshold must be in [0, 1)".into(),
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(BacktestError::Config("risk_free_rate must be finite".into()));
        }
        if self.data_timeout_secs == 0 {
            return Err(BacktestError::Config("data_timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Parameters of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub universe: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub initial_capital: Decimal,
    #[serde(default)]
    pub rebalance: RebalanceFrequency,
    /// Symbol whose closes serve as the benchmark series
    #[serde(default)]
    pub benchmark: Option<String>,
}

impl RunSpec {
    pub fn new(universe: Vec<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            universe,
            start,
            end,
            initial_capital: dec!(100000),
            rebalance: RebalanceFrequency::default(),
            benchmark: None,
        }
    }

    pub fn with_capital(mut self, capital: Decimal) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_rebalance(mut self, rebalance: RebalanceFrequency) -> Self {
        self.rebalance = rebalance;
        self
    }

    pub fn with_benchmark(mut self, symbol: impl Into<String>) -> Self {
        self.benchmark = Some(symbol.into());
        self
    }

    pub fn validate(&self) -> BacktestResult<()> {
        if self.universe.is_empty() {
            return Err(BacktestError::Config("universe is empty".into()));
        }
        if self.start > self.end {
            return Err(BacktestError::Config(format!(
                "start date {} is after end date {}",
                self.start, self.end
            )));
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(BacktestError::Config("initial capital must be positive".into()));
        }
        self.rebalance.validate()
    }

    /// Universe plus the benchmark symbol, without duplicates.
    pub fn data_symbols(&self) -> Vec<String> {
        let mut symbols: BTreeSet<String> = self.universe.iter().cloned().collect();
        if let Some(benchmark) = &self.benchmark {
            symbols.insert(benchmark.clone());
        }
        symbols.into_iter().collect()
    }
}

/// Cooperative cancellation flag, checked between simulated dates.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A run that stopped on an error, with everything simulated before it.
#[derive(Debug, Error)]
#[error("backtest failed: {error}")]
pub struct RunFailure {
    #[source]
    pub error: BacktestError,
    pub report: Box<BacktestReport>,
}

impl RunFailure {
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Mutable state of a run in progress.
struct RunState {
    portfolio: Portfolio,
    snapshots: Vec<Snapshot>,
    trades: Vec<Trade>,
    events: Vec<PortfolioEvent>,
    rebalance_count: usize,
}

impl RunState {
    fn new(initial_capital: Decimal) -> Self {
        Self {
            portfolio: Portfolio::new(initial_capital),
            snapshots: Vec::new(),
            trades: Vec::new(),
            events: Vec::new(),
            rebalance_count: 0,
        }
    }

    fn commit(&mut self, mut step: Step) {
        self.events.extend(step.portfolio.take_events());
        self.portfolio = step.portfolio;
        self.trades.extend(step.trades);
        if step.snapshot.rebalanced {
            self.rebalance_count += 1;
        }
        self.snapshots.push(step.snapshot);
    }
}

/// Result of simulating one date on a staged copy of the portfolio.
struct Step {
    portfolio: Portfolio,
    snapshot: Snapshot,
    trades: Vec<Trade>,
}

/// Backtesting engine.
///
/// Replays a strategy over daily bars: on each rebalance date the strategy
/// is consulted and the portfolio is moved onto its target weights at the
/// close; every trading date ends with a mark-to-market snapshot.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
    rebalancer: Rebalancer,
    analyzer: PerformanceAnalyzer,
    cancel: CancelToken,
}

impl BacktestEngine {
    /// Create a new backtest engine.
    pub fn new(config: BacktestConfig) -> Self {
        let rebalancer = Rebalancer::new(config.costs.clone(), config.lot_size, config.cash_policy)
            .with_threshold(config.rebalance_threshold);
        let analyzer = PerformanceAnalyzer::new(config.risk_free_rate);
        Self {
            config,
            rebalancer,
            analyzer,
            cancel: CancelToken::new(),
        }
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &PerformanceAnalyzer {
        &self.analyzer
    }

    /// Fetch everything a run needs from `provider`, bounded by the data timeout.
    pub async fn load_market_data(
        &self,
        provider: &dyn MarketDataProvider,
        spec: &RunSpec,
    ) -> BacktestResult<MarketData> {
        let symbols = spec.data_symbols();
        let from = spec
            .start
            .checked_sub_days(Days::new(self.config.lookback_days))
            .unwrap_or(spec.start);
        let timeout = Duration::from_secs(self.config.data_timeout_secs);
        let millis = timeout.as_millis() as u64;

        info!(
            provider = provider.name(),
            symbols = symbols.len(),
            from = %from,
            to = %spec.end,
            "Loading market data"
        );

        let bars = tokio::time::timeout(timeout, provider.bars(&symbols, from, spec.end))
            .await
            .map_err(|_| DataError::Timeout { millis })??;
        let delistings = tokio::time::timeout(timeout, provider.delistings(&symbols))
            .await
            .map_err(|_| DataError::Timeout { millis })??;

        debug!(bars = bars.len(), delistings = delistings.len(), "Market data loaded");
        Ok(MarketData::from_bars(bars)?.with_delistings(delistings))
    }

    /// Run a backtest, fetching data from `provider` first.
    pub async fn run(
        &self,
        strategy: &dyn Strategy,
        provider: &dyn MarketDataProvider,
        spec: &RunSpec,
    ) -> Result<BacktestReport, RunFailure> {
        if let Err(error) = self.validate(spec) {
            return Err(self.fail(error, strategy, spec, None, RunState::new(spec.initial_capital)));
        }

        match self.load_market_data(provider, spec).await {
            Ok(data) => self.run_with_data(strategy, &data, spec),
            Err(error) => {
                error!(strategy = strategy.name(), error = %error, "Market data load failed");
                Err(self.fail(error, strategy, spec, None, RunState::new(spec.initial_capital)))
            }
        }
    }

    /// Run several strategies over the same data in parallel.
    ///
    /// Runs share nothing but the read-only market data; results come back
    /// in the order of `strategies`.
    pub async fn run_batch(
        &self,
        strategies: Vec<Arc<dyn Strategy>>,
        data: Arc<MarketData>,
        spec: RunSpec,
    ) -> Vec<Result<BacktestReport, RunFailure>> {
        let names: Vec<String> = strategies.iter().map(|s| s.name().to_string()).collect();
        let handles = strategies.into_iter().map(|strategy| {
            let engine = self.clone();
            let data = Arc::clone(&data);
            let spec = spec.clone();
            tokio::task::spawn_blocking(move || engine.run_with_data(strategy.as_ref(), &data, &spec))
        });

        join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, name)| match joined {
                Ok(result) => result,
                Err(e) => {
                    let error = BacktestError::Strategy(StrategyError::Internal(format!(
                        "run of {} did not complete: {}",
                        name, e
                    )));
                    let report = self.build_report(
                        &name,
                        "",
                        serde_json::Value::Null,
                        &spec,
                        None,
                        RunState::new(spec.initial_capital),
                        RunStatus::Failed,
                        Some(error.to_string()),
                    );
                    Err(RunFailure {
                        error,
                        report: Box::new(report),
                    })
                }
            })
            .collect()
    }

    /// Simulate `strategy` over prefetched data.
    ///
    /// Each date is applied to a staged copy of the portfolio and committed
    /// only if every step succeeds, so a failure report holds exactly the
    /// dates before the failing one.
    pub fn run_with_data(
        &self,
        strategy: &dyn Strategy,
        data: &MarketData,
        spec: &RunSpec,
    ) -> Result<BacktestReport, RunFailure> {
        let mut state = RunState::new(spec.initial_capital);
        if let Err(error) = self.validate(spec) {
            return Err(self.fail(error, strategy, spec, Some(data), state));
        }

        let calendar = data.trading_calendar(&spec.universe, spec.start, spec.end);
        if calendar.is_empty() {
            return Err(self.fail(
                DataError::NoDataAvailable.into(),
                strategy,
                spec,
                Some(data),
                state,
            ));
        }
        let rebalance_days = spec.rebalance.rebalance_dates(&calendar);

        info!(
            strategy = strategy.name(),
            start = %spec.start,
            end = %spec.end,
            trading_days = calendar.len(),
            rebalances = rebalance_days.len(),
            "Starting backtest"
        );

        let mut status = RunStatus::Completed;
        for date in calendar {
            if self.cancel.is_cancelled() {
                warn!(strategy = strategy.name(), date = %date, "Backtest cancelled");
                status = RunStatus::Cancelled;
                break;
            }

            let rebalance = rebalance_days.contains(&date);
            match self.step(strategy, data, spec, &state.portfolio, date, rebalance) {
                Ok(step) => state.commit(step),
                Err(error) => {
                    error!(strategy = strategy.name(), date = %date, error = %error, "Backtest aborted");
                    return Err(self.fail(error, strategy, spec, Some(data), state));
                }
            }
        }

        let report = self.build_report(
            strategy.name(),
            strategy.description(),
            strategy.parameters(),
            spec,
            Some(data),
            state,
            status,
            None,
        );
        info!(
            strategy = strategy.name(),
            final_value = %report.run.final_value,
            total_return = report.metrics.total_return,
            sharpe = report.metrics.sharpe_ratio,
            trades = report.run.total_trades,
            "Backtest finished"
        );
        Ok(report)
    }

    fn validate(&self, spec: &RunSpec) -> BacktestResult<()> {
        self.config.validate()?;
        spec.validate()
    }

    fn step(
        &self,
        strategy: &dyn Strategy,
        data: &MarketData,
        spec: &RunSpec,
        portfolio: &Portfolio,
        date: NaiveDate,
        rebalance: bool,
    ) -> BacktestResult<Step> {
        let mut staged = portfolio.clone();
        let mut trades = Vec::new();

        if rebalance {
            let decision = strategy.decide(&spec.universe, &staged.holdings(), &data.view(date))?;
            let targets = target_weights(&decision.weights)?;
            debug!(
                date = %date,
                selected = decision.selected.len(),
                targets = targets.len(),
                "Rebalancing"
            );
            trades = self.rebalancer.rebalance(&mut staged, &targets, date, data)?;
        }

        let outcome = staged.mark_to_market(date, data)?;
        trades.extend(outcome.liquidations);
        let mut snapshot = outcome.snapshot;
        snapshot.rebalanced = rebalance;

        Ok(Step {
            portfolio: staged,
            snapshot,
            trades,
        })
    }

    fn fail(
        &self,
        error: BacktestError,
        strategy: &dyn Strategy,
        spec: &RunSpec,
        data: Option<&MarketData>,
        state: RunState,
    ) -> RunFailure {
        let report = self.build_report(
            strategy.name(),
            strategy.description(),
            strategy.parameters(),
            spec,
            data,
            state,
            RunStatus::Failed,
            Some(error.to_string()),
        );
        RunFailure {
            error,
            report: Box::new(report),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_report(
        &self,
        strategy: &str,
        description: &str,
        parameters: serde_json::Value,
        spec: &RunSpec,
        data: Option<&MarketData>,
        state: RunState,
        status: RunStatus,
        error: Option<String>,
    ) -> BacktestReport {
        let benchmark = match (&spec.benchmark, data) {
            (Some(symbol), Some(data)) => Some(benchmark_series(data, symbol, spec.start, spec.end)),
            _ => None,
        }
        .filter(|series| !series.is_empty());

        let metrics = self.analyzer.analyze(&state.snapshots, benchmark.as_deref());
        let final_value = state
            .snapshots
            .last()
            .map(|s| s.total_value)
            .unwrap_or(spec.initial_capital);

        BacktestReport {
            run: RunSummary {
                id: Uuid::new_v4(),
                strategy: strategy.to_string(),
                description: description.to_string(),
                parameters,
                universe: spec.universe.clone(),
                start_date: spec.start,
                end_date: spec.end,
                rebalance: spec.rebalance.clone(),
                benchmark: spec.benchmark.clone(),
                initial_capital: spec.initial_capital,
                final_value,
                trading_days: state.snapshots.len(),
                rebalance_count: state.rebalance_count,
                total_trades: state.trades.len(),
                total_commission: state.trades.iter().map(|t| t.commission).sum(),
                total_slippage: state.trades.iter().map(|t| t.slippage).sum(),
                status,
                error,
                created_at: Utc::now(),
            },
            config: self.config.clone(),
            metrics,
            snapshots: state.snapshots,
            trades: state.trades,
            events: state.events,
            benchmark,
        }
    }
}

/// Closes of `symbol` within `[start, end]` as a benchmark series.
pub fn benchmark_series(data: &MarketData, symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<BenchmarkPoint> {
    data.close_series(symbol)
        .into_iter()
        .filter(|(date, _)| *date >= start && *date <= end)
        .filter_map(|(date, close)| {
            Some(BenchmarkPoint {
                date,
                value: close.to_f64()?,
            })
        })
        .collect()
}
