//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::market::MarketView;
use crate::types::{Holdings, Signal};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;
}

/// Everything a strategy decided on one rebalance date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub selected: BTreeSet<String>,
    pub signals: BTreeMap<String, Signal>,
    /// Target fraction of total portfolio value per symbol
    pub weights: BTreeMap<String, f64>,
}

/// Core strategy trait.
///
/// A strategy is a pure function of the date, the point-in-time market view
/// and the current holdings. It is split into three capabilities that the
/// engine calls in order on every rebalance date: screen the universe, emit
/// signals for the selection, then allocate target weights.
pub trait Strategy: Send + Sync {
    /// Get the unique name of this strategy.
    fn name(&self) -> &str;

    /// Select the instruments to consider from `universe`.
    fn screen(
        &self,
        universe: &[String],
        date: NaiveDate,
        market: &MarketView<'_>,
    ) -> Result<BTreeSet<String>, StrategyError>;

    /// Produce a buy/hold/sell signal for each selected instrument.
    fn signals(
        &self,
        selected: &BTreeSet<String>,
        market: &MarketView<'_>,
        date: NaiveDate,
    ) -> Result<BTreeMap<String, Signal>, StrategyError>;

    /// Map instruments to target weights.
    ///
    /// Weights must be non-negative and sum to at most 1.0; the remainder
    /// stays in cash. Held instruments missing from the result are sold.
    fn allocate(
        &self,
        selected: &BTreeSet<String>,
        signals: &BTreeMap<String, Signal>,
        holdings: &Holdings,
        market: &MarketView<'_>,
        date: NaiveDate,
    ) -> Result<BTreeMap<String, f64>, StrategyError>;

    /// Strategy parameters, recorded in the run summary.
    fn parameters(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Get a description of the strategy.
    fn description(&self) -> &str {
        ""
    }

    /// Run screen, signals and allocate in sequence.
    fn decide(
        &self,
        universe: &[String],
        holdings: &Holdings,
        market: &MarketView<'_>,
    ) -> Result<StrategyDecision, StrategyError> {
        let date = market.date();
        let selected = self.screen(universe, date, market)?;
        let signals = self.signals(&selected, market, date)?;
        let weights = self.allocate(&selected, &signals, holdings, market, date)?;
        Ok(StrategyDecision {
            selected,
            signals,
            weights,
        })
    }
}
