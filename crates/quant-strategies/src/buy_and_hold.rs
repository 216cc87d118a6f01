//! Buy and Hold Strategy.
//!
//! Holds every configured symbol that trades, equally weighted. Scheduled
//! rebalances bring drifted positions back to equal weight.

use chrono::NaiveDate;
use quant_core::{Holdings, MarketView, Signal, Strategy, StrategyConfig, StrategyError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{allocation, screening, signals};

/// Configuration for the Buy and Hold strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyAndHoldConfig {
    /// Symbols to hold
    pub symbols: Vec<String>,
    /// Fraction of portfolio value to invest, the rest stays in cash
    pub invested_fraction: f64,
}

impl Default for BuyAndHoldConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            invested_fraction: 1.0,
        }
    }
}

impl BuyAndHoldConfig {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols,
            ..Default::default()
        }
    }
}

impl StrategyConfig for BuyAndHoldConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.symbols.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one symbol required".into(),
            ));
        }
        if !(self.invested_fraction > 0.0 && self.invested_fraction <= 1.0) {
            return Err(StrategyError::InvalidConfig(
                "Invested fraction must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Buy and Hold Strategy.
pub struct BuyAndHold {
    config: BuyAndHoldConfig,
}

impl BuyAndHold {
    /// Create a new Buy and Hold strategy.
    pub fn new(config: BuyAndHoldConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuyAndHoldConfig {
        &self.config
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn description(&self) -> &str {
        "Equal-weight position in every configured symbol"
    }

    fn screen(
        &self,
        universe: &[String],
        _date: NaiveDate,
        market: &MarketView<'_>,
    ) -> Result<BTreeSet<String>, StrategyError> {
        let wanted = universe.iter().filter(|s| self.config.symbols.contains(s));
        Ok(screening::tradeable(wanted, market))
    }

    fn signals(
        &self,
        selected: &BTreeSet<String>,
        _market: &MarketView<'_>,
        _date: NaiveDate,
    ) -> Result<BTreeMap<String, Signal>, StrategyError> {
        Ok(signals::buy_and_hold(selected))
    }

    fn allocate(
        &self,
        _selected: &BTreeSet<String>,
        signals: &BTreeMap<String, Signal>,
        _holdings: &Holdings,
        _market: &MarketView<'_>,
        _date: NaiveDate,
    ) -> Result<BTreeMap<String, f64>, StrategyError> {
        let buys = signals
            .iter()
            .filter(|(_, signal)| **signal == Signal::Buy)
            .map(|(symbol, _)| symbol);
        Ok(allocation::equal_weight(buys)
            .into_iter()
            .map(|(symbol, weight)| (symbol, weight * self.config.invested_fraction))
            .collect())
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}
