//! Price Threshold Strategy.
//!
//! Enters a symbol once it closes above the buy threshold, keeps it while it
//! stays above the sell threshold and exits below it. Positions are equally
//! weighted and capped at `max_positions`.

use chrono::NaiveDate;
use quant_core::{Holdings, MarketView, Signal, Strategy, StrategyConfig, StrategyError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{allocation, screening, signals};

/// Configuration for the Price Threshold strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceThresholdConfig {
    /// Symbols to trade
    pub symbols: Vec<String>,
    /// Close above which a symbol is bought
    pub buy_threshold: f64,
    /// Close below which a held symbol is sold
    pub sell_threshold: f64,
    /// Maximum number of simultaneous positions
    pub max_positions: usize,
}

impl Default for PriceThresholdConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            buy_threshold: 100.0,
            sell_threshold: 80.0,
            max_positions: 20,
        }
    }
}

impl StrategyConfig for PriceThresholdConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.symbols.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one symbol required".into(),
            ));
        }
        if self.sell_threshold >= self.buy_threshold {
            return Err(StrategyError::InvalidConfig(
                "Sell threshold must be below buy threshold".into(),
            ));
        }
        if self.max_positions == 0 {
            return Err(StrategyError::InvalidConfig(
                "max_positions must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Price Threshold Strategy.
pub struct PriceThreshold {
    config: PriceThresholdConfig,
}

impl PriceThreshold {
    /// Create a new Price Threshold strategy.
    pub fn new(config: PriceThresholdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PriceThresholdConfig {
        &self.config
    }
}

impl Strategy for PriceThreshold {
    fn name(&self) -> &str {
        "price_threshold"
    }

    fn description(&self) -> &str {
        "Buys above a price threshold and sells below a lower one"
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
        market: &MarketView<'_>,
        _date: NaiveDate,
    ) -> Result<BTreeMap<String, Signal>, StrategyError> {
        Ok(selected
            .iter()
            .filter_map(|symbol| {
                let price = market.bar(symbol)?.close_f64();
                let signal = signals::price_threshold(
                    price,
                    self.config.buy_threshold,
                    self.config.sell_threshold,
                );
                Some((symbol.clone(), signal))
            })
            .collect())
    }

    fn allocate(
        &self,
        _selected: &BTreeSet<String>,
        signals: &BTreeMap<String, Signal>,
        holdings: &Holdings,
        _market: &MarketView<'_>,
        _date: NaiveDate,
    ) -> Result<BTreeMap<String, f64>, StrategyError> {
        // Held names in the band stay; they fill slots before new entries
        let (mut keep, entries): (Vec<&String>, Vec<&String>) = signals
            .iter()
            .filter(|(symbol, signal)| match signal {
                Signal::Buy => true,
                Signal::Hold => holdings.is_holding(symbol),
                Signal::Sell => false,
            })
            .map(|(symbol, _)| symbol)
            .partition(|symbol| holdings.is_holding(symbol));

        keep.extend(entries);
        keep.truncate(self.config.max_positions);
        Ok(allocation::equal_weight(keep))
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}
