//! Static Weights Strategy.
//!
//! Rebalances to a fixed target weight per symbol. Weights summing to less
//! than 1.0 leave the remainder in cash unless `normalize` is set.

use chrono::NaiveDate;
use quant_core::{Holdings, MarketView, Signal, Strategy, StrategyConfig, StrategyError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{allocation, screening, signals};

const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Configuration for the Static Weights strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticWeightsConfig {
    /// Symbols allowed in the portfolio
    pub symbols: Vec<String>,
    /// Target weight per symbol
    pub weights: BTreeMap<String, f64>,
    /// Rescale the weights of tradeable symbols to sum to 1.0
    pub normalize: bool,
}

impl StrategyConfig for StaticWeightsConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.symbols.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one symbol required".into(),
            ));
        }
        if self.weights.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one target weight required".into(),
            ));
        }
        for (symbol, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(StrategyError::InvalidConfig(format!(
                    "Weight for {} must be a non-negative number",
                    symbol
                )));
            }
            if !self.symbols.contains(symbol) {
                return Err(StrategyError::InvalidConfig(format!(
                    "Weight given for {} which is not in symbols",
                    symbol
                )));
            }
        }
        let total: f64 = self.weights.values().sum();
        if !self.normalize && total > 1.0 + WEIGHT_TOLERANCE {
            return Err(StrategyError::InvalidConfig(format!(
                "Weights sum to {:.4}, must be at most 1.0",
                total
            )));
        }
        Ok(())
    }
}

/// Static Weights Strategy.
pub struct StaticWeights {
    config: StaticWeightsConfig,
}

impl StaticWeights {
    /// Create a new Static Weights strategy.
    pub fn new(config: StaticWeightsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StaticWeightsConfig {
        &self.config
    }
}

impl Strategy for StaticWeights {
    fn name(&self) -> &str {
        "static_weights"
    }

    fn description(&self) -> &str {
        "Rebalances to fixed target weights"
    }

    fn screen(
        &self,
        universe: &[String],
        _date: NaiveDate,
        market: &MarketView<'_>,
    ) -> Result<BTreeSet<String>, StrategyError> {
        let wanted = universe.iter().filter(|s| {
            self.config.symbols.contains(s)
                && self.config.weights.get(s.as_str()).copied().unwrap_or(0.0) > 0.0
        });
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
        selected: &BTreeSet<String>,
        _signals: &BTreeMap<String, Signal>,
        _holdings: &Holdings,
        _market: &MarketView<'_>,
        _date: NaiveDate,
    ) -> Result<BTreeMap<String, f64>, StrategyError> {
        if selected.is_empty() {
            return Ok(BTreeMap::new());
        }
        if self.config.normalize {
            return Ok(allocation::target_weight(selected, &self.config.weights));
        }
        Ok(selected
            .iter()
            .filter_map(|s| self.config.weights.get(s).map(|w| (s.clone(), *w)))
            .collect())
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{day, market, series, symbols};

    fn config(normalize: bool) -> StaticWeightsConfig {
        StaticWeightsConfig {
            symbols: symbols(&["SPY", "TLT", "GLD"]),
            weights: [
                ("SPY".to_string(), 0.6),
                ("TLT".to_string(), 0.3),
                ("GLD".to_string(), 0.05),
            ]
            .into(),
            normalize,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(config(false).validate().is_ok());

        let mut over = config(false);
        over.weights.insert("GLD".into(), 0.5);
        assert!(over.validate().is_err());
        over.normalize = true;
        assert!(over.validate().is_ok());

        let mut stranger = config(false);
        stranger.weights.insert("QQQ".into(), 0.01);
        assert!(stranger.validate().is_err());

        let mut negative = config(false);
        negative.weights.insert("TLT".into(), -0.1);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_keeps_cash_remainder() {
        let data = market(vec![
            series("SPY", &[400.0], 1.0),
            series("TLT", &[100.0], 1.0),
            series("GLD", &[180.0], 1.0),
        ]);
        let universe = symbols(&["SPY", "TLT", "GLD"]);

        let decision = StaticWeights::new(config(false))
            .decide(&universe, &Holdings::default(), &data.view(day(0)))
            .unwrap();

        let total: f64 = decision.weights.values().sum();
        assert!((total - 0.95).abs() < 1e-12);
        assert_eq!(decision.weights["SPY"], 0.6);
    }

    #[test]
    fn test_normalize_over_tradeable_symbols() {
        // GLD has no bar today
        let data = market(vec![series("SPY", &[400.0], 1.0), series("TLT", &[100.0], 1.0)]);
        let universe = symbols(&["SPY", "TLT", "GLD"]);

        let decision = StaticWeights::new(config(true))
            .decide(&universe, &Holdings::default(), &data.view(day(0)))
            .unwrap();

        assert!(!decision.weights.contains_key("GLD"));
        assert!((decision.weights["SPY"] - 2.0 / 3.0).abs() < 1e-12);
        assert!((decision.weights["TLT"] - 1.0 / 3.0).abs() < 1e-12);
    }
}
