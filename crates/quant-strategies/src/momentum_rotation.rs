//! Momentum Rotation Strategy.
//!
//! On every rebalance date ranks the priced universe by trailing return,
//! keeps the strongest names whose short moving average is still above the
//! long one, and weights them by the configured scheme.

use chrono::NaiveDate;
use quant_core::{Holdings, MarketView, Signal, Strategy, StrategyConfig, StrategyError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::allocation::{self, Weighting};
use crate::{screening, signals};

/// Configuration for the Momentum Rotation strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumRotationConfig {
    /// Symbols eligible for rotation
    pub symbols: Vec<String>,
    /// Trailing window for the momentum ranking
    pub lookback_days: usize,
    /// Number of symbols to hold
    pub top_n: usize,
    /// Minimum history before a symbol is ranked
    pub min_periods: usize,
    /// Minimum price for eligibility
    pub min_price: f64,
    /// Maximum price for eligibility
    pub max_price: f64,
    /// Short moving average for the trend filter
    pub short_window: usize,
    /// Long moving average for the trend filter
    pub long_window: usize,
    /// How selected symbols are weighted
    pub weighting: Weighting,
    /// Window for volatility, covariance or momentum weighting
    pub weight_lookback_days: usize,
    /// Exponent applied to momentum scores when weighting by momentum
    pub momentum_power: f64,
}

impl Default for MomentumRotationConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            lookback_days: 126,
            top_n: 5,
            min_periods: 60,
            min_price: 5.0,
            max_price: 1000.0,
            short_window: 20,
            long_window: 50,
            weighting: Weighting::Equal,
            weight_lookback_days: 63,
            momentum_power: 1.0,
        }
    }
}

impl StrategyConfig for MomentumRotationConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.symbols.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one symbol required".into(),
            ));
        }
        if self.lookback_days == 0 || self.weight_lookback_days == 0 {
            return Err(StrategyError::InvalidConfig(
                "Lookback periods must be greater than 0".into(),
            ));
        }
        if self.top_n == 0 {
            return Err(StrategyError::InvalidConfig(
                "top_n must be greater than 0".into(),
            ));
        }
        if self.short_window == 0 || self.short_window >= self.long_window {
            return Err(StrategyError::InvalidConfig(
                "Short window must be positive and less than long window".into(),
            ));
        }
        if self.min_price < 0.0 || self.min_price > self.max_price {
            return Err(StrategyError::InvalidConfig(
                "Price range must satisfy 0 <= min_price <= max_price".into(),
            ));
        }
        if !(self.momentum_power > 0.0) {
            return Err(StrategyError::InvalidConfig(
                "Momentum power must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Momentum Rotation Strategy.
pub struct MomentumRotation {
    config: MomentumRotationConfig,
}

impl MomentumRotation {
    /// Create a new Momentum Rotation strategy.
    pub fn new(config: MomentumRotationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MomentumRotationConfig {
        &self.config
    }
}

impl Strategy for MomentumRotation {
    fn name(&self) -> &str {
        "momentum_rotation"
    }

    fn description(&self) -> &str {
        "Rotates into the strongest trailing performers with a moving-average trend filter"
    }

    fn screen(
        &self,
        universe: &[String],
        date: NaiveDate,
        market: &MarketView<'_>,
    ) -> Result<BTreeSet<String>, StrategyError> {
        let wanted = universe.iter().filter(|s| self.config.symbols.contains(s));
        let tradeable = screening::tradeable(wanted, market);
        let priced = screening::by_price_range(
            &tradeable,
            market,
            self.config.min_price,
            self.config.max_price,
        );
        let ranked = screening::by_momentum(
            &priced,
            market,
            self.config.lookback_days,
            self.config.top_n,
            self.config.min_periods,
        );

        debug!(%date, candidates = tradeable.len(), selected = ranked.len(), "Momentum screen");
        Ok(ranked.into_iter().collect())
    }

    fn signals(
        &self,
        selected: &BTreeSet<String>,
        market: &MarketView<'_>,
        _date: NaiveDate,
    ) -> Result<BTreeMap<String, Signal>, StrategyError> {
        Ok(signals::ma_crossover(
            selected,
            market,
            self.config.short_window,
            self.config.long_window,
        ))
    }

    fn allocate(
        &self,
        _selected: &BTreeSet<String>,
        signals: &BTreeMap<String, Signal>,
        _holdings: &Holdings,
        market: &MarketView<'_>,
        _date: NaiveDate,
    ) -> Result<BTreeMap<String, f64>, StrategyError> {
        let keep: Vec<&String> = signals
            .iter()
            .filter(|(_, signal)| **signal == Signal::Buy)
            .map(|(symbol, _)| symbol)
            .collect();

        Ok(allocation::weigh(
            self.config.weighting,
            keep.iter().copied(),
            market,
            self.config.weight_lookback_days,
            self.config.momentum_power,
        ))
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{day, market, series, symbols};

    fn config() -> MomentumRotationConfig {
        MomentumRotationConfig {
            symbols: symbols(&["UP", "STEADY", "DOWN", "PENNY"]),
            lookback_days: 10,
            top_n: 2,
            min_periods: 10,
            short_window: 3,
            long_window: 6,
            ..Default::default()
        }
    }

    fn line(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.short_window = 10;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.top_n = 0;
        assert!(bad.validate().is_err());

        assert!(MomentumRotationConfig::default().validate().is_err());
    }

    #[test]
    fn test_rotates_into_uptrends() {
        let data = market(vec![
            series("UP", &line(50.0, 2.0, 12), 1.0),
            series("STEADY", &line(50.0, 0.5, 12), 1.0),
            series("DOWN", &line(80.0, -2.0, 12), 1.0),
            series("PENNY", &line(1.0, 0.2, 12), 1.0),
        ]);
        let strategy = MomentumRotation::new(config());
        let universe = symbols(&["UP", "STEADY", "DOWN", "PENNY"]);

        let decision = strategy
            .decide(&universe, &Holdings::default(), &data.view(day(11)))
            .unwrap();

        // PENNY is below the price floor; DOWN ranks last
        assert_eq!(decision.selected, symbols(&["STEADY", "UP"]).into_iter().collect());
        assert_eq!(decision.signals["UP"], Signal::Buy);
        assert!((decision.weights["UP"] - 0.5).abs() < 1e-12);
        assert!((decision.weights["STEADY"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_trend_filter_drops_fading_names() {
        let mut fading = line(50.0, 3.0, 9);
        fading.extend([70.0, 66.0, 62.0]);
        let data = market(vec![
            series("UP", &line(50.0, 2.0, 12), 1.0),
            series("STEADY", &fading, 1.0),
        ]);
        let strategy = MomentumRotation::new(config());

        let decision = strategy
            .decide(&symbols(&["UP", "STEADY"]), &Holdings::default(), &data.view(day(11)))
            .unwrap();

        assert_eq!(decision.signals["STEADY"], Signal::Sell);
        assert_eq!(decision.weights.len(), 1);
        assert!((decision.weights["UP"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_not_enough_history_selects_nothing() {
        let data = market(vec![series("UP", &line(50.0, 2.0, 5), 1.0)]);
        let strategy = MomentumRotation::new(config());

        let decision = strategy
            .decide(&symbols(&["UP"]), &Holdings::default(), &data.view(day(4)))
            .unwrap();
        assert!(decision.weights.is_empty());
    }
}
