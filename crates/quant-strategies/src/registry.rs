//! Strategy registry for creating strategies by name.

use crate::{
    BuyAndHold, BuyAndHoldConfig, MomentumRotation, MomentumRotationConfig, PriceThreshold,
    PriceThresholdConfig, StaticWeights, StaticWeightsConfig,
};
use quant_core::{Strategy, StrategyConfig, StrategyError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Registry key
    pub name: String,
    /// Strategy description
    pub description: String,
    /// Default configuration as JSON
    pub default_config: serde_json::Value,
}

/// Registry of the built-in strategies.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, StrategyInfo>,
}

impl StrategyRegistry {
    /// Create a new strategy registry with all built-in strategies.
    pub fn new() -> Self {
        let mut registry = Self {
            strategies: BTreeMap::new(),
        };

        registry.register(
            "buy_and_hold",
            "Equal-weight position in every configured symbol",
            BuyAndHoldConfig::default(),
        );
        registry.register(
            "momentum_rotation",
            "Rotates into the strongest trailing performers with a moving-average trend filter",
            MomentumRotationConfig::default(),
        );
        registry.register(
            "price_threshold",
            "Buys above a price threshold and sells below a lower one",
            PriceThresholdConfig::default(),
        );
        registry.register(
            "static_weights",
            "Rebalances to fixed target weights",
            StaticWeightsConfig::default(),
        );

        registry
    }

    fn register(&mut self, name: &str, description: &str, default_config: impl Serialize) {
        self.strategies.insert(
            name.to_string(),
            StrategyInfo {
                name: name.to_string(),
                description: description.to_string(),
                default_config: serde_json::to_value(default_config).unwrap_or_default(),
            },
        );
    }

    /// List all available strategies, ordered by name.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.strategies.values().collect()
    }

    /// Get strategy info by name.
    pub fn get(&self, name: &str) -> Option<&StrategyInfo> {
        self.strategies.get(name)
    }

    /// Check if a strategy exists.
    pub fn exists(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Get all strategy names.
    pub fn names(&self) -> Vec<&String> {
        self.strategies.keys().collect()
    }

    /// Create a strategy instance from configuration.
    ///
    /// `symbols` overrides any symbol list in `config`. Fields missing from
    /// `config` take their defaults.
    pub fn create(
        &self,
        name: &str,
        config: serde_json::Value,
        symbols: Vec<String>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        debug!(strategy = name, symbols = symbols.len(), "Creating strategy");
        match name {
            "buy_and_hold" => {
                let config = parse_config(config, symbols, |c: &mut BuyAndHoldConfig, s| c.symbols = s)?;
                Ok(Box::new(BuyAndHold::new(config)))
            }
            "momentum_rotation" => {
                let config = parse_config(config, symbols, |c: &mut MomentumRotationConfig, s| c.symbols = s)?;
                Ok(Box::new(MomentumRotation::new(config)))
            }
            "price_threshold" => {
                let config = parse_config(config, symbols, |c: &mut PriceThresholdConfig, s| c.symbols = s)?;
                Ok(Box::new(PriceThreshold::new(config)))
            }
            "static_weights" => {
                let config = parse_config(config, symbols, |c: &mut StaticWeightsConfig, s| c.symbols = s)?;
                Ok(Box::new(StaticWeights::new(config)))
            }
            _ => Err(StrategyError::NotFound(name.to_string())),
        }
    }

    /// Create a strategy with default configuration.
    pub fn create_default(
        &self,
        name: &str,
        symbols: Vec<String>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let info = self
            .get(name)
            .ok_or_else(|| StrategyError::NotFound(name.to_string()))?;
        self.create(name, info.default_config.clone(), symbols)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_config<C>(
    value: serde_json::Value,
    symbols: Vec<String>,
    set_symbols: impl FnOnce(&mut C, Vec<String>),
) -> Result<C, StrategyError>
where
    C: StrategyConfig + DeserializeOwned,
{
    // Null means "all defaults"
    let value = if value.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        value
    };
    let mut config: C =
        serde_json::from_value(value).map_err(|e| StrategyError::InvalidConfig(e.to_string()))?;
    if !symbols.is_empty() {
        set_symbols(&mut config, symbols);
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn symbols() -> Vec<String> {
        vec!["AAPL".to_string(), "MSFT".to_string()]
    }

    #[test]
    fn test_registry_list() {
        let registry = StrategyRegistry::new();
        let names: Vec<&str> = registry.list().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["buy_and_hold", "momentum_rotation", "price_threshold", "static_weights"]
        );
        assert!(registry.exists("price_threshold"));
        assert!(!registry.exists("martingale"));
    }

    #[test]
    fn test_create_default() {
        let registry = StrategyRegistry::new();
        for name in ["buy_and_hold", "momentum_rotation", "price_threshold"] {
            let strategy = registry.create_default(name, symbols()).unwrap();
            assert_eq!(strategy.name(), name);
            assert_eq!(strategy.parameters()["symbols"], json!(["AAPL", "MSFT"]));
        }
    }

    #[test]
    fn test_static_weights_needs_weights() {
        let registry = StrategyRegistry::new();
        assert!(matches!(
            registry.create_default("static_weights", symbols()),
            Err(StrategyError::InvalidConfig(_))
        ));

        let strategy = registry
            .create(
                "static_weights",
                json!({ "weights": { "AAPL": 0.5, "MSFT": 0.4 } }),
                symbols(),
            )
            .unwrap();
        assert_eq!(strategy.parameters()["weights"]["AAPL"], 0.5);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let registry = StrategyRegistry::new();
        let strategy = registry
            .create("price_threshold", json!({ "buy_threshold": 50.0, "sell_threshold": 40.0 }), symbols())
            .unwrap();

        let params = strategy.parameters();
        assert_eq!(params["buy_threshold"], 50.0);
        assert_eq!(params["max_positions"], 20);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let registry = StrategyRegistry::new();
        let result = registry.create(
            "price_threshold",
            json!({ "buy_threshold": 50.0, "sell_threshold": 60.0 }),
            symbols(),
        );
        assert!(matches!(result, Err(StrategyError::InvalidConfig(_))));

        let result = registry.create("momentum_rotation", json!({ "top_n": "five" }), symbols());
        assert!(matches!(result, Err(StrategyError::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_strategy() {
        let registry = StrategyRegistry::new();
        assert!(matches!(
            registry.create_default("nonexistent", symbols()),
            Err(StrategyError::NotFound(_))
        ));
    }
}
