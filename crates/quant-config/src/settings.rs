//! Configuration structures.

use quant_backtest::performance::DEFAULT_RISK_FREE_RATE;
use quant_backtest::{BacktestConfig, CashPolicy, CostModel, RebalanceFrequency};
use quant_core::{BacktestError, BacktestResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub backtest: BacktestSettings,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

impl AppConfig {
    /// Check everything that can be checked without running a backtest.
    pub fn validate(&self) -> BacktestResult<()> {
        self.logging.validate()?;
        self.backtest.to_engine_config()?;
        self.backtest.rebalance_frequency()?;
        if self.backtest.initial_capital <= Decimal::ZERO {
            return Err(BacktestError::Config(
                "initial_capital must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "quant".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Optional log file; logs go to stderr when unset
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    fn validate(&self) -> BacktestResult<()> {
        match self.format.to_lowercase().as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(BacktestError::Config(format!(
                "Unknown log format: {}",
                other
            ))),
        }
    }
}

/// Backtest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_capital: Decimal,
    pub commission_per_trade: Decimal,
    pub commission_rate: Decimal,
    pub slippage_rate: Decimal,
    pub lot_size: Decimal,
    pub cash_policy: CashPolicy,
    pub rebalance_threshold: Decimal,
    /// Rebalance frequency, e.g. `monthly`, `every:10`, `custom:2024-01-02,...`
    pub rebalance: String,
    pub benchmark: Option<String>,
    pub risk_free_rate: f64,
    pub lookback_days: u64,
    pub data_timeout_secs: u64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            initial_capital: dec!(100000),
            commission_per_trade: Decimal::ZERO,
            commission_rate: dec!(0.001),
            slippage_rate: dec!(0.0005),
            lot_size: Decimal::ONE,
            cash_policy: CashPolicy::ScaleDown,
            rebalance_threshold: Decimal::ZERO,
            rebalance: "monthly".to_string(),
            benchmark: None,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            lookback_days: 365,
            data_timeout_secs: 30,
        }
    }
}

impl BacktestSettings {
    /// Build and validate the engine configuration.
    pub fn to_engine_config(&self) -> BacktestResult<BacktestConfig> {
        let config = BacktestConfig {
            costs: CostModel {
                commission_per_trade: self.commission_per_trade,
                commission_rate: self.commission_rate,
                slippage_rate: self.slippage_rate,
            },
            lot_size: self.lot_size,
            cash_policy: self.cash_policy,
            rebalance_threshold: self.rebalance_threshold,
            risk_free_rate: self.risk_free_rate,
            lookback_days: self.lookback_days,
            data_timeout_secs: self.data_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn rebalance_frequency(&self) -> BacktestResult<RebalanceFrequency> {
        self.rebalance.parse()
    }
}

/// Market data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Directory of `<SYMBOL>.csv` files
    pub dir: PathBuf,
    /// Cache bars between runs of one process
    pub cache: bool,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            cache: true,
        }
    }
}

/// Where run artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_build_engine_config() {
        let settings = BacktestSettings::default();
        let config = settings.to_engine_config().unwrap();

        assert_eq!(config.costs.commission_rate, dec!(0.001));
        assert_eq!(config.costs.slippage_rate, dec!(0.0005));
        assert_eq!(config.cash_policy, CashPolicy::ScaleDown);
        assert_eq!(settings.rebalance_frequency().unwrap(), RebalanceFrequency::Monthly);
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let settings = BacktestSettings {
            commission_rate: dec!(1.5),
            ..Default::default()
        };
        assert!(matches!(settings.to_engine_config(), Err(BacktestError::Config(_))));

        let settings = BacktestSettings {
            rebalance: "fortnightly".into(),
            ..Default::default()
        };
        assert!(settings.rebalance_frequency().is_err());

        let mut config = AppConfig::default();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backtest.initial_capital = Decimal::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_toml_round_trip() {
        let mut config = AppConfig::default();
        config.backtest.benchmark = Some("SPY".into());

        let rendered = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.backtest.benchmark.as_deref(), Some("SPY"));
        assert_eq!(parsed.backtest.initial_capital, dec!(100000));
    }
}
