//! Configuration management.

mod settings;

pub use settings::{AppConfig, AppSettings, BacktestSettings, DataSettings, LoggingConfig, OutputSettings};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Prefix of environment overrides, e.g. `QUANT__BACKTEST__INITIAL_CAPITAL`.
pub const ENV_PREFIX: &str = "QUANT";

/// Load configuration from file and environment.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    build(path, true)
}

/// Like [`load_config`], but a missing file means built-in defaults.
pub fn load_config_or_default(path: &Path) -> Result<AppConfig, ConfigError> {
    build(path, false)
}

fn build(path: &Path, required: bool) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}
