//! Error types for the backtesting system.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level backtesting error.
#[derive(Error, Debug)]
pub enum BacktestError {
    /// Invalid run configuration, raised before the first simulated date.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing price for {symbol} on {date}")]
    MissingPrice { symbol: String, date: NaiveDate },

    #[error("Insufficient cash: required {required}, available {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },

    /// Raised only by analytics that need a minimum sample size.
    #[error("Insufficient data for {metric}: need {required}, have {available}")]
    InsufficientData {
        metric: String,
        required: usize,
        available: usize,
    },

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BacktestError {
    /// Whether the caller may retry the whole run.
    ///
    /// Only data-provider timeouts and connection failures qualify; they are
    /// raised before any portfolio state is touched.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BacktestError::Data(DataError::Timeout { .. })
                | BacktestError::Data(DataError::ConnectionError(_))
        )
    }
}

impl From<serde_json::Error> for BacktestError {
    fn from(err: serde_json::Error) -> Self {
        BacktestError::Serialization(err.to_string())
    }
}

/// Strategy-specific errors.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {required} bars, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Strategy not found: {0}")]
    NotFound(String),

    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("Strategy error: {0}")]
    Internal(String),
}

/// Market data errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("No data available for the requested range")]
    NoDataAvailable,

    #[error("Duplicate bar for {symbol} on {date}")]
    DuplicateBar { symbol: String, date: NaiveDate },

    #[error("Data request timed out after {millis} ms")]
    Timeout { millis: u64 },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Data source error: {0}")]
    Internal(String),
}

/// Result type alias for backtesting operations.
pub type BacktestResult<T> = Result<T, BacktestError>;
