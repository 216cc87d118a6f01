//! Core types and traits for the backtesting system.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Bar) and the point-in-time market view
//! - Position, trade and snapshot records
//! - Trading signals
//! - Core traits for strategies and market data providers

pub mod error;
pub mod market;
pub mod traits;
pub mod types;

pub use error::{BacktestError, BacktestResult, DataError, StrategyError};
pub use market::{MarketData, MarketView};
pub use traits::*;
pub use types::*;
