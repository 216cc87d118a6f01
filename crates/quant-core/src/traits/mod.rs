//! Core traits for the backtesting system.

mod market_data;
mod strategy;

pub use market_data::{MarketDataProvider, PriceLookup};
pub use strategy::{Strategy, StrategyConfig, StrategyDecision};
