//! Strategy implementations for the backtesting system.
//!
//! This crate provides the reusable building blocks strategies are composed
//! from, plus a set of ready-made strategies:
//! - Screening: price range, average volume, momentum ranking
//! - Signals: buy-and-hold, moving-average crossover, RSI, Bollinger bands,
//!   volume breakouts, price thresholds and signal voting
//! - Allocation: equal, inverse-volatility, momentum, risk parity, minimum
//!   variance and target weights
//!
//! Built-in strategies are created by name through [`StrategyRegistry`].

pub mod allocation;
pub mod indicators;
pub mod screening;
pub mod signals;

mod buy_and_hold;
mod momentum_rotation;
mod registry;
mod static_weights;
mod threshold;

pub use buy_and_hold::{BuyAndHold, BuyAndHoldConfig};
pub use momentum_rotation::{MomentumRotation, MomentumRotationConfig};
pub use registry::{StrategyInfo, StrategyRegistry};
pub use static_weights::{StaticWeights, StaticWeightsConfig};
pub use threshold::{PriceThreshold, PriceThresholdConfig};
