//! Core data types for the backtesting system.

mod bar;
mod holdings;
mod position;
mod signal;
mod snapshot;
mod trade;

pub use bar::Bar;
pub use holdings::Holdings;
pub use position::Position;
pub use signal::Signal;
pub use snapshot::{PositionSnapshot, Snapshot};
pub use trade::{Side, Trade, TradeReason};
