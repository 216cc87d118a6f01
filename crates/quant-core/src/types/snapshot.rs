//! Portfolio snapshots.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Valuation of one position at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub quantity: Decimal,
    pub price: Decimal,
    pub market_value: Decimal,
}

/// Immutable record of the portfolio after the day's mark-to-market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub cash: Decimal,
    pub positions: BTreeMap<String, PositionSnapshot>,
    pub positions_value: Decimal,
    pub total_value: Decimal,
    /// Whether the strategy was consulted on this date
    pub rebalanced: bool,
}

impl Snapshot {
    /// Check the accounting identity `cash + positions == total`.
    pub fn is_balanced(&self) -> bool {
        let positions: Decimal = self.positions.values().map(|p| p.market_value).sum();
        positions == self.positions_value && self.cash + positions == self.total_value
    }

    /// Fraction of total value held in `symbol`.
    pub fn weight(&self, symbol: &str) -> Decimal {
        if self.total_value.is_zero() {
            return Decimal::ZERO;
        }
        self.positions
            .get(symbol)
            .map(|p| p.market_value / self.total_value)
            .unwrap_or(Decimal::ZERO)
    }
}
