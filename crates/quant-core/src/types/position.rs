//! Position type.

use num_traits::Signed;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A holding in a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Symbol
    pub symbol: String,
    /// Signed quantity (positive for long, negative for short)
    pub quantity: Decimal,
    /// Average entry price of the open quantity
    pub avg_cost: Decimal,
    /// Price of the most recent mark or fill
    pub last_price: Decimal,
    /// Realized profit/loss from closed portions
    pub realized_pnl: Decimal,
}

impl Position {
    /// Create a flat position.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: Decimal::ZERO,
            avg_cost: Decimal::ZERO,
            last_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Market value at the last price.
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.last_price
    }

    /// Revalue at a new price.
    pub fn mark(&mut self, price: Decimal) {
        self.last_price = price;
    }

    /// Apply a signed fill at `price`.
    /// Returns the realized P&L if the position is being reduced.
    pub fn apply_fill(&mut self, quantity: Decimal, price: Decimal) -> Decimal {
        let mut realized = Decimal::ZERO;

        let same_direction = self.quantity.is_zero()
            || (self.quantity > Decimal::ZERO) == (quantity > Decimal::ZERO);

        if same_direction {
            let total_cost = self.quantity * self.avg_cost + quantity * price;
            let new_quantity = self.quantity + quantity;
            if !new_quantity.is_zero() {
                self.avg_cost = total_cost / new_quantity;
            }
            self.quantity = new_quantity;
        } else {
            let close_qty = quantity.abs().min(self.quantity.abs());
            realized = close_qty * (price - self.avg_cost) * self.quantity.signum();
            self.realized_pnl += realized;

            let remaining = quantity.abs() - close_qty;
            if remaining > Decimal::ZERO {
                // Position reversed
                self.quantity = quantity.signum() * remaining;
                self.avg_cost = price;
            } else {
                self.quantity += quantity;
                if self.quantity.is_zero() {
                    self.avg_cost = Decimal::ZERO;
                }
            }
        }

        self.last_price = price;
        realized
    }
}
