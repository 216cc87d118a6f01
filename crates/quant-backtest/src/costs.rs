//! Commission and slippage model.

use chrono::NaiveDate;
use quant_core::{BacktestError, BacktestResult, Side, Trade, TradeReason};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Transaction cost assumptions applied to every simulated trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Flat commission charged per trade
    pub commission_per_trade: Decimal,
    /// Commission as a fraction of traded value (0.001 = 0.1%)
    pub commission_rate: Decimal,
    /// Adverse price move as a fraction of price (0.0005 = 5 bps)
    pub slippage_rate: Decimal,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            commission_per_trade: Decimal::ZERO,
            commission_rate: dec!(0.001),
            slippage_rate: dec!(0.0005),
        }
    }
}

impl CostModel {
    /// Create a zero-cost model (no commissions or slippage).
    pub fn zero() -> Self {
        Self {
            commission_per_trade: Decimal::ZERO,
            commission_rate: Decimal::ZERO,
            slippage_rate: Decimal::ZERO,
        }
    }

    pub fn validate(&self) -> BacktestResult<()> {
        if self.commission_per_trade < Decimal::ZERO {
            return Err(BacktestError::Config(
                "commission_per_trade must not be negative".into(),
            ));
        }
        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            return Err(BacktestError::Config(
                "commission_rate must be in [0, 1)".into(),
            ));
        }
        if self.slippage_rate < Decimal::ZERO || self.slippage_rate >= Decimal::ONE {
            return Err(BacktestError::Config("slippage_rate must be in [0, 1)".into()));
        }
        Ok(())
    }

    /// Price after slippage: buyers pay more, sellers receive less.
    pub fn execution_price(&self, market_price: Decimal, side: Side) -> Decimal {
        match side {
            Side::Buy => market_price * (Decimal::ONE + self.slippage_rate),
            Side::Sell => market_price * (Decimal::ONE - self.slippage_rate),
        }
    }

    /// Commission on a trade of the given absolute value.
    pub fn commission(&self, notional: Decimal) -> Decimal {
        self.commission_per_trade + notional * self.commission_rate
    }

    /// Price a signed quantity into a trade record.
    pub fn fill(
        &self,
        date: NaiveDate,
        symbol: &str,
        quantity: Decimal,
        market_price: Decimal,
        reason: TradeReason,
    ) -> Trade {
        let side = if quantity < Decimal::ZERO { Side::Sell } else { Side::Buy };
        let execution_price = self.execution_price(market_price, side);
        let abs_quantity = quantity.abs();

        Trade {
            date,
            symbol: symbol.to_string(),
            quantity,
            market_price,
            execution_price,
            commission: self.commission(abs_quantity * execution_price),
            slippage: abs_quantity * (execution_price - market_price).abs(),
            reason,
        }
    }

    /// Largest multiple of `lot_size` that can be bought with `cash`,
    /// commission and slippage included.
    pub fn max_affordable(&self, cash: Decimal, market_price: Decimal, lot_size: Decimal) -> Decimal {
        let budget = cash - self.commission_per_trade;
        if budget <= Decimal::ZERO || market_price <= Decimal::ZERO || lot_size <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let unit_cost = self.execution_price(market_price, Side::Buy) * (Decimal::ONE + self.commission_rate);
        let mut quantity = floor_to_lot(budget / unit_cost, lot_size);

        // Division rounds at 28 digits; step down until the fill really fits.
        while quantity > Decimal::ZERO && self.buy_outlay(quantity, market_price) > cash {
            quantity -= lot_size;
        }
        quantity.max(Decimal::ZERO)
    }

    /// Cash needed to buy `quantity` at `market_price`.
    pub fn buy_outlay(&self, quantity: Decimal, market_price: Decimal) -> Decimal {
        let execution_price = self.execution_price(market_price, Side::Buy);
        let notional = quantity * execution_price;
        notional + self.commission(notional)
    }
}

/// Round a non-negative quantity down to a multiple of `lot_size`.
pub fn floor_to_lot(quantity: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size <= Decimal::ZERO {
        return quantity;
    }
    (quantity / lot_size).floor() * lot_size
}
