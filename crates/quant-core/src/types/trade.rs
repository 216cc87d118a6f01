//! Trade records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Why a trade was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeReason {
    /// Move toward a strategy target weight
    Rebalance,
    /// Full exit because the instrument left the target set
    Liquidation,
    /// Forced exit of a delisted instrument at its last known price
    Delisting,
}

/// Immutable log entry for one executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub symbol: String,
    /// Signed quantity delta (positive buys, negative sells)
    pub quantity: Decimal,
    /// Reference close before slippage
    pub market_price: Decimal,
    /// Price after slippage
    pub execution_price: Decimal,
    pub commission: Decimal,
    /// Slippage paid, in currency
    pub slippage: Decimal,
    pub reason: TradeReason,
}

impl Trade {
    pub fn side(&self) -> Side {
        if self.quantity < Decimal::ZERO {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    /// Total transaction cost (commission + slippage).
    pub fn cost(&self) -> Decimal {
        self.commission + self.slippage
    }

    /// Signed change in cash caused by this trade.
    pub fn cash_flow(&self) -> Decimal {
        -(self.quantity * self.market_price) - self.cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade(quantity: Decimal) -> Trade {
        Trade {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            symbol: "AAPL".to_string(),
            quantity,
            market_price: dec!(100),
            execution_price: dec!(100),
            commission: dec!(5),
            slippage: dec!(2),
            reason: TradeReason::Rebalance,
        }
    }

    #[test]
    fn test_buy_cash_flow() {
        let buy = trade(dec!(10));
        assert_eq!(buy.side(), Side::Buy);
        assert_eq!(buy.cost(), dec!(7));
        assert_eq!(buy.cash_flow(), dec!(-1007));
    }

    #[test]
    fn test_sell_cash_flow() {
        let sell = trade(dec!(-10));
        assert_eq!(sell.side(), Side::Sell);
        assert_eq!(sell.cost(), dec!(7));
        assert_eq!(sell.cash_flow(), dec!(993));
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert_eq!(Side::Sell.to_string(), "SELL");
    }
}
