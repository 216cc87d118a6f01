//! Portfolio state tracker.

use chrono::NaiveDate;
use num_traits::ToPrimitive;
use quant_core::{
    BacktestError, BacktestResult, Holdings, Position, PositionSnapshot, PriceLookup, Snapshot, Trade,
    TradeReason,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Kind of non-fatal condition recorded during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A held instrument stopped trading and was liquidated
    Delisted,
    /// A buy was reduced to fit the available cash
    BuyScaledDown,
    /// A buy was dropped because no whole lot was affordable
    BuySkipped,
    /// A sell was dropped because its proceeds did not cover its costs
    SellSkipped,
    /// A target weight could not be acted on
    TargetSkipped,
}

/// Warning recorded alongside the run results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioEvent {
    pub date: NaiveDate,
    pub symbol: Option<String>,
    pub kind: EventKind,
    pub message: String,
}

/// Outcome of a mark-to-market: the snapshot and any forced liquidations.
#[derive(Debug, Clone)]
pub struct MarkOutcome {
    pub snapshot: Snapshot,
    pub liquidations: Vec<Trade>,
}

/// Cash and positions of a single simulated account.
///
/// Every mutation goes through [`Portfolio::apply_trade`] or
/// [`Portfolio::mark_to_market`]; both leave the portfolio untouched when
/// they return an error.
#[derive(Debug, Clone)]
pub struct Portfolio {
    cash: Decimal,
    positions: BTreeMap<String, Position>,
    as_of: Option<NaiveDate>,
    realized_pnl: Decimal,
    events: Vec<PortfolioEvent>,
}

impl Portfolio {
    /// Create an all-cash portfolio.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            cash: initial_capital,
            positions: BTreeMap::new(),
            as_of: None,
            realized_pnl: Decimal::ZERO,
            events: Vec::new(),
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Held quantity, zero when flat.
    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// Date of the last mark-to-market.
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.as_of
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Value of all positions at their last marked price.
    pub fn positions_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn total_value(&self) -> Decimal {
        self.cash + self.positions_value()
    }

    /// Fraction of total value per held symbol at last marked prices.
    pub fn current_weights(&self) -> BTreeMap<String, Decimal> {
        let total = self.total_value();
        if total <= Decimal::ZERO {
            return BTreeMap::new();
        }
        self.positions
            .iter()
            .map(|(symbol, position)| (symbol.clone(), position.market_value() / total))
            .collect()
    }

    /// Read-only view handed to strategies.
    pub fn holdings(&self) -> Holdings {
        Holdings {
            as_of: self.as_of,
            cash: self.cash,
            total_value: self.total_value(),
            quantities: self
                .positions
                .iter()
                .map(|(symbol, position)| (symbol.clone(), position.quantity))
                .collect(),
            weights: self
                .current_weights()
                .into_iter()
                .map(|(symbol, weight)| (symbol, weight.to_f64().unwrap_or(0.0)))
                .collect(),
        }
    }

    pub fn events(&self) -> &[PortfolioEvent] {
        &self.events
    }

    pub fn record_event(&mut self, event: PortfolioEvent) {
        self.events.push(event);
    }

    /// Drain the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<PortfolioEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply a priced trade.
    ///
    /// Fails with [`BacktestError::InsufficientCash`] if the trade would
    /// leave a negative cash balance.
    pub fn apply_trade(&mut self, trade: &Trade) -> BacktestResult<()> {
        let cash_after = self.cash + trade.cash_flow();
        if cash_after < Decimal::ZERO {
            return Err(BacktestError::InsufficientCash {
                required: -trade.cash_flow(),
                available: self.cash,
            });
        }
        self.cash = cash_after;

        let position = self
            .positions
            .entry(trade.symbol.clone())
            .or_insert_with(|| Position::new(trade.symbol.clone()));
        self.realized_pnl += position.apply_fill(trade.quantity, trade.execution_price);
        position.mark(trade.market_price);

        if position.is_flat() {
            self.positions.remove(&trade.symbol);
        }

        debug!(
            date = %trade.date,
            symbol = %trade.symbol,
            quantity = %trade.quantity,
            price = %trade.execution_price,
            cash = %self.cash,
            "Trade applied"
        );
        Ok(())
    }

    /// Revalue every position at `date`'s close.
    ///
    /// Positions in delisted instruments are sold at their last known price
    /// without costs. Any other missing price fails the whole mark and leaves
    /// the portfolio untouched.
    pub fn mark_to_market(&mut self, date: NaiveDate, prices: &impl PriceLookup) -> BacktestResult<MarkOutcome> {
        let mut marks = Vec::with_capacity(self.positions.len());
        let mut delisted = Vec::new();

        for symbol in self.positions.keys() {
            match prices.close(symbol, date) {
                Some(price) => marks.push((symbol.clone(), price)),
                None if prices.is_delisted(symbol, date) => delisted.push(symbol.clone()),
                None => {
                    return Err(BacktestError::MissingPrice {
                        symbol: symbol.clone(),
                        date,
                    })
                }
            }
        }

        for (symbol, price) in marks {
            if let Some(position) = self.positions.get_mut(&symbol) {
                position.mark(price);
            }
        }

        let mut liquidations = Vec::with_capacity(delisted.len());
        for symbol in delisted {
            let Some(position) = self.positions.get(&symbol) else {
                continue;
            };
            let price = position.last_price;
            let trade = Trade {
                date,
                symbol: symbol.clone(),
                quantity: -position.quantity,
                market_price: price,
                execution_price: price,
                commission: Decimal::ZERO,
                slippage: Decimal::ZERO,
                reason: TradeReason::Delisting,
            };
            self.apply_trade(&trade)?;

            warn!(date = %date, symbol = %symbol, price = %price, "Position liquidated after delisting");
            self.events.push(PortfolioEvent {
                date,
                symbol: Some(symbol.clone()),
                kind: EventKind::Delisted,
                message: format!("{} delisted; sold {} at last price {}", symbol, trade.quantity.abs(), price),
            });
            liquidations.push(trade);
        }

        self.as_of = Some(date);
        Ok(MarkOutcome {
            snapshot: self.snapshot(date),
            liquidations,
        })
    }

    /// Snapshot at the last marked prices.
    pub fn snapshot(&self, date: NaiveDate) -> Snapshot {
        let positions: BTreeMap<String, PositionSnapshot> = self
            .positions
            .iter()
            .map(|(symbol, position)| {
                (
                    symbol.clone(),
                    PositionSnapshot {
                        quantity: position.quantity,
                        price: position.last_price,
                        market_value: position.market_value(),
                    },
                )
            })
            .collect();
        let positions_value: Decimal = positions.values().map(|p| p.market_value).sum();

        Snapshot {
            date,
            cash: self.cash,
            positions,
            positions_value,
            total_value: self.cash + positions_value,
            rebalanced: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[derive(Default)]
    struct Prices {
        closes: BTreeMap<(String, NaiveDate), Decimal>,
        delisted: BTreeMap<String, NaiveDate>,
    }

    impl Prices {
        fn with(mut self, symbol: &str, date: NaiveDate, price: Decimal) -> Self {
            self.closes.insert((symbol.to_string(), date), price);
            self
        }

        fn delist(mut self, symbol: &str, date: NaiveDate) -> Self {
            self.delisted.insert(symbol.to_string(), date);
            self
        }
    }

    impl PriceLookup for Prices {
        fn close(&self, symbol: &str, date: NaiveDate) -> Option<Decimal> {
            self.closes.get(&(symbol.to_string(), date)).copied()
        }

        fn is_delisted(&self, symbol: &str, date: NaiveDate) -> bool {
            self.delisted.get(symbol).map(|d| *d <= date).unwrap_or(false)
        }
    }

    fn buy(symbol: &str, quantity: Decimal, price: Decimal) -> Trade {
        Trade {
            date: day(2),
            symbol: symbol.to_string(),
            quantity,
            market_price: price,
            execution_price: price,
            commission: Decimal::ZERO,
            slippage: Decimal::ZERO,
            reason: TradeReason::Rebalance,
        }
    }

    #[test]
    fn test_apply_trade_moves_cash() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.apply_trade(&buy("AAPL", dec!(10), dec!(100))).unwrap();

        assert_eq!(portfolio.cash(), dec!(9000));
        assert_eq!(portfolio.quantity("AAPL"), dec!(10));
        assert_eq!(portfolio.total_value(), dec!(10000));
    }

    #[test]
    fn test_apply_trade_rejects_overdraft() {
        let mut portfolio = Portfolio::new(dec!(500));
        let result = portfolio.apply_trade(&buy("AAPL", dec!(10), dec!(100)));

        assert!(matches!(result, Err(BacktestError::InsufficientCash { .. })));
        assert_eq!(portfolio.cash(), dec!(500));
        assert!(portfolio.positions().is_empty());
    }

    #[test]
    fn test_closing_trade_removes_position() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.apply_trade(&buy("AAPL", dec!(10), dec!(100))).unwrap();
        portfolio.apply_trade(&buy("AAPL", dec!(-10), dec!(120))).unwrap();

        assert!(portfolio.position("AAPL").is_none());
        assert_eq!(portfolio.cash(), dec!(10200));
        assert_eq!(portfolio.realized_pnl(), dec!(200));
    }

    #[test]
    fn test_mark_to_market_revalues() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.apply_trade(&buy("AAPL", dec!(10), dec!(100))).unwrap();

        let prices = Prices::default().with("AAPL", day(3), dec!(110));
        let outcome = portfolio.mark_to_market(day(3), &prices).unwrap();

        assert_eq!(outcome.snapshot.total_value, dec!(10100));
        assert_eq!(outcome.snapshot.positions_value, dec!(1100));
        assert!(outcome.snapshot.is_balanced());
        assert!(outcome.liquidations.is_empty());
        assert_eq!(portfolio.as_of(), Some(day(3)));
    }

    #[test]
    fn test_missing_price_leaves_state_untouched() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.apply_trade(&buy("AAPL", dec!(10), dec!(100))).unwrap();
        portfolio.apply_trade(&buy("MSFT", dec!(10), dec!(100))).unwrap();

        let prices = Prices::default().with("AAPL", day(3), dec!(150));
        let result = portfolio.mark_to_market(day(3), &prices);

        assert!(matches!(result, Err(BacktestError::MissingPrice { ref symbol, .. }) if symbol == "MSFT"));
        assert_eq!(portfolio.position("AAPL").unwrap().last_price, dec!(100));
        assert_eq!(portfolio.as_of(), None);
    }

    #[test]
    fn test_delisted_position_liquidated_at_last_price() {
        let mut portfolio = Portfolio::new(dec!(10000));
        portfolio.apply_trade(&buy("GONE", dec!(10), dec!(100))).unwrap();
        let prices = Prices::default()
            .with("GONE", day(3), dec!(90))
            .delist("GONE", day(4));

        portfolio.mark_to_market(day(3), &prices).unwrap();
        let outcome = portfolio.mark_to_market(day(4), &prices).unwrap();

        assert_eq!(outcome.liquidations.len(), 1);
        assert_eq!(outcome.liquidations[0].reason, TradeReason::Delisting);
        assert_eq!(outcome.liquidations[0].quantity, dec!(-10));
        assert_eq!(portfolio.cash(), dec!(9900));
        assert!(portfolio.positions().is_empty());
        assert_eq!(outcome.snapshot.total_value, dec!(9900));

        let events = portfolio.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Delisted);
        assert!(portfolio.events().is_empty());
    }

    #[test]
    fn test_holdings_view() {
        let mut portfolio = Portfolio::new(dec!(1000));
        portfolio.apply_trade(&buy("AAPL", dec!(5), dec!(100))).unwrap();

        let holdings = portfolio.holdings();
        assert!(holdings.is_holding("AAPL"));
        assert!((holdings.weight("AAPL") - 0.5).abs() < 1e-12);
        assert_eq!(holdings.cash, dec!(500));
    }
}
