//! Translation of target weights into trades.

use chrono::NaiveDate;
use quant_core::{BacktestError, BacktestResult, PriceLookup, StrategyError, Trade, TradeReason};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::costs::{floor_to_lot, CostModel};
use crate::portfolio::{EventKind, Portfolio, PortfolioEvent};

/// Tolerance on the weight sum before an allocation is rejected.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// What to do when a buy costs more than the cash on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashPolicy {
    /// Buy the largest affordable lot multiple and record a warning
    #[default]
    ScaleDown,
    /// Abort the run with an insufficient-cash error
    Strict,
}

/// A trade the planner wants to make, before costs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub symbol: String,
    /// Signed quantity change
    pub quantity: Decimal,
    /// Close used to size the order
    pub price: Decimal,
    pub reason: TradeReason,
}

impl OrderIntent {
    pub fn is_sell(&self) -> bool {
        self.quantity < Decimal::ZERO
    }
}

/// Validate strategy weights and convert them to decimals.
///
/// Weights must be finite and non-negative and sum to at most 1.0. Zero
/// weights are dropped.
pub fn target_weights(weights: &BTreeMap<String, f64>) -> Result<BTreeMap<String, Decimal>, StrategyError> {
    let mut sum = 0.0;
    let mut targets = BTreeMap::new();

    for (symbol, weight) in weights {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(StrategyError::InvalidAllocation(format!(
                "weight for {} must be a finite non-negative number, got {}",
                symbol, weight
            )));
        }
        sum += weight;
        if *weight == 0.0 {
            continue;
        }
        let decimal = Decimal::try_from(*weight).map_err(|e| {
            StrategyError::InvalidAllocation(format!("weight for {} is not representable: {}", symbol, e))
        })?;
        targets.insert(symbol.clone(), decimal);
    }

    if sum > 1.0 + WEIGHT_SUM_TOLERANCE {
        return Err(StrategyError::InvalidAllocation(format!(
            "weights sum to {:.6}, which exceeds 1.0",
            sum
        )));
    }

    Ok(targets)
}

/// Sizes and executes the trades that move a portfolio onto target weights.
#[derive(Debug, Clone)]
pub struct Rebalancer {
    costs: CostModel,
    lot_size: Decimal,
    cash_policy: CashPolicy,
    threshold: Decimal,
}

impl Rebalancer {
    pub fn new(costs: CostModel, lot_size: Decimal, cash_policy: CashPolicy) -> Self {
        Self {
            costs,
            lot_size,
            cash_policy,
            threshold: Decimal::ZERO,
        }
    }

    /// Skip adjustments whose weight drift is below `threshold`.
    /// Liquidations are never skipped.
    pub fn with_threshold(mut self, threshold: Decimal) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    /// Work out the orders needed to reach `targets`, without touching the
    /// portfolio.
    ///
    /// Sells come first, then buys, each in ascending symbol order. Targets
    /// that cannot be priced because the instrument is delisted are reported
    /// as events instead of orders.
    pub fn plan(
        &self,
        portfolio: &Portfolio,
        targets: &BTreeMap<String, Decimal>,
        date: NaiveDate,
        prices: &impl PriceLookup,
    ) -> BacktestResult<(Vec<OrderIntent>, Vec<PortfolioEvent>)> {
        let mut events = Vec::new();

        // Held positions are valued at today's close, delisted ones at their
        // last price; the mark-to-market liquidates the latter.
        let mut total_value = portfolio.cash();
        let mut delisted_holdings = BTreeSet::new();
        for (symbol, position) in portfolio.positions() {
            let price = match prices.close(symbol, date) {
                Some(price) => price,
                None if prices.is_delisted(symbol, date) => {
                    delisted_holdings.insert(symbol.clone());
                    position.last_price
                }
                None => {
                    return Err(BacktestError::MissingPrice {
                        symbol: symbol.clone(),
                        date,
                    })
                }
            };
            total_value += position.quantity * price;
        }

        let symbols: BTreeSet<&String> = targets.keys().chain(portfolio.positions().keys()).collect();
        let mut sells = Vec::new();
        let mut buys = Vec::new();

        for symbol in symbols {
            if delisted_holdings.contains(symbol) {
                continue;
            }

            let current = portfolio.quantity(symbol);
            let weight = targets.get(symbol).copied().unwrap_or(Decimal::ZERO);
            if weight.is_zero() && current.is_zero() {
                continue;
            }

            let price = match prices.close(symbol, date) {
                Some(price) if price > Decimal::ZERO => price,
                _ if weight > Decimal::ZERO && current.is_zero() && prices.is_delisted(symbol, date) => {
                    warn!(date = %date, symbol = %symbol, "Target weight on delisted instrument ignored");
                    events.push(PortfolioEvent {
                        date,
                        symbol: Some(symbol.clone()),
                        kind: EventKind::TargetSkipped,
                        message: format!("{} is delisted; target weight {} ignored", symbol, weight),
                    });
                    continue;
                }
                _ => {
                    return Err(BacktestError::MissingPrice {
                        symbol: symbol.clone(),
                        date,
                    })
                }
            };

            if weight.is_zero() {
                if !current.is_zero() {
                    sells.push(OrderIntent {
                        symbol: symbol.clone(),
                        quantity: -current,
                        price,
                        reason: TradeReason::Liquidation,
                    });
                }
                continue;
            }

            let desired = floor_to_lot(weight * total_value / price, self.lot_size);
            let delta = desired - current;
            if delta.is_zero() {
                continue;
            }

            if self.threshold > Decimal::ZERO && total_value > Decimal::ZERO {
                let current_weight = current * price / total_value;
                if (weight - current_weight).abs() < self.threshold {
                    continue;
                }
            }

            let intent = OrderIntent {
                symbol: symbol.clone(),
                quantity: delta,
                price,
                reason: TradeReason::Rebalance,
            };
            if intent.is_sell() {
                sells.push(intent);
            } else {
                buys.push(intent);
            }
        }

        sells.extend(buys);
        Ok((sells, events))
    }

    /// Plan and execute a rebalance onto `targets`.
    ///
    /// Buys that exceed available cash are scaled down or rejected depending
    /// on the cash policy. On error the portfolio may hold a partial
    /// rebalance; callers stage the portfolio and discard it.
    pub fn rebalance(
        &self,
        portfolio: &mut Portfolio,
        targets: &BTreeMap<String, Decimal>,
        date: NaiveDate,
        prices: &impl PriceLookup,
    ) -> BacktestResult<Vec<Trade>> {
        let (intents, events) = self.plan(portfolio, targets, date, prices)?;
        for event in events {
            portfolio.record_event(event);
        }

        let mut trades = Vec::with_capacity(intents.len());
        for intent in intents {
            let Some(trade) = self.execute(portfolio, &intent, date)? else {
                continue;
            };
            portfolio.apply_trade(&trade)?;
            trades.push(trade);
        }

        debug!(date = %date, trades = trades.len(), "Rebalance executed");
        Ok(trades)
    }

    /// Price one intent against the cash on hand.
    fn execute(&self, portfolio: &mut Portfolio, intent: &OrderIntent, date: NaiveDate) -> BacktestResult<Option<Trade>> {
        let trade = self
            .costs
            .fill(date, &intent.symbol, intent.quantity, intent.price, intent.reason);
        if portfolio.cash() + trade.cash_flow() >= Decimal::ZERO {
            return Ok(Some(trade));
        }

        // A sell can still cost cash when its proceeds do not cover the fees
        if intent.is_sell() {
            return match self.cash_policy {
                CashPolicy::Strict => Err(BacktestError::InsufficientCash {
                    required: -trade.cash_flow(),
                    available: portfolio.cash(),
                }),
                CashPolicy::ScaleDown => {
                    warn!(date = %date, symbol = %intent.symbol, "Sell skipped: proceeds do not cover costs");
                    portfolio.record_event(PortfolioEvent {
                        date,
                        symbol: Some(intent.symbol.clone()),
                        kind: EventKind::SellSkipped,
                        message: format!(
                            "selling {} {} would cost {} net, cash {}",
                            intent.quantity.abs(),
                            intent.symbol,
                            -trade.cash_flow(),
                            portfolio.cash()
                        ),
                    });
                    Ok(None)
                }
            };
        }

        match self.cash_policy {
            CashPolicy::Strict => Err(BacktestError::InsufficientCash {
                required: -trade.cash_flow(),
                available: portfolio.cash(),
            }),
            CashPolicy::ScaleDown => {
                let affordable = self
                    .costs
                    .max_affordable(portfolio.cash(), intent.price, self.lot_size)
                    .min(intent.quantity);

                if affordable <= Decimal::ZERO {
                    warn!(date = %date, symbol = %intent.symbol, "Buy skipped: insufficient cash");
                    portfolio.record_event(PortfolioEvent {
                        date,
                        symbol: Some(intent.symbol.clone()),
                        kind: EventKind::BuySkipped,
                        message: format!(
                            "wanted {} {}, cash {} does not cover one lot",
                            intent.quantity,
                            intent.symbol,
                            portfolio.cash()
                        ),
                    });
                    return Ok(None);
                }

                debug!(
                    date = %date,
                    symbol = %intent.symbol,
                    wanted = %intent.quantity,
                    bought = %affordable,
                    "Buy scaled down to available cash"
                );
                portfolio.record_event(PortfolioEvent {
                    date,
                    symbol: Some(intent.symbol.clone()),
                    kind: EventKind::BuyScaledDown,
                    message: format!("wanted {} {}, bought {}", intent.quantity, intent.symbol, affordable),
                });
                Ok(Some(self.costs.fill(
                    date,
                    &intent.symbol,
                    affordable,
                    intent.price,
                    intent.reason,
                )))
            }
        }
    }
}
