//! Signal generators.
//!
//! Each generator returns one signal per selected symbol. A symbol without
//! enough history gets [`Signal::Hold`].

use quant_core::{MarketView, Signal, StrategyError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::indicators;

/// How several signal maps are merged into one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalVote {
    /// Most common signal; ties resolve to the most bearish
    Majority,
    /// A signal only when every source agrees, otherwise hold
    Unanimous,
    /// Sign of the weighted average score
    Weighted(Vec<f64>),
}

/// Buy everything selected.
pub fn buy_and_hold(selected: &BTreeSet<String>) -> BTreeMap<String, Signal> {
    selected.iter().map(|s| (s.clone(), Signal::Buy)).collect()
}

/// Buy while the short moving average is above the long one, sell otherwise.
pub fn ma_crossover(
    selected: &BTreeSet<String>,
    market: &MarketView<'_>,
    short_window: usize,
    long_window: usize,
) -> BTreeMap<String, Signal> {
    per_symbol(selected, |symbol| {
        let closes = market.closes(symbol);
        if closes.len() < long_window {
            return Signal::Hold;
        }
        match (
            indicators::sma(&closes, short_window),
            indicators::sma(&closes, long_window),
        ) {
            (Some(short), Some(long)) if short > long => Signal::Buy,
            (Some(_), Some(_)) => Signal::Sell,
            _ => Signal::Hold,
        }
    })
}

/// Buy when oversold, sell when overbought.
pub fn rsi(
    selected: &BTreeSet<String>,
    market: &MarketView<'_>,
    window: usize,
    oversold: f64,
    overbought: f64,
) -> BTreeMap<String, Signal> {
    per_symbol(selected, |symbol| {
        match indicators::rsi(&market.closes(symbol), window) {
            Some(value) if value < oversold => Signal::Buy,
            Some(value) if value > overbought => Signal::Sell,
            _ => Signal::Hold,
        }
    })
}

/// Buy below the lower band, sell above the upper band.
pub fn bollinger(
    selected: &BTreeSet<String>,
    market: &MarketView<'_>,
    window: usize,
    num_std: f64,
) -> BTreeMap<String, Signal> {
    per_symbol(selected, |symbol| {
        let closes = market.closes(symbol);
        let Some(price) = closes.last().copied() else {
            return Signal::Hold;
        };
        match indicators::bollinger(&closes, window, num_std) {
            Some((lower, _, _)) if price < lower => Signal::Buy,
            Some((_, _, upper)) if price > upper => Signal::Sell,
            _ => Signal::Hold,
        }
    })
}

/// Trade in the direction of a large move made on unusually heavy volume.
///
/// Today's volume must exceed `volume_multiplier` times the average volume
/// of the last `volume_window` bars (today included), and the close must
/// have moved more than `price_change_threshold` from the previous close.
pub fn volume_breakout(
    selected: &BTreeSet<String>,
    market: &MarketView<'_>,
    volume_window: usize,
    volume_multiplier: f64,
    price_change_threshold: f64,
) -> BTreeMap<String, Signal> {
    per_symbol(selected, |symbol| {
        let closes = market.closes(symbol);
        let volumes = market.volumes(symbol);
        if closes.len() < 2 {
            return Signal::Hold;
        }
        let (Some(avg_volume), Some(volume)) = (indicators::sma(&volumes, volume_window), volumes.last()) else {
            return Signal::Hold;
        };
        let prev = closes[closes.len() - 2];
        if prev == 0.0 {
            return Signal::Hold;
        }
        let change = closes[closes.len() - 1] / prev - 1.0;

        if *volume > avg_volume * volume_multiplier && change.abs() > price_change_threshold {
            if change > 0.0 {
                Signal::Buy
            } else {
                Signal::Sell
            }
        } else {
            Signal::Hold
        }
    })
}

/// Buy above `buy_threshold`, sell below `sell_threshold`, hold in between.
pub fn price_threshold(price: f64, buy_threshold: f64, sell_threshold: f64) -> Signal {
    if price > buy_threshold {
        Signal::Buy
    } else if price < sell_threshold {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Merge signal maps. Symbols missing from a map count as hold.
pub fn combine(
    sources: &[BTreeMap<String, Signal>],
    vote: &SignalVote,
) -> Result<BTreeMap<String, Signal>, StrategyError> {
    if let SignalVote::Weighted(weights) = vote {
        if weights.len() != sources.len() {
            return Err(StrategyError::InvalidConfig(format!(
                "{} vote weights for {} signal sources",
                weights.len(),
                sources.len()
            )));
        }
    }

    let symbols: BTreeSet<&String> = sources.iter().flat_map(|m| m.keys()).collect();
    let combined = symbols
        .into_iter()
        .map(|symbol| {
            let votes: Vec<Signal> = sources
                .iter()
                .map(|m| m.get(symbol).copied().unwrap_or_default())
                .collect();
            (symbol.clone(), tally(&votes, vote))
        })
        .collect();
    Ok(combined)
}

fn tally(votes: &[Signal], vote: &SignalVote) -> Signal {
    match vote {
        SignalVote::Majority => {
            let count = |signal: Signal| votes.iter().filter(|v| **v == signal).count();
            // Bearish first so ties keep the most conservative signal
            [Signal::Sell, Signal::Hold, Signal::Buy]
                .into_iter()
                .fold((Signal::Hold, 0), |best, signal| {
                    let n = count(signal);
                    if n > best.1 {
                        (signal, n)
                    } else {
                        best
                    }
                })
                .0
        }
        SignalVote::Unanimous => match votes.split_first() {
            Some((first, rest)) if rest.iter().all(|v| v == first) => *first,
            _ => Signal::Hold,
        },
        SignalVote::Weighted(weights) => {
            let total: f64 = weights.iter().sum();
            if total == 0.0 {
                return Signal::Hold;
            }
            let score: f64 = votes
                .iter()
                .zip(weights)
                .map(|(v, w)| f64::from(v.score()) * w)
                .sum();
            Signal::from_score(score / total)
        }
    }
}

fn per_symbol(selected: &BTreeSet<String>, f: impl Fn(&str) -> Signal) -> BTreeMap<String, Signal> {
    selected.iter().map(|s| (s.clone(), f(s))).collect()
}
