//! Universe screening helpers.

use quant_core::MarketView;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::indicators;

/// How several screen results are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMethod {
    /// Symbols present in every screen
    #[default]
    Intersection,
    /// Symbols present in any screen
    Union,
}

/// Symbols that traded today and are not delisted.
pub fn tradeable<'a>(
    universe: impl IntoIterator<Item = &'a String>,
    market: &MarketView<'_>,
) -> BTreeSet<String> {
    universe
        .into_iter()
        .filter(|s| market.bar(s).is_some() && !market.is_delisted(s))
        .cloned()
        .collect()
}

/// Symbols whose latest close lies in `[min_price, max_price]`.
pub fn by_price_range<'a>(
    universe: impl IntoIterator<Item = &'a String>,
    market: &MarketView<'_>,
    min_price: f64,
    max_price: f64,
) -> BTreeSet<String> {
    let selected: BTreeSet<String> = universe
        .into_iter()
        .filter(|s| {
            market
                .history(s)
                .last()
                .map(|bar| {
                    let close = bar.close_f64();
                    close >= min_price && close <= max_price
                })
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    debug!(
        selected = selected.len(),
        min_price, max_price, "Screened by price range"
    );
    selected
}

/// The `top_n` symbols by average volume over the last `lookback_days` bars,
/// highest first. Symbols with a shorter history or an average below
/// `min_volume` are skipped.
pub fn by_volume<'a>(
    universe: impl IntoIterator<Item = &'a String>,
    market: &MarketView<'_>,
    top_n: usize,
    min_volume: f64,
    lookback_days: usize,
) -> Vec<String> {
    let scored = universe.into_iter().filter_map(|s| {
        let volumes = market.volumes(s);
        let average = indicators::sma(&volumes, lookback_days)?;
        (average >= min_volume).then(|| (s.clone(), average))
    });

    let selected = top_by_score(scored, top_n);
    debug!(selected = selected.len(), "Screened by volume");
    selected
}

/// The `top_n` symbols by total return over `lookback_days` bars, strongest
/// first. At least `min_periods` bars of history are required.
pub fn by_momentum<'a>(
    universe: impl IntoIterator<Item = &'a String>,
    market: &MarketView<'_>,
    lookback_days: usize,
    top_n: usize,
    min_periods: usize,
) -> Vec<String> {
    let scored = universe.into_iter().filter_map(|s| {
        let closes = market.closes(s);
        if closes.len() < min_periods.max(1) {
            return None;
        }
        indicators::momentum(&closes, lookback_days).map(|m| (s.clone(), m))
    });

    let selected = top_by_score(scored, top_n);
    debug!(selected = selected.len(), "Screened by momentum");
    selected
}

/// Merge screen results.
pub fn combine(screens: &[BTreeSet<String>], method: CombineMethod) -> BTreeSet<String> {
    let Some((first, rest)) = screens.split_first() else {
        return BTreeSet::new();
    };

    match method {
        CombineMethod::Intersection => rest.iter().fold(first.clone(), |acc, screen| {
            acc.intersection(screen).cloned().collect()
        }),
        CombineMethod::Union => rest.iter().fold(first.clone(), |mut acc, screen| {
            acc.extend(screen.iter().cloned());
            acc
        }),
    }
}

/// Highest scores first, ties by symbol.
fn top_by_score(scored: impl Iterator<Item = (String, f64)>, top_n: usize) -> Vec<String> {
    let mut scored: Vec<(String, f64)> = scored.collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scored.into_iter().take(top_n).map(|(s, _)| s).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{day, market, series, symbols};

    #[test]
    fn test_tradeable_requires_bar_today() {
        let data = market(vec![
            series("AAA", &[10.0, 11.0, 12.0], 100.0),
            series("BBB", &[10.0, 11.0], 100.0),
        ]);
        let universe = symbols(&["AAA", "BBB", "CCC"]);

        let selected = tradeable(&universe, &data.view(day(2)));
        assert_eq!(selected, symbols(&["AAA"]).into_iter().collect());
    }

    #[test]
    fn test_by_price_range() {
        let data = market(vec![
            series("CHEAP", &[2.0, 3.0], 100.0),
            series("MID", &[50.0, 60.0], 100.0),
            series("RICH", &[2000.0, 2100.0], 100.0),
        ]);
        let universe = symbols(&["CHEAP", "MID", "RICH"]);

        let selected = by_price_range(&universe, &data.view(day(1)), 5.0, 1000.0);
        assert_eq!(selected.len(), 1);
        assert!(selected.contains("MID"));
    }

    #[test]
    fn test_by_volume_ranks_and_filters() {
        let data = market(vec![
            series("LOW", &[10.0; 5], 10.0),
            series("HIGH", &[10.0; 5], 5000.0),
            series("MID", &[10.0; 5], 1000.0),
            series("SHORT", &[10.0; 2], 9000.0),
        ]);
        let universe = symbols(&["LOW", "HIGH", "MID", "SHORT"]);

        let selected = by_volume(&universe, &data.view(day(4)), 5, 100.0, 5);
        assert_eq!(selected, symbols(&["HIGH", "MID"]));

        let top_one = by_volume(&universe, &data.view(day(4)), 1, 0.0, 5);
        assert_eq!(top_one, symbols(&["HIGH"]));
    }

    #[test]
    fn test_by_momentum_orders_strongest_first() {
        let data = market(vec![
            series("UP", &[10.0, 11.0, 12.0, 13.0], 1.0),
            series("FLAT", &[10.0, 10.0, 10.0, 10.0], 1.0),
            series("DOWN", &[10.0, 9.0, 8.0, 7.0], 1.0),
        ]);
        let universe = symbols(&["DOWN", "FLAT", "UP"]);

        let ranked = by_momentum(&universe, &data.view(day(3)), 4, 2, 3);
        assert_eq!(ranked, symbols(&["UP", "FLAT"]));

        // Not enough history yet
        assert!(by_momentum(&universe, &data.view(day(1)), 4, 2, 3).is_empty());
    }

    #[test]
    fn test_combine() {
        let a: BTreeSet<String> = symbols(&["A", "B", "C"]).into_iter().collect();
        let b: BTreeSet<String> = symbols(&["B", "C", "D"]).into_iter().collect();

        let both = combine(&[a.clone(), b.clone()], CombineMethod::Intersection);
        assert_eq!(both, symbols(&["B", "C"]).into_iter().collect());

        let any = combine(&[a, b], CombineMethod::Union);
        assert_eq!(any.len(), 4);
        assert!(combine(&[], CombineMethod::Union).is_empty());
    }
}
