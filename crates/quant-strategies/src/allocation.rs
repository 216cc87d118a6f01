//! Portfolio weighting schemes.
//!
//! All schemes return weights summing to 1.0 over the symbols they keep, and
//! fall back to equal weights when none of the symbols has usable data.

use chrono::NaiveDate;
use quant_core::MarketView;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::indicators;

/// Minimum closes before a volatility estimate is trusted.
const MIN_VOLATILITY_BARS: usize = 20;
/// Minimum returns inside the volatility window.
const MIN_VOLATILITY_RETURNS: usize = 10;
/// Minimum closes before a symbol enters a covariance estimate.
const MIN_COVARIANCE_BARS: usize = 50;
/// Minimum returns, per symbol and shared by all symbols, for a covariance
/// estimate.
const MIN_COVARIANCE_RETURNS: usize = 20;
const RISK_PARITY_MAX_SWEEPS: usize = 1_000;
const RISK_PARITY_TOLERANCE: f64 = 1e-10;

/// Weighting scheme selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    #[default]
    Equal,
    InverseVolatility,
    Momentum,
    RiskParity,
    MinimumVariance,
}

/// Same weight for every symbol.
pub fn equal_weight<'a>(symbols: impl IntoIterator<Item = &'a String>) -> BTreeMap<String, f64> {
    let symbols: Vec<&String> = symbols.into_iter().collect();
    if symbols.is_empty() {
        return BTreeMap::new();
    }
    let weight = 1.0 / symbols.len() as f64;
    symbols.into_iter().map(|s| (s.clone(), weight)).collect()
}

/// Weights proportional to the inverse of each symbol's return volatility
/// over the last `lookback_days` returns.
pub fn inverse_volatility<'a>(
    symbols: impl IntoIterator<Item = &'a String> + Clone,
    market: &MarketView<'_>,
    lookback_days: usize,
) -> BTreeMap<String, f64> {
    let inverse: BTreeMap<String, f64> = symbols
        .clone()
        .into_iter()
        .filter_map(|s| {
            let closes = market.closes(s);
            if closes.len() < MIN_VOLATILITY_BARS {
                return None;
            }
            let returns = indicators::pct_returns(&closes);
            let window = &returns[returns.len().saturating_sub(lookback_days)..];
            if window.len() < MIN_VOLATILITY_RETURNS {
                return None;
            }
            let vol = indicators::std_dev(window)?;
            (vol > 0.0).then(|| (s.clone(), 1.0 / vol))
        })
        .collect();

    if inverse.is_empty() {
        warn!("No usable volatility data, using equal weights");
        return equal_weight(symbols);
    }
    debug!(symbols = inverse.len(), "Inverse volatility allocation");
    normalize(&inverse)
}

/// Weights proportional to positive momentum over `lookback_days`, raised to
/// `power`. Symbols with non-positive momentum are left out.
pub fn momentum_weight<'a>(
    symbols: impl IntoIterator<Item = &'a String> + Clone,
    market: &MarketView<'_>,
    lookback_days: usize,
    power: f64,
) -> BTreeMap<String, f64> {
    let scores: BTreeMap<String, f64> = symbols
        .clone()
        .into_iter()
        .filter_map(|s| {
            let closes = market.closes(s);
            if closes.len() < lookback_days {
                return None;
            }
            let momentum = indicators::momentum(&closes, lookback_days)?;
            (momentum > 0.0).then(|| (s.clone(), momentum.powf(power)))
        })
        .collect();

    if scores.is_empty() {
        warn!("No positive momentum, using equal weights");
        return equal_weight(symbols);
    }
    debug!(symbols = scores.len(), "Momentum allocation");
    normalize(&scores)
}

/// Equal risk contribution weights from the covariance of daily returns over
/// the last `lookback_days`.
///
/// Each symbol ends up contributing the same share of portfolio variance.
/// Falls back to equal weights unless at least two symbols share enough
/// return history.
pub fn risk_parity<'a>(
    symbols: impl IntoIterator<Item = &'a String> + Clone,
    market: &MarketView<'_>,
    lookback_days: usize,
) -> BTreeMap<String, f64> {
    let Some((names, cov)) = return_covariance(symbols.clone(), market, lookback_days) else {
        warn!("Insufficient data for risk parity, using equal weights");
        return equal_weight(symbols);
    };

    let n = names.len();
    let budget = 1.0 / n as f64;
    // Cyclical coordinate descent on 0.5 * y'Σy - budget * Σ ln(y_i)
    let mut y: Vec<f64> = (0..n).map(|i| 1.0 / cov[i][i].sqrt()).collect();
    for sweep in 0..RISK_PARITY_MAX_SWEEPS {
        let mut change: f64 = 0.0;
        for i in 0..n {
            let cross: f64 = (0..n).filter(|&j| j != i).map(|j| cov[i][j] * y[j]).sum();
            let updated = (-cross + (cross * cross + 4.0 * cov[i][i] * budget).sqrt()) / (2.0 * cov[i][i]);
            change = change.max((updated - y[i]).abs() / updated.max(f64::MIN_POSITIVE));
            y[i] = updated;
        }
        if change < RISK_PARITY_TOLERANCE {
            debug!(sweeps = sweep + 1, "Risk parity converged");
            break;
        }
    }

    let raw: BTreeMap<String, f64> = names.into_iter().zip(y).collect();
    debug!(symbols = raw.len(), "Risk parity allocation");
    normalize(&raw)
}

/// Long-only minimum variance weights that ignore correlations: each symbol
/// is weighted by the inverse of its daily return variance over the last
/// `lookback_days`, measured on the dates all kept symbols share.
pub fn minimum_variance<'a>(
    symbols: impl IntoIterator<Item = &'a String> + Clone,
    market: &MarketView<'_>,
    lookback_days: usize,
) -> BTreeMap<String, f64> {
    let Some((names, cov)) = return_covariance(symbols.clone(), market, lookback_days) else {
        warn!("Insufficient data for minimum variance, using equal weights");
        return equal_weight(symbols);
    };

    let inverse: BTreeMap<String, f64> = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name, 1.0 / cov[i][i]))
        .collect();
    debug!(symbols = inverse.len(), "Minimum variance allocation");
    normalize(&inverse)
}

/// Sample covariance matrix of daily returns on the dates every usable
/// symbol has a return. `None` when fewer than two symbols qualify, the
/// shared history is too short, or a symbol never moves.
fn return_covariance<'a>(
    symbols: impl IntoIterator<Item = &'a String>,
    market: &MarketView<'_>,
    lookback_days: usize,
) -> Option<(Vec<String>, Vec<Vec<f64>>)> {
    let dated: BTreeMap<&String, BTreeMap<NaiveDate, f64>> = symbols
        .into_iter()
        .filter_map(|s| {
            let history = market.history(s);
            if history.len() < MIN_COVARIANCE_BARS {
                return None;
            }
            let returns: Vec<(NaiveDate, f64)> = history
                .windows(2)
                .filter(|w| w[0].close_f64() != 0.0)
                .map(|w| (w[1].date, w[1].close_f64() / w[0].close_f64() - 1.0))
                .collect();
            let window = &returns[returns.len().saturating_sub(lookback_days)..];
            (window.len() >= MIN_COVARIANCE_RETURNS).then(|| (s, window.iter().copied().collect()))
        })
        .collect();
    if dated.len() < 2 {
        return None;
    }

    let mut shared: Option<BTreeSet<NaiveDate>> = None;
    for returns in dated.values() {
        let dates: BTreeSet<NaiveDate> = returns.keys().copied().collect();
        shared = Some(match shared {
            Some(common) => common.intersection(&dates).copied().collect(),
            None => dates,
        });
    }
    let shared = shared.unwrap_or_default();
    if shared.len() < MIN_COVARIANCE_RETURNS {
        return None;
    }

    let names: Vec<String> = dated.keys().map(|s| (*s).clone()).collect();
    let columns: Vec<Vec<f64>> = dated
        .values()
        .map(|returns| shared.iter().filter_map(|d| returns.get(d).copied()).collect())
        .collect();

    let mut cov = vec![vec![0.0; columns.len()]; columns.len()];
    for i in 0..columns.len() {
        for j in i..columns.len() {
            let value = indicators::covariance(&columns[i], &columns[j])?;
            cov[i][j] = value;
            cov[j][i] = value;
        }
        if cov[i][i] <= 0.0 {
            return None;
        }
    }
    Some((names, cov))
}

/// Predefined weights for the given symbols, rescaled to sum to 1.0.
pub fn target_weight<'a>(
    symbols: impl IntoIterator<Item = &'a String> + Clone,
    targets: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    let picked: BTreeMap<String, f64> = symbols
        .clone()
        .into_iter()
        .filter_map(|s| targets.get(s).map(|w| (s.clone(), *w)))
        .collect();

    if picked.is_empty() {
        warn!("No target weights for selected symbols, using equal weights");
        return equal_weight(symbols);
    }
    normalize(&picked)
}

/// Drop non-positive and non-finite weights and rescale the rest to sum to
/// 1.0.
pub fn normalize(allocation: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let valid: BTreeMap<&String, f64> = allocation
        .iter()
        .filter(|(_, w)| w.is_finite() && **w > 0.0)
        .map(|(s, w)| (s, *w))
        .collect();

    let total: f64 = valid.values().sum();
    if total <= 0.0 {
        return BTreeMap::new();
    }
    valid.into_iter().map(|(s, w)| (s.clone(), w / total)).collect()
}

/// Apply `weighting` to `symbols`.
pub fn weigh<'a>(
    weighting: Weighting,
    symbols: impl IntoIterator<Item = &'a String> + Clone,
    market: &MarketView<'_>,
    lookback_days: usize,
    momentum_power: f64,
) -> BTreeMap<String, f64> {
    match weighting {
        Weighting::Equal => equal_weight(symbols),
        Weighting::InverseVolatility => inverse_volatility(symbols, market, lookback_days),
        Weighting::Momentum => momentum_weight(symbols, market, lookback_days, momentum_power),
        Weighting::RiskParity => risk_parity(symbols, market, lookback_days),
        Weighting::MinimumVariance => minimum_variance(symbols, market, lookback_days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{day, market, series, symbols};
    use quant_core::MarketData;

    fn sum(weights: &BTreeMap<String, f64>) -> f64 {
        weights.values().sum()
    }

    fn zigzag(base: f64, amplitude: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| if i % 2 == 0 { base } else { base + amplitude })
            .collect()
    }

    #[test]
    fn test_equal_weight() {
        let names = symbols(&["A", "B", "C", "D"]);
        let weights = equal_weight(&names);
        assert_eq!(weights.len(), 4);
        assert!((weights["A"] - 0.25).abs() < 1e-12);
        assert!(equal_weight(&Vec::new()).is_empty());
    }

    #[test]
    fn test_inverse_volatility_favours_calm() {
        let data = market(vec![
            series("CALM", &zigzag(100.0, 1.0, 30), 1.0),
            series("WILD", &zigzag(100.0, 10.0, 30), 1.0),
        ]);
        let names = symbols(&["CALM", "WILD"]);

        let weights = inverse_volatility(&names, &data.view(day(29)), 252);
        assert!(weights["CALM"] > weights["WILD"]);
        assert!((sum(&weights) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_volatility_falls_back_to_equal() {
        let data = market(vec![series("A", &[10.0, 11.0], 1.0), series("B", &[10.0, 9.0], 1.0)]);
        let names = symbols(&["A", "B"]);

        let weights = inverse_volatility(&names, &data.view(day(1)), 252);
        assert!((weights["A"] - 0.5).abs() < 1e-12);
    }

    /// Closes repeating `pattern` around 100, so each series has its own
    /// volatility and cycle.
    fn cycle(pattern: &[f64], n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + pattern[i % pattern.len()]).collect()
    }

    fn three_assets() -> MarketData {
        market(vec![
            series("A", &cycle(&[0.0, 1.0], 80), 1.0),
            series("B", &cycle(&[0.0, 5.0, 2.0], 80), 1.0),
            series("C", &cycle(&[0.0, 3.0, -2.0, 4.0, 1.0], 80), 1.0),
        ])
    }

    #[test]
    fn test_risk_parity_equalizes_risk_contributions() {
        let data = three_assets();
        let view = data.view(day(79));
        let names = symbols(&["A", "B", "C"]);

        let weights = risk_parity(&names, &view, 252);
        assert!((sum(&weights) - 1.0).abs() < 1e-9);

        let (order, cov) = return_covariance(&names, &view, 252).unwrap();
        let w: Vec<f64> = order.iter().map(|s| weights[s]).collect();
        let contributions: Vec<f64> = (0..3)
            .map(|i| w[i] * (0..3).map(|j| cov[i][j] * w[j]).sum::<f64>())
            .collect();
        let total: f64 = contributions.iter().sum();
        for contribution in contributions {
            assert!((contribution / total - 1.0 / 3.0).abs() < 1e-6);
        }
        assert!(weights["A"] > weights["B"]);
    }

    #[test]
    fn test_risk_parity_needs_shared_history() {
        let data = market(vec![
            series("LONG", &cycle(&[0.0, 1.0], 60), 1.0),
            series("SHORT", &cycle(&[0.0, 2.0], 30), 1.0),
        ]);
        let names = symbols(&["LONG", "SHORT"]);

        let weights = risk_parity(&names, &data.view(day(59)), 252);
        assert!((weights["LONG"] - 0.5).abs() < 1e-12);
        assert!((weights["SHORT"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_minimum_variance_weights_by_inverse_variance() {
        let data = market(vec![
            series("CALM", &zigzag(100.0, 1.0, 60), 1.0),
            series("WILD", &zigzag(100.0, 10.0, 60), 1.0),
        ]);
        let view = data.view(day(59));
        let names = symbols(&["CALM", "WILD"]);

        let by_variance = minimum_variance(&names, &view, 252);
        let by_volatility = inverse_volatility(&names, &view, 252);
        let variance_ratio = by_variance["CALM"] / by_variance["WILD"];
        let volatility_ratio = by_volatility["CALM"] / by_volatility["WILD"];

        assert!((sum(&by_variance) - 1.0).abs() < 1e-9);
        assert!((variance_ratio - volatility_ratio.powi(2)).abs() < 1e-6 * variance_ratio);
    }

    #[test]
    fn test_minimum_variance_skips_flat_symbol() {
        let data = market(vec![
            series("FLAT", &[100.0; 60], 1.0),
            series("MOVING", &zigzag(100.0, 1.0, 60), 1.0),
        ]);
        let names = symbols(&["FLAT", "MOVING"]);

        let weights = minimum_variance(&names, &data.view(day(59)), 252);
        assert!((weights["FLAT"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_momentum_weight_skips_losers() {
        let data = market(vec![
            series("FAST", &[100.0, 110.0, 130.0], 1.0),
            series("SLOW", &[100.0, 105.0, 110.0], 1.0),
            series("LOSER", &[100.0, 95.0, 90.0], 1.0),
        ]);
        let names = symbols(&["FAST", "LOSER", "SLOW"]);

        let weights = momentum_weight(&names, &data.view(day(2)), 3, 1.0);
        assert!(!weights.contains_key("LOSER"));
        assert!((weights["FAST"] - 0.75).abs() < 1e-9);
        assert!((weights["SLOW"] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_target_weight_normalizes() {
        let targets: BTreeMap<String, f64> =
            [("A".to_string(), 0.3), ("B".to_string(), 0.1), ("Z".to_string(), 0.6)].into();
        let names = symbols(&["A", "B"]);

        let weights = target_weight(&names, &targets);
        assert!((weights["A"] - 0.75).abs() < 1e-12);
        assert!((weights["B"] - 0.25).abs() < 1e-12);

        let unknown = symbols(&["Q"]);
        assert_eq!(target_weight(&unknown, &targets)["Q"], 1.0);
    }

    #[test]
    fn test_normalize_drops_invalid() {
        let raw: BTreeMap<String, f64> = [
            ("A".to_string(), 2.0),
            ("B".to_string(), 0.0),
            ("C".to_string(), -1.0),
            ("D".to_string(), f64::NAN),
            ("E".to_string(), 6.0),
        ]
        .into();

        let weights = normalize(&raw);
        assert_eq!(weights.len(), 2);
        assert!((weights["A"] - 0.25).abs() < 1e-12);
        assert!(normalize(&BTreeMap::new()).is_empty());
    }
}
