//! Point-in-time indicator values over close and volume histories.
//!
//! Every function looks only at the slice it is given and returns `None`
//! when the history is too short, so callers can map "not enough data" to a
//! neutral signal.

use statrs::statistics::Statistics;

/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Relative strength index over the last `period` price changes.
///
/// Gains and losses are averaged with a simple rolling mean. A window with
/// gains but no losses reads 100; a window with no movement is undefined.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let window = &values[values.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(gains, losses), delta| {
            if delta > 0.0 {
                (gains + delta, losses)
            } else {
                (gains, losses - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return if avg_gain > 0.0 { Some(100.0) } else { None };
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let std = values.std_dev();
    std.is_finite().then_some(std)
}

/// Sample covariance of two equally long series.
pub fn covariance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let cov = a.covariance(b);
    cov.is_finite().then_some(cov)
}

/// Bollinger bands `(lower, middle, upper)` over the last `period` values.
pub fn bollinger(values: &[f64], period: usize, num_std: f64) -> Option<(f64, f64, f64)> {
    let middle = sma(values, period)?;
    let std = std_dev(&values[values.len() - period..])?;
    Some((middle - num_std * std, middle, middle + num_std * std))
}

/// Simple period-over-period returns.
pub fn pct_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Total return over the last `lookback` values, or over the whole history
/// when it is shorter.
pub fn momentum(values: &[f64], lookback: usize) -> Option<f64> {
    let last = *values.last()?;
    let first = if values.len() >= lookback && lookback > 0 {
        values[values.len() - lookback]
    } else {
        values[0]
    };
    if first <= 0.0 {
        return None;
    }
    Some((last - first) / first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&data, 3), Some(4.0));
        assert_eq!(sma(&data, 5), Some(3.0));
        assert_eq!(sma(&data, 6), None);
        assert_eq!(sma(&data, 0), None);
    }

    #[test]
    fn test_rsi_bounds() {
        let rising: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        assert_eq!(rsi(&rising, 14), Some(100.0));

        let falling: Vec<f64> = (1..=20).rev().map(|x| x as f64).collect();
        assert!(rsi(&falling, 14).unwrap() < 1e-9);

        let flat = vec![10.0; 20];
        assert_eq!(rsi(&flat, 14), None);
        assert_eq!(rsi(&rising[..14], 14), None);
    }

    #[test]
    fn test_rsi_balanced() {
        let zigzag = [10.0, 11.0, 10.0, 11.0, 10.0];
        let value = rsi(&zigzag, 4).unwrap();
        assert!((value - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_bollinger() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let (lower, middle, upper) = bollinger(&data, 8, 2.0).unwrap();
        assert!((middle - 5.0).abs() < 1e-9);
        assert!((upper - middle - (middle - lower)).abs() < 1e-9);
        assert!(upper > 9.0);
    }

    #[test]
    fn test_covariance() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        assert!((covariance(&a, &b).unwrap() - 2.0 * std_dev(&a).unwrap().powi(2)).abs() < 1e-12);
        assert_eq!(covariance(&a, &b[..3]), None);
        assert_eq!(covariance(&[1.0], &[2.0]), None);
    }

    #[test]
    fn test_momentum_and_returns() {
        let data = [100.0, 110.0, 121.0];
        assert!((momentum(&data, 2).unwrap() - 0.1).abs() < 1e-9);
        assert!((momentum(&data, 10).unwrap() - 0.21).abs() < 1e-9);
        assert_eq!(momentum(&[], 5), None);

        let returns = pct_returns(&data);
        assert_eq!(returns.len(), 2);
        assert!((returns[1] - 0.1).abs() < 1e-9);
    }
}
