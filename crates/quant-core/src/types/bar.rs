//! End-of-day OHLCV bar.

use chrono::NaiveDate;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar for a single instrument.
///
/// Prices are exact decimals so that trade accounting never drifts; strategy
/// code that needs floating point goes through the `*_f64` accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Instrument identifier
    pub symbol: String,
    /// Trading date
    pub date: NaiveDate,
    /// Opening price
    pub open: Decimal,
    /// Highest price
    pub high: Decimal,
    /// Lowest price
    pub low: Decimal,
    /// Closing price
    pub close: Decimal,
    /// Traded volume
    pub volume: Decimal,
}

impl Bar {
    /// Create a new bar.
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Create a bar where open, high, low and close are all `price`.
    pub fn flat(symbol: impl Into<String>, date: NaiveDate, price: Decimal, volume: Decimal) -> Self {
        Self::new(symbol, date, price, price, price, price, volume)
    }

    #[inline]
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }

    #[inline]
    pub fn volume_f64(&self) -> f64 {
        self.volume.to_f64().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bar_float_accessors() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bar = Bar::new("AAPL", date, dec!(100), dec!(110), dec!(95), dec!(105), dec!(1000));

        assert!((bar.close_f64() - 105.0).abs() < f64::EPSILON);
        assert!((bar.volume_f64() - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_flat_bar() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bar = Bar::flat("SPY", date, dec!(470.5), dec!(10));
        assert_eq!(bar.open, bar.close);
        assert_eq!(bar.high, bar.low);
        assert_eq!(bar.volume, dec!(10));
    }
}
