//! Prefetched market data and point-in-time views over it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::DataError;
use crate::traits::PriceLookup;
use crate::types::Bar;

/// Read-only, date-indexed store of daily bars for a set of instruments.
///
/// Built once before a run and shared between runs; never mutated during a
/// simulation.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    series: BTreeMap<String, Vec<Bar>>,
    delistings: BTreeMap<String, NaiveDate>,
}

impl MarketData {
    /// Group bars by symbol and sort them by date.
    ///
    /// Fails if two bars share the same symbol and date.
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Result<Self, DataError> {
        let mut series: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
        for bar in bars {
            series.entry(bar.symbol.clone()).or_default().push(bar);
        }

        for bars in series.values_mut() {
            bars.sort_by_key(|b| b.date);
            if let Some(pair) = bars.windows(2).find(|w| w[0].date == w[1].date) {
                return Err(DataError::DuplicateBar {
                    symbol: pair[0].symbol.clone(),
                    date: pair[0].date,
                });
            }
        }

        Ok(Self {
            series,
            delistings: BTreeMap::new(),
        })
    }

    /// Attach delisting dates (first date the instrument no longer trades).
    pub fn with_delistings(mut self, delistings: BTreeMap<String, NaiveDate>) -> Self {
        self.delistings = delistings;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.series.contains_key(symbol)
    }

    /// Full bar history for a symbol.
    pub fn series(&self, symbol: &str) -> Option<&[Bar]> {
        self.series.get(symbol).map(Vec::as_slice)
    }

    /// The bar for `symbol` on exactly `date`.
    pub fn bar(&self, symbol: &str, date: NaiveDate) -> Option<&Bar> {
        let bars = self.series.get(symbol)?;
        bars.binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|idx| &bars[idx])
    }

    /// Every date in `[start, end]` on which at least one of `symbols` has a bar.
    pub fn trading_calendar(&self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut dates = BTreeSet::new();
        for symbol in symbols {
            if let Some(bars) = self.series.get(symbol) {
                dates.extend(
                    bars.iter()
                        .map(|b| b.date)
                        .filter(|d| *d >= start && *d <= end),
                );
            }
        }
        dates.into_iter().collect()
    }

    /// Closing prices of `symbol` keyed by date.
    pub fn close_series(&self, symbol: &str) -> Vec<(NaiveDate, Decimal)> {
        self.series
            .get(symbol)
            .map(|bars| bars.iter().map(|b| (b.date, b.close)).collect())
            .unwrap_or_default()
    }

    /// A view of the data as it was known at the close of `date`.
    pub fn view(&self, date: NaiveDate) -> MarketView<'_> {
        MarketView { data: self, date }
    }
}

impl PriceLookup for MarketData {
    fn close(&self, symbol: &str, date: NaiveDate) -> Option<Decimal> {
        self.bar(symbol, date).map(|b| b.close)
    }

    fn is_delisted(&self, symbol: &str, date: NaiveDate) -> bool {
        self.delistings
            .get(symbol)
            .map(|delisted| *delisted <= date)
            .unwrap_or(false)
    }
}

/// Point-in-time view: only bars dated on or before `date` are visible.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    data: &'a MarketData,
    date: NaiveDate,
}

impl<'a> MarketView<'a> {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Bars for `symbol` up to and including the view date.
    pub fn history(&self, symbol: &str) -> &'a [Bar] {
        match self.data.series(symbol) {
            Some(bars) => {
                let end = bars.partition_point(|b| b.date <= self.date);
                &bars[..end]
            }
            None => &[],
        }
    }

    /// The last `n` visible bars.
    pub fn lookback(&self, symbol: &str, n: usize) -> &'a [Bar] {
        let history = self.history(symbol);
        &history[history.len().saturating_sub(n)..]
    }

    /// Today's bar, if the instrument traded.
    pub fn bar(&self, symbol: &str) -> Option<&'a Bar> {
        self.data.bar(symbol, self.date)
    }

    pub fn close(&self, symbol: &str) -> Option<Decimal> {
        self.bar(symbol).map(|b| b.close)
    }

    pub fn closes(&self, symbol: &str) -> Vec<f64> {
        self.history(symbol).iter().map(Bar::close_f64).collect()
    }

    pub fn volumes(&self, symbol: &str) -> Vec<f64> {
        self.history(symbol).iter().map(Bar::volume_f64).collect()
    }

    pub fn is_delisted(&self, symbol: &str) -> bool {
        self.data.is_delisted(symbol, self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample() -> MarketData {
        MarketData::from_bars(vec![
            Bar::flat("AAA", day(3), dec!(11), dec!(100)),
            Bar::flat("AAA", day(2), dec!(10), dec!(100)),
            Bar::flat("BBB", day(2), dec!(20), dec!(100)),
            Bar::flat("BBB", day(4), dec!(22), dec!(100)),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_bars_sorts_and_indexes() {
        let data = sample();
        let aaa = data.series("AAA").unwrap();
        assert_eq!(aaa[0].date, day(2));
        assert_eq!(data.close("AAA", day(3)), Some(dec!(11)));
        assert_eq!(data.close("BBB", day(3)), None);
        assert_eq!(data.bar("BBB", day(4)).unwrap().close, dec!(22));
    }

    #[test]
    fn test_duplicate_bar_rejected() {
        let result = MarketData::from_bars(vec![
            Bar::flat("AAA", day(2), dec!(10), dec!(1)),
            Bar::flat("AAA", day(2), dec!(11), dec!(1)),
        ]);
        assert!(matches!(result, Err(DataError::DuplicateBar { .. })));
    }

    #[test]
    fn test_trading_calendar_is_union_of_dates() {
        let data = sample();
        let symbols = vec!["AAA".to_string(), "BBB".to_string()];
        assert_eq!(data.trading_calendar(&symbols, day(1), day(31)), vec![day(2), day(3), day(4)]);
        assert_eq!(data.trading_calendar(&symbols, day(3), day(3)), vec![day(3)]);
    }

    #[test]
    fn test_view_hides_future_bars() {
        let data = sample();
        let view = data.view(day(3));
        assert_eq!(view.history("AAA").len(), 2);
        assert_eq!(view.history("BBB").len(), 1);
        assert_eq!(view.closes("AAA"), vec![10.0, 11.0]);
        assert_eq!(view.lookback("AAA", 1).len(), 1);
        assert!(view.bar("BBB").is_none());
        assert!(view.history("ZZZ").is_empty());
    }

    #[test]
    fn test_delisting_lookup() {
        let mut delistings = BTreeMap::new();
        delistings.insert("BBB".to_string(), day(3));
        let data = sample().with_delistings(delistings);

        assert!(!data.is_delisted("BBB", day(2)));
        assert!(data.is_delisted("BBB", day(3)));
        assert!(data.view(day(4)).is_delisted("BBB"));
        assert!(!data.is_delisted("AAA", day(4)));
    }
}
