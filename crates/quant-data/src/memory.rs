//! In-memory data source.

use async_trait::async_trait;
use chrono::NaiveDate;
use quant_core::{Bar, DataError, MarketDataProvider};
use std::collections::BTreeMap;

/// Bars held in memory, keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    series: BTreeMap<String, Vec<Bar>>,
    delistings: BTreeMap<String, NaiveDate>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source from loose bars.
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut source = Self::new();
        for bar in bars {
            source.insert(bar);
        }
        source
    }

    /// Add a bar, replacing any existing bar for the same symbol and date.
    pub fn insert(&mut self, bar: Bar) {
        let series = self.series.entry(bar.symbol.clone()).or_default();
        match series.binary_search_by_key(&bar.date, |b| b.date) {
            Ok(idx) => series[idx] = bar,
            Err(idx) => series.insert(idx, bar),
        }
    }

    pub fn with_delisting(mut self, symbol: impl Into<String>, date: NaiveDate) -> Self {
        self.delistings.insert(symbol.into(), date);
        self
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryDataSource {
    async fn bars(&self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, DataError> {
        let mut bars = Vec::new();
        for symbol in symbols {
            let series = self
                .series
                .get(symbol)
                .ok_or_else(|| DataError::SymbolNotFound(symbol.clone()))?;
            bars.extend(series.iter().filter(|b| b.date >= start && b.date <= end).cloned());
        }
        Ok(bars)
    }

    async fn delistings(&self, symbols: &[String]) -> Result<BTreeMap<String, NaiveDate>, DataError> {
        Ok(self
            .delistings
            .iter()
            .filter(|(symbol, _)| symbols.contains(symbol))
            .map(|(symbol, date)| (symbol.clone(), *date))
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_insert_keeps_order_and_replaces() {
        let mut source = InMemoryDataSource::new();
        source.insert(Bar::flat("AAA", day(3), dec!(11), dec!(1)));
        source.insert(Bar::flat("AAA", day(2), dec!(10), dec!(1)));
        source.insert(Bar::flat("AAA", day(3), dec!(12), dec!(1)));

        let bars = source.bars(&["AAA".to_string()], day(1), day(31)).await.unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, day(2));
        assert_eq!(bars[1].close, dec!(12));
    }

    #[tokio::test]
    async fn test_unknown_symbol_and_delistings() {
        let source = InMemoryDataSource::from_bars(vec![Bar::flat("AAA", day(2), dec!(10), dec!(1))])
            .with_delisting("AAA", day(5));

        let missing = source.bars(&["ZZZ".to_string()], day(1), day(31)).await;
        assert!(matches!(missing, Err(DataError::SymbolNotFound(_))));

        let delistings = source.delistings(&["AAA".to_string()]).await.unwrap();
        assert_eq!(delistings.get("AAA"), Some(&day(5)));
    }
}
