//! Market data trait definitions.

use crate::error::DataError;
use crate::types::Bar;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Read interface to historical end-of-day data.
///
/// Implementations must return at most one bar per instrument per trading
/// date. An instrument with no bar on a date the rest of the universe traded
/// is only acceptable if it is reported through [`delistings`].
///
/// [`delistings`]: MarketDataProvider::delistings
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch bars for `symbols` within `[start, end]`, ordered by date.
    async fn bars(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError>;

    /// Delisting dates for any of `symbols` that stopped trading.
    async fn delistings(&self, _symbols: &[String]) -> Result<BTreeMap<String, NaiveDate>, DataError> {
        Ok(BTreeMap::new())
    }

    /// Get the data source name.
    fn name(&self) -> &str;
}

/// Close-price lookup used when marking a portfolio to market.
pub trait PriceLookup {
    /// Closing price of `symbol` on exactly `date`.
    fn close(&self, symbol: &str, date: NaiveDate) -> Option<Decimal>;

    /// Whether `symbol` has been delisted as of `date`.
    fn is_delisted(&self, _symbol: &str, _date: NaiveDate) -> bool {
        false
    }
}
