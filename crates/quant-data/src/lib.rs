//! Market data providers.
//!
//! Everything here implements [`MarketDataProvider`]: a directory of CSV
//! files, an in-memory store, and a caching wrapper for either.

mod cache;
mod csv_source;
mod memory;

pub use cache::{CacheStats, CachedDataSource};
pub use csv_source::CsvDataSource;
pub use memory::InMemoryDataSource;

use chrono::NaiveDate;
use quant_core::{Bar, DataError, MarketDataProvider};
use std::path::Path;

/// Load bars for `symbols` from a directory of CSV files.
pub async fn load_csv(
    dir: impl AsRef<Path>,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Bar>, DataError> {
    let source = CsvDataSource::new(dir)?;
    source.bars(symbols, start, end).await
}
