//! CSV data source.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use quant_core::{Bar, DataError, MarketDataProvider};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the optional delisting table inside the data directory.
const DELISTINGS_FILE: &str = "delistings.csv";

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "timestamp", alias = "Timestamp")]
    date: String,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", default)]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct DelistingRecord {
    #[serde(alias = "Symbol")]
    symbol: String,
    #[serde(alias = "Date", alias = "delisted", alias = "delisting_date")]
    date: String,
}

/// Historical daily bars stored as one `<SYMBOL>.csv` file per instrument.
///
/// An optional `delistings.csv` with `symbol,date` columns lists the first
/// date each instrument no longer trades.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    dir: PathBuf,
}

impl CsvDataSource {
    /// Create a new CSV data source over `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, DataError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(DataError::NoDataAvailable);
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `symbol`'s bars.
    pub fn symbol_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol))
    }

    /// Symbols with a bar file in the directory.
    pub fn available_symbols(&self) -> Result<Vec<String>, DataError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| DataError::Internal(e.to_string()))?;
        let mut symbols: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "csv").unwrap_or(false))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .filter(|stem| stem != "delistings")
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}

#[async_trait]
impl MarketDataProvider for CsvDataSource {
    async fn bars(&self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, DataError> {
        let mut bars = Vec::new();
        for symbol in symbols {
            let path = self.symbol_path(symbol);
            if !path.exists() {
                return Err(DataError::SymbolNotFound(symbol.clone()));
            }

            let owned = symbol.clone();
            let loaded = tokio::task::spawn_blocking(move || load_bars(&path, &owned))
                .await
                .map_err(|e| DataError::Internal(e.to_string()))??;

            let before = bars.len();
            bars.extend(loaded.into_iter().filter(|b| b.date >= start && b.date <= end));
            debug!(symbol = %symbol, bars = bars.len() - before, "Loaded CSV bars");
        }
        Ok(bars)
    }

    async fn delistings(&self, symbols: &[String]) -> Result<BTreeMap<String, NaiveDate>, DataError> {
        let path = self.dir.join(DELISTINGS_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let all = tokio::task::spawn_blocking(move || load_delistings(&path))
            .await
            .map_err(|e| DataError::Internal(e.to_string()))??;
        Ok(all.into_iter().filter(|(symbol, _)| symbols.contains(symbol)).collect())
    }

    fn name(&self) -> &str {
        "csv"
    }
}

/// Read every bar in one symbol file, sorted by date.
fn load_bars(path: &Path, symbol: &str) -> Result<Vec<Bar>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::ParseError(e.to_string()))?;

    let mut bars = Vec::new();
    for result in reader.deserialize() {
        let record: CsvRecord = result.map_err(|e| DataError::ParseError(e.to_string()))?;
        let date = parse_date(&record.date)?;
        bars.push(Bar::new(
            symbol,
            date,
            to_decimal(record.open, "open")?,
            to_decimal(record.high, "high")?,
            to_decimal(record.low, "low")?,
            to_decimal(record.close, "close")?,
            to_decimal(record.volume, "volume")?,
        ));
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

fn load_delistings(path: &Path) -> Result<BTreeMap<String, NaiveDate>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::ParseError(e.to_string()))?;

    let mut delistings = BTreeMap::new();
    for result in reader.deserialize() {
        let record: DelistingRecord = result.map_err(|e| DataError::ParseError(e.to_string()))?;
        delistings.insert(record.symbol, parse_date(&record.date)?);
    }
    Ok(delistings)
}

fn to_decimal(value: f64, field: &str) -> Result<Decimal, DataError> {
    Decimal::try_from(value).map_err(|e| DataError::ParseError(format!("invalid {} value {}: {}", field, value, e)))
}

/// Parse various date formats; timestamps keep only their date.
fn parse_date(date_str: &str) -> Result<NaiveDate, DataError> {
    let formats = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
    for format in formats {
        if let Ok(d) = NaiveDate::parse_from_str(date_str, format) {
            return Ok(d);
        }
    }

    let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for format in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Ok(dt.date());
        }
    }

    // Unix timestamp, milliseconds if more than 10 digits
    if let Ok(ts) = date_str.parse::<i64>() {
        let dt = if ts > 10_000_000_000 {
            DateTime::from_timestamp_millis(ts)
        } else {
            DateTime::from_timestamp(ts, 0)
        };
        if let Some(dt) = dt {
            return Ok(dt.date_naive());
        }
    }

    Err(DataError::ParseError(format!("Could not parse date: {}", date_str)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("quant-data-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-01-15").unwrap(), d(2024, 1, 15));
        assert_eq!(parse_date("2024-01-15 10:30:00").unwrap(), d(2024, 1, 15));
        assert_eq!(parse_date("01/15/2024").unwrap(), d(2024, 1, 15));
        assert_eq!(parse_date("1705312800000").unwrap(), d(2024, 1, 15)); // Unix ms
        assert_eq!(parse_date("1705312800").unwrap(), d(2024, 1, 15)); // Unix sec
        assert!(parse_date("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_loads_filtered_range() {
        let dir = temp_dir("range");
        fs::write(
            dir.join("AAPL.csv"),
            "Date,Open,High,Low,Close,Volume\n\
             2024-01-03,101,103,100,102.5,2000\n\
             2024-01-02,100,102,99,101,1000\n\
             2024-01-04,102,104,101,103,1500\n",
        )
        .unwrap();

        let source = CsvDataSource::new(&dir).unwrap();
        let bars = source
            .bars(&["AAPL".to_string()], d(2024, 1, 2), d(2024, 1, 3))
            .await
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d(2024, 1, 2));
        assert_eq!(bars[1].close, dec!(102.5));
        assert_eq!(bars[0].symbol, "AAPL");
        assert_eq!(source.available_symbols().unwrap(), vec!["AAPL".to_string()]);

        fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_symbol_file() {
        let dir = temp_dir("missing");
        let source = CsvDataSource::new(&dir).unwrap();
        let result = source.bars(&["NOPE".to_string()], d(2024, 1, 1), d(2024, 2, 1)).await;

        assert!(matches!(result, Err(DataError::SymbolNotFound(ref s)) if s == "NOPE"));
        fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_delistings_file() {
        let dir = temp_dir("delist");
        fs::write(dir.join("delistings.csv"), "symbol,date\nOLD,2024-03-01\nGONE,2023-06-30\n").unwrap();

        let source = CsvDataSource::new(&dir).unwrap();
        let delistings = source.delistings(&["OLD".to_string()]).await.unwrap();

        assert_eq!(delistings.len(), 1);
        assert_eq!(delistings["OLD"], d(2024, 3, 1));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_directory() {
        assert!(CsvDataSource::new("/definitely/not/here").is_err());
    }
}
