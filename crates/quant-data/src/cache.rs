//! Data caching.

use async_trait::async_trait;
use chrono::NaiveDate;
use quant_core::{Bar, DataError, MarketDataProvider};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// Bars fetched for one symbol and the range they cover.
#[derive(Debug, Clone)]
struct CachedSeries {
    start: NaiveDate,
    end: NaiveDate,
    bars: Vec<Bar>,
}

impl CachedSeries {
    fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= start && self.end >= end
    }
}

/// Cache hit and miss counts, per symbol request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Wraps a provider and keeps every symbol's bars in memory, so repeated
/// runs over the same universe only hit the inner provider once.
pub struct CachedDataSource<P> {
    inner: P,
    cache: Mutex<HashMap<String, CachedSeries>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: MarketDataProvider> CachedDataSource<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop cached bars for a symbol.
    pub async fn clear(&self, symbol: &str) {
        self.cache.lock().await.remove(symbol);
    }

    /// Drop everything.
    pub async fn clear_all(&self) {
        self.cache.lock().await.clear();
    }
}

#[async_trait]
impl<P: MarketDataProvider> MarketDataProvider for CachedDataSource<P> {
    async fn bars(&self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>, DataError> {
        let mut cache = self.cache.lock().await;

        let missing: Vec<String> = symbols
            .iter()
            .filter(|s| !cache.get(*s).map(|c| c.covers(start, end)).unwrap_or(false))
            .cloned()
            .collect();
        self.hits
            .fetch_add((symbols.len() - missing.len()) as u64, Ordering::Relaxed);
        self.misses.fetch_add(missing.len() as u64, Ordering::Relaxed);

        if !missing.is_empty() {
            debug!(provider = self.inner.name(), symbols = missing.len(), "Cache miss, fetching");
            let fetched = self.inner.bars(&missing, start, end).await?;
            let mut grouped: HashMap<String, Vec<Bar>> = missing.iter().map(|s| (s.clone(), Vec::new())).collect();
            for bar in fetched {
                grouped.entry(bar.symbol.clone()).or_default().push(bar);
            }
            for (symbol, bars) in grouped {
                cache.insert(symbol, CachedSeries { start, end, bars });
            }
        }

        let mut bars = Vec::new();
        for symbol in symbols {
            if let Some(series) = cache.get(symbol) {
                bars.extend(series.bars.iter().filter(|b| b.date >= start && b.date <= end).cloned());
            }
        }
        Ok(bars)
    }

    async fn delistings(&self, symbols: &[String]) -> Result<BTreeMap<String, NaiveDate>, DataError> {
        self.inner.delistings(symbols).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
