//! In-memory collaborators.
//!
//! Reference implementations of [`HistoryReader`] and [`CandleCache`] for
//! embedding and tests. Both count the calls they serve so callers can assert
//! which I/O a code path performed.

use super::provider::{CacheKey, CandleCache, DataError, HistoryReader};
use crate::domain::Candle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

fn poisoned(what: &str) -> DataError {
    DataError::Other(format!("{what} lock poisoned"))
}

/// Persistent-store stand-in: 1-minute candles per (exchange, symbol), keyed by timestamp.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    rows: RwLock<HashMap<(String, String), BTreeMap<i64, Candle>>>,
    range_queries: AtomicUsize,
    boundary_queries: AtomicUsize,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert candles, replacing any row with the same timestamp.
    pub fn insert(
        &self,
        exchange: &str,
        symbol: &str,
        candles: &[Candle],
    ) -> Result<(), DataError> {
        let mut rows = self.rows.write().map_err(|_| poisoned("history"))?;
        let series = rows
            .entry((exchange.to_string(), symbol.to_string()))
            .or_default();
        for candle in candles {
            series.insert(candle.timestamp, *candle);
        }
        Ok(())
    }

    /// Number of `range_query` calls served.
    pub fn range_queries(&self) -> usize {
        self.range_queries.load(Ordering::Relaxed)
    }

    /// Number of `first_candle` + `last_candle` calls served.
    pub fn boundary_queries(&self) -> usize {
        self.boundary_queries.load(Ordering::Relaxed)
    }

    fn boundary(
        &self,
        exchange: &str,
        symbol: &str,
        pick: impl FnOnce(&BTreeMap<i64, Candle>) -> Option<Candle>,
    ) -> Result<Option<Candle>, DataError> {
        self.boundary_queries.fetch_add(1, Ordering::Relaxed);
        let rows = self.rows.read().map_err(|_| poisoned("history"))?;
        Ok(rows
            .get(&(exchange.to_string(), symbol.to_string()))
            .and_then(pick))
    }
}

impl HistoryReader for MemoryHistory {
    fn range_query(
        &self,
        exchange: &str,
        symbol: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Candle>, DataError> {
        self.range_queries.fetch_add(1, Ordering::Relaxed);
        if start > end {
            return Ok(Vec::new());
        }
        let rows = self.rows.read().map_err(|_| poisoned("history"))?;
        Ok(rows
            .get(&(exchange.to_string(), symbol.to_string()))
            .map(|series| series.range(start..=end).map(|(_, c)| *c).collect())
            .unwrap_or_default())
    }

    fn first_candle(&self, exchange: &str, symbol: &str) -> Result<Option<Candle>, DataError> {
        self.boundary(exchange, symbol, |series| {
            series.first_key_value().map(|(_, c)| *c)
        })
    }

    fn last_candle(&self, exchange: &str, symbol: &str) -> Result<Option<Candle>, DataError> {
        self.boundary(exchange, symbol, |series| {
            series.last_key_value().map(|(_, c)| *c)
        })
    }
}

/// Cache-service stand-in. Entries never expire.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, Vec<Candle>>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `get` calls served.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }

    /// Number of `set` calls served.
    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::Relaxed)
    }
}

impl CandleCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<Candle>>, DataError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        let entries = self.entries.read().map_err(|_| poisoned("cache"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &CacheKey, candles: &[Candle]) -> Result<(), DataError> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write().map_err(|_| poisoned("cache"))?;
        entries.insert(key.clone(), candles.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute(ts: i64, close: f64) -> Candle {
        Candle::new(ts, close, close, close + 1.0, close - 1.0, 1.0)
    }

    #[test]
    fn range_query_is_inclusive_and_ascending() {
        let history = MemoryHistory::new();
        history
            .insert(
                "X",
                "Y",
                &[minute(180_000, 3.0), minute(0, 1.0), minute(60_000, 2.0)],
            )
            .unwrap();

        let rows = history.range_query("X", "Y", 0, 120_000).unwrap();
        let ts: Vec<i64> = rows.iter().map(|c| c.timestamp).collect();
        assert_eq!(ts, vec![0, 60_000]);
        assert_eq!(history.range_queries(), 1);
    }

    #[test]
    fn boundaries_report_first_and_last() {
        let history = MemoryHistory::new();
        history
            .insert("X", "Y", &[minute(60_000, 2.0), minute(0, 1.0)])
            .unwrap();

        assert_eq!(history.first_candle("X", "Y").unwrap().unwrap().timestamp, 0);
        assert_eq!(
            history.last_candle("X", "Y").unwrap().unwrap().timestamp,
            60_000
        );
        assert!(history.first_candle("X", "Z").unwrap().is_none());
        assert_eq!(history.boundary_queries(), 3);
    }

    #[test]
    fn unknown_symbol_yields_empty_range() {
        let history = MemoryHistory::new();
        assert!(history.range_query("X", "Y", 0, i64::MAX).unwrap().is_empty());
    }

    #[test]
    fn cache_set_then_get() {
        let cache = MemoryCache::new();
        let key = CacheKey::new(0, 60_000, "X", "Y");
        assert!(cache.get(&key).unwrap().is_none());

        cache.set(&key, &[minute(0, 1.0)]).unwrap();
        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key).unwrap().unwrap().len(), 1);
        assert_eq!(cache.gets(), 2);
        assert_eq!(cache.sets(), 1);
    }
}
