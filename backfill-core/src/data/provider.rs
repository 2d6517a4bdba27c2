//! Collaborator traits and structured error types for candle data.
//!
//! `HistoryReader` abstracts over the persistent candle store and
//! `CandleCache` over the short-lived cache service, so implementations can
//! be swapped and mocked for tests. Neither trait retries or times out; that
//! policy belongs to the implementation.

use crate::domain::Candle;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Structured error type for collaborator I/O.
///
/// These pass through the loader unchanged.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("history store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Where a loaded candle sequence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Cache,
    Store,
}

/// Read-only queries against the persistent candle store.
///
/// Rows are 1-minute candles keyed by (exchange, symbol, timestamp).
pub trait HistoryReader: Send + Sync {
    /// Candles with `start <= timestamp <= end`, ascending.
    fn range_query(
        &self,
        exchange: &str,
        symbol: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Candle>, DataError>;

    /// Earliest stored candle, if any.
    fn first_candle(&self, exchange: &str, symbol: &str) -> Result<Option<Candle>, DataError>;

    /// Latest stored candle, if any.
    fn last_candle(&self, exchange: &str, symbol: &str) -> Result<Option<Candle>, DataError>;
}

/// Deterministic cache key for a lookback window of one exchange/symbol.
///
/// Encoded as `{pre_start}-{pre_finish}-{exchange}-{symbol}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(pre_start: i64, pre_finish: i64, exchange: &str, symbol: &str) -> Self {
        Self(format!("{pre_start}-{pre_finish}-{exchange}-{symbol}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key/value access to the external cache service.
///
/// Advisory only: callers must be able to recover from any miss through a
/// [`HistoryReader`]. Expiry is the service's business.
pub trait CandleCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<Candle>>, DataError>;

    fn set(&self, key: &CacheKey, candles: &[Candle]) -> Result<(), DataError>;
}
