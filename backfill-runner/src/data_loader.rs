//! Warmup candle loading.
//!
//! Given an exchange, symbol and requested date range, loads the 1-minute
//! candles that must precede the range before a backtest can start:
//! 1. Resolve and validate the warmup window (no I/O on failure)
//! 2. Try the cache under the window's deterministic key
//! 3. On a miss, query the history store and write the rows back
//! 4. Diagnose short warmups as no history / recent listing / historical range
//!
//! Every collaborator is passed in; nothing here holds state between calls.

use backfill_core::availability::{classify, AvailabilityReport};
use backfill_core::clock::Clock;
use backfill_core::data::{detect_gaps, CandleCache, DataError, DataSource, HistoryReader};
use backfill_core::domain::{format_timestamp, Candle};
use backfill_core::fingerprint::dataset_hash;
use backfill_core::store::StoreError;
use backfill_core::window::{RangeError, TimeWindow};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::{BackfillConfig, CacheWritePolicy, ConfigError};

fn ts(ms: &i64) -> String {
    format_timestamp(*ms)
}

fn opt_ts(ms: &Option<i64>) -> String {
    ms.map(format_timestamp).unwrap_or_else(|| "unknown".into())
}

/// Errors from warmup loading and injection.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid backtest range {start} => {finish}: {reason}")]
    InvalidRange {
        start: String,
        finish: String,
        reason: RangeError,
    },

    #[error("no candle for {exchange} {symbol} is present in the database; try importing candles")]
    NoHistory { exchange: String, symbol: String },

    #[error(
        "not enough candles for {exchange} {symbol} yet: first candle is {}, backtests can start from {}; try importing candles",
        ts(.first_available),
        ts(.first_backtestable)
    )]
    InsufficientRecentListing {
        exchange: String,
        symbol: String,
        first_available: i64,
        first_backtestable: i64,
    },

    #[error(
        "not enough candles for {exchange} {symbol} to run a backtest from {start} => {finish}; first available date is {}, last available date is {}",
        ts(.first_backtestable),
        opt_ts(.last_available)
    )]
    InsufficientHistoricalRange {
        exchange: String,
        symbol: String,
        start: String,
        finish: String,
        first_available: i64,
        first_backtestable: i64,
        last_available: Option<i64>,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("runtime store error: {0}")]
    Store(#[from] StoreError),
}

impl LoadError {
    /// True for the three "not enough candles" kinds, where importing more
    /// history or narrowing the range can help.
    pub fn is_insufficiency(&self) -> bool {
        matches!(
            self,
            LoadError::NoHistory { .. }
                | LoadError::InsufficientRecentListing { .. }
                | LoadError::InsufficientHistoricalRange { .. }
        )
    }
}

/// Read-side collaborators for one load.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub history: &'a dyn HistoryReader,
    pub cache: &'a dyn CandleCache,
    pub clock: &'a dyn Clock,
}

/// A sufficient warmup, ready for injection.
#[derive(Debug, Clone)]
pub struct RequiredCandles {
    pub exchange: String,
    pub symbol: String,
    pub window: TimeWindow,
    /// Ascending 1-minute candles covering `window.pre_start..=window.pre_finish`.
    pub candles: Vec<Candle>,
    pub source: DataSource,
}

impl RequiredCandles {
    /// BLAKE3 fingerprint of the candle rows.
    pub fn dataset_hash(&self) -> String {
        dataset_hash(&self.candles)
    }
}

/// Load the warmup candles for `exchange`/`symbol` ahead of `start` => `finish`.
///
/// `start` and `finish` are `YYYY-MM-DD` (UTC). The finish day is exclusive.
#[instrument(skip(config, io))]
pub fn load_required_candles(
    exchange: &str,
    symbol: &str,
    start: &str,
    finish: &str,
    config: &BackfillConfig,
    io: &Collaborators<'_>,
) -> Result<RequiredCandles, LoadError> {
    let resolver = config.range_resolver()?;
    let now = io.clock.now_ms();

    let window = resolver
        .resolve(start, finish, now)
        .map_err(|reason| LoadError::InvalidRange {
            start: start.to_string(),
            finish: finish.to_string(),
            reason,
        })?;
    debug!(
        pre_start = %format_timestamp(window.pre_start),
        pre_finish = %format_timestamp(window.pre_finish),
        lookback = window.lookback_count,
        "resolved warmup window"
    );

    let key = window.cache_key(exchange, symbol);
    let (candles, source) = match io.cache.get(&key)? {
        Some(cached) if !cached.is_empty() => {
            debug!(%key, rows = cached.len(), "warmup cache hit");
            (cached, DataSource::Cache)
        }
        _ => {
            debug!(%key, "warmup cache miss");
            let rows = io
                .history
                .range_query(exchange, symbol, window.pre_start, window.pre_finish)?;
            if config.cache_write == CacheWritePolicy::Always {
                io.cache.set(&key, &rows)?;
            }
            (rows, DataSource::Store)
        }
    };

    let report = classify(candles.len(), &window, io.history, exchange, symbol, now)?;
    match report {
        AvailabilityReport::Sufficient => {}
        AvailabilityReport::NoHistory => {
            warn!(rows = candles.len(), "no history stored");
            return Err(LoadError::NoHistory {
                exchange: exchange.to_string(),
                symbol: symbol.to_string(),
            });
        }
        AvailabilityReport::InsufficientRecentListing {
            first_available,
            first_backtestable,
        } => {
            warn!(
                rows = candles.len(),
                expected = window.expected_rows(),
                first_backtestable = %format_timestamp(first_backtestable),
                "symbol listed too recently for a full warmup"
            );
            return Err(LoadError::InsufficientRecentListing {
                exchange: exchange.to_string(),
                symbol: symbol.to_string(),
                first_available,
                first_backtestable,
            });
        }
        AvailabilityReport::InsufficientHistoricalRange {
            first_available,
            last_available,
            first_backtestable,
        } => {
            warn!(
                rows = candles.len(),
                expected = window.expected_rows(),
                first_backtestable = %format_timestamp(first_backtestable),
                "requested start predates available warmup history"
            );
            return Err(LoadError::InsufficientHistoricalRange {
                exchange: exchange.to_string(),
                symbol: symbol.to_string(),
                start: start.to_string(),
                finish: finish.to_string(),
                first_available,
                first_backtestable,
                last_available,
            });
        }
    }

    if source == DataSource::Store && config.cache_write == CacheWritePolicy::WhenSufficient {
        io.cache.set(&key, &candles)?;
    }

    let gaps = detect_gaps(&candles);
    if let Some(first_gap) = gaps.first() {
        warn!(
            gaps = gaps.len(),
            first_gap_at = %format_timestamp(first_gap.current),
            "warmup stream is not minute-continuous"
        );
    }

    Ok(RequiredCandles {
        exchange: exchange.to_string(),
        symbol: symbol.to_string(),
        window,
        candles,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use backfill_core::clock::FixedClock;
    use backfill_core::data::{MemoryCache, MemoryHistory};
    use backfill_core::domain::{DAY_MS, MINUTE_MS};
    use backfill_core::window::parse_date_ms;

    const NOW: i64 = 1_700_000_000_000;

    fn config() -> BackfillConfig {
        BackfillConfig {
            timeframes: vec![
                backfill_core::domain::Timeframe::Minute1,
                backfill_core::domain::Timeframe::Minute5,
            ],
            warmup_bars: 10,
            ..BackfillConfig::default()
        }
    }

    fn seed(history: &MemoryHistory, from: i64, minutes: i64) {
        let rows: Vec<Candle> = (0..minutes)
            .map(|i| {
                let p = 100.0 + (i % 7) as f64;
                Candle::new(from + i * MINUTE_MS, p, p + 0.5, p + 1.0, p - 1.0, 1.0)
            })
            .collect();
        history.insert("X", "Y", &rows).unwrap();
    }

    #[test]
    fn cold_load_reads_store_and_writes_cache() {
        let history = MemoryHistory::new();
        let cache = MemoryCache::new();
        let day = parse_date_ms("2021-01-09").unwrap();
        seed(&history, day, 2 * 1440);
        let io = Collaborators {
            history: &history,
            cache: &cache,
            clock: &FixedClock(NOW),
        };

        let loaded =
            load_required_candles("X", "Y", "2021-01-10", "2021-01-11", &config(), &io).unwrap();

        assert_eq!(loaded.source, DataSource::Store);
        assert_eq!(loaded.window.pre_start, day);
        assert_eq!(loaded.candles.len(), 1440);
        assert_eq!(cache.sets(), 1);
        assert_eq!(history.boundary_queries(), 0);
    }

    #[test]
    fn warm_load_skips_store() {
        let history = MemoryHistory::new();
        let cache = MemoryCache::new();
        seed(&history, parse_date_ms("2021-01-09").unwrap(), 1440);
        let io = Collaborators {
            history: &history,
            cache: &cache,
            clock: &FixedClock(NOW),
        };

        let cold =
            load_required_candles("X", "Y", "2021-01-10", "2021-01-11", &config(), &io).unwrap();
        let warm =
            load_required_candles("X", "Y", "2021-01-10", "2021-02-01", &config(), &io).unwrap();

        assert_eq!(warm.source, DataSource::Cache);
        assert_eq!(history.range_queries(), 1);
        assert_eq!(cold.dataset_hash(), warm.dataset_hash());
    }

    #[test]
    fn invalid_range_performs_no_io() {
        let history = MemoryHistory::new();
        let cache = MemoryCache::new();
        let io = Collaborators {
            history: &history,
            cache: &cache,
            clock: &FixedClock(NOW),
        };

        let err = load_required_candles("X", "Y", "2021-01-10", "2021-01-10", &config(), &io)
            .unwrap_err();

        assert!(matches!(
            err,
            LoadError::InvalidRange {
                reason: RangeError::SameDay,
                ..
            }
        ));
        assert_eq!(cache.gets(), 0);
        assert_eq!(cache.sets(), 0);
        assert_eq!(history.range_queries(), 0);
        assert_eq!(history.boundary_queries(), 0);
    }

    #[test]
    fn empty_store_is_no_history_and_still_cached() {
        let history = MemoryHistory::new();
        let cache = MemoryCache::new();
        let io = Collaborators {
            history: &history,
            cache: &cache,
            clock: &FixedClock(NOW),
        };

        let err = load_required_candles("X", "Y", "2021-01-10", "2021-01-11", &config(), &io)
            .unwrap_err();

        assert!(matches!(err, LoadError::NoHistory { .. }));
        assert!(err.is_insufficiency());
        assert_eq!(cache.sets(), 1);
    }

    #[test]
    fn when_sufficient_policy_skips_caching_short_fetches() {
        let history = MemoryHistory::new();
        let cache = MemoryCache::new();
        let io = Collaborators {
            history: &history,
            cache: &cache,
            clock: &FixedClock(NOW),
        };
        let config = BackfillConfig {
            cache_write: CacheWritePolicy::WhenSufficient,
            ..config()
        };

        assert!(load_required_candles("X", "Y", "2021-01-10", "2021-01-11", &config, &io).is_err());
        assert_eq!(cache.sets(), 0);

        seed(&history, parse_date_ms("2021-01-09").unwrap(), 1440);
        load_required_candles("X", "Y", "2021-01-10", "2021-01-11", &config, &io).unwrap();
        assert_eq!(cache.sets(), 1);
    }

    #[test]
    fn recent_listing_is_reported() {
        let history = MemoryHistory::new();
        let cache = MemoryCache::new();
        let listed = NOW - DAY_MS;
        seed(&history, listed, 60);
        let io = Collaborators {
            history: &history,
            cache: &cache,
            clock: &FixedClock(NOW),
        };

        let err = load_required_candles("X", "Y", "2021-01-10", "2021-01-11", &config(), &io)
            .unwrap_err();

        match err {
            LoadError::InsufficientRecentListing {
                first_available, ..
            } => assert_eq!(first_available, listed),
            other => panic!("expected recent listing, got {other:?}"),
        }
    }

    #[test]
    fn historical_range_message_names_dates() {
        let history = MemoryHistory::new();
        let cache = MemoryCache::new();
        seed(&history, parse_date_ms("2021-06-01").unwrap(), 60);
        let io = Collaborators {
            history: &history,
            cache: &cache,
            clock: &FixedClock(NOW),
        };

        let err = load_required_candles("X", "Y", "2021-01-10", "2021-01-11", &config(), &io)
            .unwrap_err();

        assert!(matches!(err, LoadError::InsufficientHistoricalRange { .. }));
        let msg = err.to_string();
        assert!(msg.contains("2021-01-10 => 2021-01-11"), "{msg}");
        assert!(msg.contains("2021-06-01 00:59"), "{msg}");
        assert!(msg.contains("2021-06-02 23:59"), "{msg}");
    }
}
