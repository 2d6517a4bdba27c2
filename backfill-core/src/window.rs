//! Lookback window resolution.
//!
//! Turns a calendar date range into a validated backtest range plus the
//! warmup window of 1-minute candles that must precede it:
//!
//! ```text
//!   pre_start (00:00 UTC)        pre_finish  start_date              finish_date
//!   |<------ lookback_count minutes ---->|  |<--- requested range --->|
//! ```
//!
//! `pre_start` is floored to the start of its calendar day so that requests
//! for the same symbol starting on the same day share one cache key.

use crate::data::CacheKey;
use crate::domain::{Timeframe, TimeframeSet, DAY_MS, MINUTE_MS};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Candles of the max timeframe that must be available before the start date.
pub const DEFAULT_WARMUP_BARS: i64 = 210;

/// Upper bound accepted for the warmup size.
pub const MAX_WARMUP_BARS: i64 = 10_000;

/// Why a requested range was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("cannot parse date '{0}' (expected YYYY-MM-DD)")]
    Unparseable(String),

    #[error("start date and finish date cannot be the same")]
    SameDay,

    #[error("start date cannot be after finish date")]
    StartAfterFinish,

    #[error("cannot backtest the future")]
    FutureFinish,

    #[error("a warmup of {0} bars starts outside the representable date range")]
    LookbackOutOfRange(i64),
}

/// A validated request range with its warmup window, all in millisecond epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Requested start, inclusive.
    pub start_date: i64,
    /// Requested finish minus one minute (last minute inside the range).
    pub finish_date: i64,
    /// First minute of the warmup window, floored to 00:00 UTC.
    pub pre_start: i64,
    /// Last minute of the warmup window: `start_date - 1 minute`.
    pub pre_finish: i64,
    /// Minutes between `pre_start` and `pre_finish`.
    pub lookback_count: i64,
}

impl TimeWindow {
    /// Minimum number of 1-minute rows for a complete warmup (inclusive bounds).
    pub fn expected_rows(&self) -> usize {
        usize::try_from(self.lookback_count + 1).unwrap_or(0)
    }

    /// Width of the warmup window in milliseconds.
    pub fn span_ms(&self) -> i64 {
        self.pre_finish - self.pre_start
    }

    pub fn cache_key(&self, exchange: &str, symbol: &str) -> CacheKey {
        CacheKey::new(self.pre_start, self.pre_finish, exchange, symbol)
    }
}

/// Resolves calendar ranges into [`TimeWindow`]s for one timeframe configuration.
#[derive(Debug, Clone, Copy)]
pub struct RangeResolver {
    max_timeframe: Timeframe,
    warmup_bars: i64,
}

impl RangeResolver {
    pub fn new(timeframes: &TimeframeSet) -> Self {
        Self {
            max_timeframe: timeframes.max(),
            warmup_bars: DEFAULT_WARMUP_BARS,
        }
    }

    pub fn with_warmup_bars(mut self, warmup_bars: i64) -> Self {
        self.warmup_bars = warmup_bars;
        self
    }

    /// Initial lookback in minutes, before day-flooring.
    pub fn initial_lookback(&self) -> i64 {
        self.warmup_bars.saturating_mul(self.max_timeframe.minutes())
    }

    /// Validate `start`/`finish` (`YYYY-MM-DD`, UTC) against `now_ms` and
    /// derive the warmup window.
    pub fn resolve(
        &self,
        start: &str,
        finish: &str,
        now_ms: i64,
    ) -> Result<TimeWindow, RangeError> {
        let start_date = parse_date_ms(start)?;
        let finish_raw = parse_date_ms(finish)?;

        if start_date == finish_raw {
            return Err(RangeError::SameDay);
        }
        if start_date > finish_raw {
            return Err(RangeError::StartAfterFinish);
        }
        let finish_date = finish_raw - MINUTE_MS;
        if finish_date > now_ms {
            return Err(RangeError::FutureFinish);
        }

        let pre_finish = start_date - MINUTE_MS;
        let unfloored = self
            .warmup_bars
            .checked_mul(self.max_timeframe.as_millis())
            .and_then(|lookback_ms| pre_finish.checked_sub(lookback_ms))
            .filter(|ms| DateTime::<Utc>::from_timestamp_millis(*ms).is_some())
            .ok_or(RangeError::LookbackOutOfRange(self.warmup_bars))?;
        let pre_start = floor_to_day(unfloored);
        let lookback_count = (pre_finish - pre_start) / MINUTE_MS;

        Ok(TimeWindow {
            start_date,
            finish_date,
            pre_start,
            pre_finish,
            lookback_count,
        })
    }
}

/// Parse `YYYY-MM-DD` into the millisecond epoch of that day's 00:00 UTC.
pub fn parse_date_ms(date: &str) -> Result<i64, RangeError> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| RangeError::Unparseable(date.to_string()))
}

/// Floor a millisecond epoch to 00:00:00 UTC of its day.
pub fn floor_to_day(ms: i64) -> i64 {
    ms - ms.rem_euclid(DAY_MS)
}
