//! Candle: the fundamental market data unit.

use super::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV candle at a single left-edge-aligned timestamp.
///
/// Field order matches the persistent store's fixed column order
/// (timestamp, open, close, high, low, volume). Exchange, symbol and timeframe
/// are carried by the stream the candle belongs to, see [`StreamKey`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Millisecond epoch of the bucket's left edge.
    pub timestamp: i64,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, close: f64, high: f64, low: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            close,
            high,
            low,
            volume,
        }
    }

    /// Returns true if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Basic OHLCV sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }

    /// True when the timestamp sits on a bucket boundary of `timeframe`.
    pub fn is_aligned_to(&self, timeframe: Timeframe) -> bool {
        self.timestamp.rem_euclid(timeframe.as_millis()) == 0
    }
}

/// Identity of one candle stream: (exchange, symbol, timeframe).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    pub exchange: String,
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl StreamKey {
    pub fn new(exchange: &str, symbol: &str, timeframe: Timeframe) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            timeframe,
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.exchange, self.symbol, self.timeframe)
    }
}

/// Render a millisecond timestamp as `YYYY-MM-DD HH:MM` (UTC).
///
/// Out-of-range values fall back to the raw number.
pub fn format_timestamp(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => ms.to_string(),
    }
}
