//! Warmup sufficiency diagnosis.
//!
//! Decides whether the rows fetched for a [`TimeWindow`] cover the whole
//! warmup. When they do not, boundary queries against the history store
//! separate three situations callers handle differently:
//!
//! - nothing was ever imported for the symbol,
//! - the symbol was listed too recently to have a full warmup yet,
//! - history exists, but the requested start predates what can be warmed up.

use crate::data::{DataError, HistoryReader};
use crate::domain::DAY_MS;
use crate::window::TimeWindow;
use serde::{Deserialize, Serialize};

/// Verdict for one fetched warmup window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityReport {
    Sufficient,
    NoHistory,
    InsufficientRecentListing {
        first_available: i64,
        first_backtestable: i64,
    },
    InsufficientHistoricalRange {
        first_available: i64,
        /// Absent only if the store lost its last row between the two boundary queries.
        last_available: Option<i64>,
        first_backtestable: i64,
    },
}

impl AvailabilityReport {
    pub fn is_sufficient(&self) -> bool {
        matches!(self, AvailabilityReport::Sufficient)
    }
}

/// Earliest instant a backtest can start given the first stored candle: one
/// full warmup span plus a day of slack.
pub fn first_backtestable_timestamp(first_available: i64, window: &TimeWindow) -> i64 {
    first_available + window.span_ms() + DAY_MS
}

/// Classify `row_count` fetched rows for `window`.
///
/// Boundary queries are only issued when the count falls short.
pub fn classify(
    row_count: usize,
    window: &TimeWindow,
    history: &dyn HistoryReader,
    exchange: &str,
    symbol: &str,
    now_ms: i64,
) -> Result<AvailabilityReport, DataError> {
    if row_count >= window.expected_rows() {
        return Ok(AvailabilityReport::Sufficient);
    }

    let Some(first) = history.first_candle(exchange, symbol)? else {
        return Ok(AvailabilityReport::NoHistory);
    };

    let first_backtestable = first_backtestable_timestamp(first.timestamp, window);
    if first_backtestable > now_ms {
        return Ok(AvailabilityReport::InsufficientRecentListing {
            first_available: first.timestamp,
            first_backtestable,
        });
    }

    let last = history.last_candle(exchange, symbol)?;
    Ok(AvailabilityReport::InsufficientHistoricalRange {
        first_available: first.timestamp,
        last_available: last.map(|c| c.timestamp),
        first_backtestable,
    })
}
