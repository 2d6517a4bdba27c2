//! Continuity checks for a 1-minute candle stream.
//!
//! A well-formed stream steps by exactly one minute. Anything else is
//! reported as a [`Gap`]; callers decide whether to warn or reject.

use crate::domain::{Candle, MINUTE_MS};

/// A break in 1-minute continuity between two adjacent candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// Index of the later candle of the pair.
    pub index: usize,
    pub previous: i64,
    pub current: i64,
}

impl Gap {
    /// Number of whole minutes missing between the pair. Zero for duplicates
    /// and reversals.
    pub fn missing_minutes(&self) -> i64 {
        ((self.current - self.previous) / MINUTE_MS - 1).max(0)
    }

    pub fn is_duplicate(&self) -> bool {
        self.current == self.previous
    }

    pub fn is_reversal(&self) -> bool {
        self.current < self.previous
    }
}

/// Every adjacent pair whose step is not exactly one minute.
pub fn detect_gaps(candles: &[Candle]) -> Vec<Gap> {
    candles
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[1].timestamp - pair[0].timestamp != MINUTE_MS)
        .map(|(i, pair)| Gap {
            index: i + 1,
            previous: pair[0].timestamp,
            current: pair[1].timestamp,
        })
        .collect()
}
