//! Exact-boundary reduction of 1-minute candles into coarser timeframes.
//!
//! For a timeframe of R minutes, a coarser candle is produced at every index
//! `i` where `(i + 1) % R == 0`, from the R candles ending at `i`. A coarser
//! candle is only emitted once its whole window has been seen.
//!
//! **Trailing partial groups are dropped.** If the input length is not a
//! multiple of R, the last `len % R` minutes never become an R-minute candle.
//! Sizing the input is the caller's job (the warmup window is day-floored for
//! exactly this reason); the drop is logged at `warn` level.

use crate::domain::{Candle, Timeframe};
use std::collections::BTreeMap;
use tracing::warn;

/// A coarser candle and the timeframe it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedCandle {
    pub timeframe: Timeframe,
    pub candle: Candle,
}

/// Reduce consecutive 1-minute candles into one candle.
///
/// open = first open, close = last close, high = max, low = min,
/// volume = sum, timestamp = first timestamp. `None` for an empty slice.
pub fn generate_from_one_minutes(group: &[Candle]) -> Option<Candle> {
    let first = group.first()?;
    let last = group.last()?;
    let (high, low, volume) = group.iter().fold(
        (f64::NEG_INFINITY, f64::INFINITY, 0.0),
        |(high, low, volume), c| (high.max(c.high), low.min(c.low), volume + c.volume),
    );
    Some(Candle {
        timestamp: first.timestamp,
        open: first.open,
        close: last.close,
        high,
        low,
        volume,
    })
}

/// Derive every non-`1m` timeframe from an ascending 1-minute sequence.
///
/// Output order is by minute index, then by the order of `timeframes`, which
/// is the order a live feed would have produced them in.
pub fn aggregate(minutes: &[Candle], timeframes: &[Timeframe]) -> Vec<DerivedCandle> {
    let derived: Vec<(Timeframe, usize)> = timeframes
        .iter()
        .filter(|tf| !tf.is_one_minute())
        .map(|tf| (*tf, tf.minutes() as usize))
        .collect();

    let mut out = Vec::new();
    for i in 0..minutes.len() {
        for &(timeframe, ratio) in &derived {
            if (i + 1) % ratio != 0 {
                continue;
            }
            if let Some(candle) = generate_from_one_minutes(&minutes[i + 1 - ratio..=i]) {
                out.push(DerivedCandle { timeframe, candle });
            }
        }
    }

    for &(timeframe, ratio) in &derived {
        let dropped = minutes.len() % ratio;
        if dropped > 0 {
            warn!(
                %timeframe,
                dropped,
                input = minutes.len(),
                "trailing partial group dropped during aggregation"
            );
        }
    }

    out
}

/// Group derived candles per timeframe, preserving emission order within each.
pub fn by_timeframe(derived: &[DerivedCandle]) -> BTreeMap<Timeframe, Vec<Candle>> {
    let mut grouped: BTreeMap<Timeframe, Vec<Candle>> = BTreeMap::new();
    for d in derived {
        grouped.entry(d.timeframe).or_default().push(d.candle);
    }
    grouped
}
