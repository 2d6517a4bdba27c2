//! Timeframes: fixed whole-minute bucket durations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Milliseconds in one minute.
pub const MINUTE_MS: i64 = 60_000;

/// Milliseconds in one day.
pub const DAY_MS: i64 = 86_400_000;

/// A candle bucket duration.
///
/// Every variant is a whole number of minutes, so a coarser candle is always an
/// exact reduction of consecutive 1-minute candles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    Minute1,
    Minute3,
    Minute5,
    Minute15,
    Minute30,
    Minute45,
    Hour1,
    Hour2,
    Hour3,
    Hour4,
    Hour6,
    Hour8,
    Hour12,
    Day1,
    Day3,
    Week1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 16] = [
        Timeframe::Minute1,
        Timeframe::Minute3,
        Timeframe::Minute5,
        Timeframe::Minute15,
        Timeframe::Minute30,
        Timeframe::Minute45,
        Timeframe::Hour1,
        Timeframe::Hour2,
        Timeframe::Hour3,
        Timeframe::Hour4,
        Timeframe::Hour6,
        Timeframe::Hour8,
        Timeframe::Hour12,
        Timeframe::Day1,
        Timeframe::Day3,
        Timeframe::Week1,
    ];

    /// Number of 1-minute candles in one bucket of this timeframe.
    pub const fn minutes(self) -> i64 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute3 => 3,
            Timeframe::Minute5 => 5,
            Timeframe::Minute15 => 15,
            Timeframe::Minute30 => 30,
            Timeframe::Minute45 => 45,
            Timeframe::Hour1 => 60,
            Timeframe::Hour2 => 120,
            Timeframe::Hour3 => 180,
            Timeframe::Hour4 => 240,
            Timeframe::Hour6 => 360,
            Timeframe::Hour8 => 480,
            Timeframe::Hour12 => 720,
            Timeframe::Day1 => 1440,
            Timeframe::Day3 => 4320,
            Timeframe::Week1 => 10080,
        }
    }

    pub const fn as_millis(self) -> i64 {
        self.minutes() * MINUTE_MS
    }

    pub const fn label(self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute3 => "3m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Minute45 => "45m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour2 => "2h",
            Timeframe::Hour3 => "3h",
            Timeframe::Hour4 => "4h",
            Timeframe::Hour6 => "6h",
            Timeframe::Hour8 => "8h",
            Timeframe::Hour12 => "12h",
            Timeframe::Day1 => "1D",
            Timeframe::Day3 => "3D",
            Timeframe::Week1 => "1W",
        }
    }

    pub const fn is_one_minute(self) -> bool {
        matches!(self, Timeframe::Minute1)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeframeError {
    #[error("unknown timeframe '{0}'")]
    Unknown(String),

    #[error("timeframe set is empty")]
    Empty,

    #[error("designated max timeframe {0} is not one of the considered timeframes")]
    MaxNotConsidered(Timeframe),
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.label() == s)
            .ok_or_else(|| TimeframeError::Unknown(s.to_string()))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.label().to_string()
    }
}

/// Ordered set of considered timeframes with a designated max timeframe.
///
/// The max timeframe sizes the warmup lookback; the order is the order in
/// which derived candles are handed to the runtime store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeframeSet {
    timeframes: Vec<Timeframe>,
    max: Timeframe,
}

impl TimeframeSet {
    /// Builds a set whose max timeframe is the longest member.
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn new(timeframes: impl IntoIterator<Item = Timeframe>) -> Result<Self, TimeframeError> {
        let mut ordered: Vec<Timeframe> = Vec::new();
        for tf in timeframes {
            if !ordered.contains(&tf) {
                ordered.push(tf);
            }
        }
        let max = ordered
            .iter()
            .copied()
            .max_by_key(|tf| tf.minutes())
            .ok_or(TimeframeError::Empty)?;
        Ok(Self {
            timeframes: ordered,
            max,
        })
    }

    /// Overrides the designated max timeframe. It must be a member of the set.
    pub fn with_max(mut self, max: Timeframe) -> Result<Self, TimeframeError> {
        if !self.timeframes.contains(&max) {
            return Err(TimeframeError::MaxNotConsidered(max));
        }
        self.max = max;
        Ok(self)
    }

    pub fn max(&self) -> Timeframe {
        self.max
    }

    pub fn as_slice(&self) -> &[Timeframe] {
        &self.timeframes
    }

    pub fn iter(&self) -> impl Iterator<Item = Timeframe> + '_ {
        self.timeframes.iter().copied()
    }

    /// Timeframes that are derived from 1-minute candles (everything except `1m`).
    pub fn derived(&self) -> impl Iterator<Item = Timeframe> + '_ {
        self.iter().filter(|tf| !tf.is_one_minute())
    }
}
