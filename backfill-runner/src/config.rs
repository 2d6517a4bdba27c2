//! Serializable provisioning configuration.
//!
//! Stored as TOML:
//!
//! ```toml
//! timeframes = ["1m", "5m", "1h"]
//! max_timeframe = "1h"   # optional, defaults to the longest
//! warmup_bars = 210
//! cache_write = "always" # or "when_sufficient"
//! ```

use backfill_core::domain::{Timeframe, TimeframeError, TimeframeSet};
use backfill_core::window::{RangeResolver, DEFAULT_WARMUP_BARS, MAX_WARMUP_BARS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid timeframes: {0}")]
    Timeframes(#[from] TimeframeError),

    #[error("warmup_bars must be between 1 and {max}, got {0}", max = MAX_WARMUP_BARS)]
    WarmupBars(i64),
}

/// When a freshly fetched warmup is written back to the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWritePolicy {
    /// Write every fetch before sufficiency is checked, so a retry after an
    /// import does not hit the store for the rows it already read.
    #[default]
    Always,
    /// Only write fetches that turned out to be sufficient.
    WhenSufficient,
}

/// Configuration for one provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackfillConfig {
    /// Considered timeframes, in the order derived candles are injected.
    pub timeframes: Vec<Timeframe>,

    /// Timeframe that sizes the warmup. Defaults to the longest considered one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeframe: Option<Timeframe>,

    /// Candles of the max timeframe required before the start date.
    #[serde(default = "default_warmup_bars")]
    pub warmup_bars: i64,

    #[serde(default)]
    pub cache_write: CacheWritePolicy,
}

fn default_warmup_bars() -> i64 {
    DEFAULT_WARMUP_BARS
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            timeframes: vec![Timeframe::Minute1, Timeframe::Minute5, Timeframe::Hour1],
            max_timeframe: None,
            warmup_bars: DEFAULT_WARMUP_BARS,
            cache_write: CacheWritePolicy::Always,
        }
    }
}

impl BackfillConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BackfillConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_WARMUP_BARS).contains(&self.warmup_bars) {
            return Err(ConfigError::WarmupBars(self.warmup_bars));
        }
        self.timeframe_set()?;
        Ok(())
    }

    /// The considered timeframes with their designated max.
    pub fn timeframe_set(&self) -> Result<TimeframeSet, ConfigError> {
        let set = TimeframeSet::new(self.timeframes.iter().copied())?;
        Ok(match self.max_timeframe {
            Some(max) => set.with_max(max)?,
            None => set,
        })
    }

    pub fn range_resolver(&self) -> Result<RangeResolver, ConfigError> {
        Ok(RangeResolver::new(&self.timeframe_set()?).with_warmup_bars(self.warmup_bars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml_with_defaults() {
        let config = BackfillConfig::from_toml_str(r#"timeframes = ["1m", "15m", "4h"]"#).unwrap();
        assert_eq!(config.warmup_bars, 210);
        assert_eq!(config.cache_write, CacheWritePolicy::Always);
        assert_eq!(config.timeframe_set().unwrap().max(), Timeframe::Hour4);
    }

    #[test]
    fn explicit_max_and_policy() {
        let config = BackfillConfig::from_toml_str(
            r#"
            timeframes = ["1m", "1h", "1D"]
            max_timeframe = "1h"
            warmup_bars = 50
            cache_write = "when_sufficient"
            "#,
        )
        .unwrap();
        assert_eq!(config.timeframe_set().unwrap().max(), Timeframe::Hour1);
        assert_eq!(config.range_resolver().unwrap().initial_lookback(), 50 * 60);
        assert_eq!(config.cache_write, CacheWritePolicy::WhenSufficient);
    }

    #[test]
    fn unknown_timeframe_fails_to_parse() {
        let err = BackfillConfig::from_toml_str(r#"timeframes = ["1m", "7m"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn max_outside_set_is_rejected() {
        let err = BackfillConfig::from_toml_str(
            r#"
            timeframes = ["1m", "5m"]
            max_timeframe = "1h"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Timeframes(TimeframeError::MaxNotConsidered(Timeframe::Hour1))
        ));
    }

    #[test]
    fn empty_timeframes_rejected() {
        let err = BackfillConfig::from_toml_str("timeframes = []").unwrap_err();
        assert!(matches!(err, ConfigError::Timeframes(TimeframeError::Empty)));
    }

    #[test]
    fn zero_warmup_rejected() {
        let err = BackfillConfig::from_toml_str(
            r#"
            timeframes = ["1m"]
            warmup_bars = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::WarmupBars(0)));
    }

    #[test]
    fn oversized_warmup_rejected() {
        let err = BackfillConfig::from_toml_str(
            r#"
            timeframes = ["1m", "1h"]
            warmup_bars = 1000000000000
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::WarmupBars(1_000_000_000_000)));
        assert!(err.to_string().contains("between 1 and 10000"));
    }

    #[test]
    fn toml_roundtrip() {
        let config = BackfillConfig::default();
        let text = config.to_toml().unwrap();
        let back = BackfillConfig::from_toml_str(&text).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backfill.toml");
        std::fs::write(&path, "timeframes = [\"1m\", \"3m\"]\n").unwrap();
        let config = BackfillConfig::from_file(&path).unwrap();
        assert_eq!(config.timeframes, vec![Timeframe::Minute1, Timeframe::Minute3]);
    }
}
