//! Backfill Runner: warmup provisioning on top of `backfill-core`.
//!
//! This crate provides:
//! - TOML configuration for timeframes, warmup size and cache policy
//! - Warmup loading with cache/store fallback and insufficiency diagnosis
//! - Injection of the warmup and its derived candles into a runtime store
//! - A JSON file cache and a Parquet-backed candle history

pub mod cache;
pub mod config;
pub mod data_loader;
pub mod inject;
pub mod parquet_history;

pub use cache::{JsonFileCache, DEFAULT_CACHE_TTL_MS};
pub use config::{BackfillConfig, CacheWritePolicy, ConfigError};
pub use data_loader::{load_required_candles, Collaborators, LoadError, RequiredCandles};
pub use inject::{inject_required_candles, provision, InjectionSummary, Provisioned};
pub use parquet_history::ParquetHistory;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BackfillConfig>();
        assert_sync::<BackfillConfig>();
        assert_send::<CacheWritePolicy>();
        assert_sync::<CacheWritePolicy>();
    }

    #[test]
    fn load_outputs_are_send_sync() {
        assert_send::<RequiredCandles>();
        assert_sync::<RequiredCandles>();
        assert_send::<Provisioned>();
        assert_sync::<Provisioned>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
    }

    #[test]
    fn persistent_backends_are_send_sync() {
        assert_send::<JsonFileCache>();
        assert_sync::<JsonFileCache>();
        assert_send::<ParquetHistory>();
        assert_sync::<ParquetHistory>();
    }
}
