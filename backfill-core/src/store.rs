//! Runtime candle store handle.
//!
//! The runtime store is what the simulation engine reads from. Appends carry
//! flags telling the store whether to fire its own side effects: running the
//! strategy on the new candle (execution) and deriving coarser candles from it
//! (generation). Warmup injection turns both off.

use crate::domain::{Candle, StreamKey, Timeframe};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Side effects an append may trigger in the runtime store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendFlags {
    pub trigger_execution: bool,
    pub trigger_generation: bool,
}

impl AppendFlags {
    /// Historical backfill: no execution, no re-generation.
    pub const BACKFILL: AppendFlags = AppendFlags {
        trigger_execution: false,
        trigger_generation: false,
    };

    /// Live candle: the store does everything.
    pub const LIVE: AppendFlags = AppendFlags {
        trigger_execution: true,
        trigger_generation: true,
    };
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("candle at {timestamp} does not follow {last} in stream {stream}")]
    OutOfOrder {
        stream: StreamKey,
        last: i64,
        timestamp: i64,
    },

    #[error("runtime store unavailable: {0}")]
    Unavailable(String),
}

/// Append access to the runtime candle store.
///
/// Implementations must tolerate concurrent callers on distinct streams.
pub trait CandleStore: Send + Sync {
    fn batch_append(
        &self,
        candles: &[Candle],
        exchange: &str,
        symbol: &str,
        timeframe: Timeframe,
        flags: AppendFlags,
    ) -> Result<(), StoreError>;

    fn append(
        &self,
        candle: &Candle,
        exchange: &str,
        symbol: &str,
        timeframe: Timeframe,
        flags: AppendFlags,
    ) -> Result<(), StoreError>;
}

/// One append call as observed by [`MemoryCandleStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct AppendRecord {
    pub stream: StreamKey,
    pub count: usize,
    pub batched: bool,
    pub flags: AppendFlags,
}

/// In-memory runtime store: one ascending vector per stream.
///
/// Rejects any candle whose timestamp does not strictly exceed the stream's
/// last timestamp; a rejected batch leaves the stream untouched.
#[derive(Debug, Default)]
pub struct MemoryCandleStore {
    streams: RwLock<HashMap<StreamKey, Vec<Candle>>>,
    log: RwLock<Vec<AppendRecord>>,
}

impl MemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one stream.
    pub fn candles(&self, exchange: &str, symbol: &str, timeframe: Timeframe) -> Vec<Candle> {
        let key = StreamKey::new(exchange, symbol, timeframe);
        self.streams
            .read()
            .ok()
            .and_then(|streams| streams.get(&key).cloned())
            .unwrap_or_default()
    }

    /// Every append call so far, in order.
    pub fn appends(&self) -> Vec<AppendRecord> {
        self.log.read().map(|log| log.clone()).unwrap_or_default()
    }

    /// True when nothing has been written for (exchange, symbol) in any timeframe.
    pub fn is_untouched(&self, exchange: &str, symbol: &str) -> bool {
        self.streams
            .read()
            .map(|streams| {
                !streams
                    .keys()
                    .any(|k| k.exchange == exchange && k.symbol == symbol)
            })
            .unwrap_or(true)
    }

    fn write(
        &self,
        candles: &[Candle],
        stream: StreamKey,
        batched: bool,
        flags: AppendFlags,
    ) -> Result<(), StoreError> {
        let mut streams = self
            .streams
            .write()
            .map_err(|_| StoreError::Unavailable("stream lock poisoned".into()))?;

        let mut last = streams
            .get(&stream)
            .and_then(|s| s.last())
            .map(|c| c.timestamp);
        for candle in candles {
            if let Some(prev) = last {
                if candle.timestamp <= prev {
                    return Err(StoreError::OutOfOrder {
                        stream,
                        last: prev,
                        timestamp: candle.timestamp,
                    });
                }
            }
            last = Some(candle.timestamp);
        }

        streams
            .entry(stream.clone())
            .or_default()
            .extend_from_slice(candles);

        let mut log = self
            .log
            .write()
            .map_err(|_| StoreError::Unavailable("log lock poisoned".into()))?;
        log.push(AppendRecord {
            stream,
            count: candles.len(),
            batched,
            flags,
        });
        Ok(())
    }
}

impl CandleStore for MemoryCandleStore {
    fn batch_append(
        &self,
        candles: &[Candle],
        exchange: &str,
        symbol: &str,
        timeframe: Timeframe,
        flags: AppendFlags,
    ) -> Result<(), StoreError> {
        self.write(
            candles,
            StreamKey::new(exchange, symbol, timeframe),
            true,
            flags,
        )
    }

    fn append(
        &self,
        candle: &Candle,
        exchange: &str,
        symbol: &str,
        timeframe: Timeframe,
        flags: AppendFlags,
    ) -> Result<(), StoreError> {
        self.write(
            std::slice::from_ref(candle),
            StreamKey::new(exchange, symbol, timeframe),
            false,
            flags,
        )
    }
}
