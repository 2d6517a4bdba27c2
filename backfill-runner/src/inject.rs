//! Injection of a loaded warmup into the runtime candle store.
//!
//! The 1-minute candles go in as one batch; every derived candle is then
//! appended on its own, in the order a live feed would have produced it.
//! All appends are flagged as backfill so the store neither runs the strategy
//! nor re-derives coarser candles from them.

use backfill_core::aggregate::aggregate;
use backfill_core::domain::{Timeframe, TimeframeSet};
use backfill_core::store::{AppendFlags, CandleStore, StoreError};
use std::collections::BTreeMap;
use tracing::{info, instrument};

use crate::config::BackfillConfig;
use crate::data_loader::{load_required_candles, Collaborators, LoadError, RequiredCandles};

/// What one injection wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionSummary {
    /// 1-minute candles appended in bulk.
    pub base: usize,
    /// Derived candles appended per timeframe.
    pub derived: BTreeMap<Timeframe, usize>,
}

impl InjectionSummary {
    pub fn total(&self) -> usize {
        self.base + self.derived.values().sum::<usize>()
    }
}

/// Append `required` and every coarser candle derived from it to `store`.
pub fn inject_required_candles(
    store: &dyn CandleStore,
    required: &RequiredCandles,
    timeframes: &TimeframeSet,
) -> Result<InjectionSummary, StoreError> {
    let exchange = required.exchange.as_str();
    let symbol = required.symbol.as_str();

    store.batch_append(
        &required.candles,
        exchange,
        symbol,
        Timeframe::Minute1,
        AppendFlags::BACKFILL,
    )?;

    let mut summary = InjectionSummary {
        base: required.candles.len(),
        derived: BTreeMap::new(),
    };
    for derived in aggregate(&required.candles, timeframes.as_slice()) {
        store.append(
            &derived.candle,
            exchange,
            symbol,
            derived.timeframe,
            AppendFlags::BACKFILL,
        )?;
        *summary.derived.entry(derived.timeframe).or_default() += 1;
    }

    Ok(summary)
}

/// A loaded and injected warmup.
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub required: RequiredCandles,
    pub summary: InjectionSummary,
}

/// Load the warmup for one request and inject it into `store`.
///
/// The store is only touched after the warmup was found sufficient, so any
/// load error leaves it unchanged for this exchange/symbol.
#[instrument(skip(config, io, store))]
pub fn provision(
    exchange: &str,
    symbol: &str,
    start: &str,
    finish: &str,
    config: &BackfillConfig,
    io: &Collaborators<'_>,
    store: &dyn CandleStore,
) -> Result<Provisioned, LoadError> {
    let timeframes = config.timeframe_set()?;
    let required = load_required_candles(exchange, symbol, start, finish, config, io)?;
    let summary = inject_required_candles(store, &required, &timeframes)?;
    info!(
        base = summary.base,
        derived = summary.total() - summary.base,
        source = ?required.source,
        "warmup candles injected"
    );
    Ok(Provisioned { required, summary })
}
