//! Backfill Core: candle domain types and the pure parts of warmup provisioning.
//!
//! This crate contains:
//! - Domain types (candles, stream keys, timeframes)
//! - Collaborator traits for the history store, cache and runtime store
//! - Lookback window resolution with day-floored warmup start
//! - Three-way availability diagnosis for short warmups
//! - Exact-boundary aggregation of 1-minute candles into coarser timeframes
//! - In-memory collaborators for embedding and tests

pub mod aggregate;
pub mod availability;
pub mod clock;
pub mod data;
pub mod domain;
pub mod fingerprint;
pub mod store;
pub mod window;

pub use aggregate::{aggregate, generate_from_one_minutes, DerivedCandle};
pub use availability::{classify, AvailabilityReport};
pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use store::{AppendFlags, CandleStore, MemoryCandleStore, StoreError};
pub use window::{RangeError, RangeResolver, TimeWindow};
