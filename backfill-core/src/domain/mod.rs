//! Domain types for candle provisioning

pub mod candle;
pub mod timeframe;

pub use candle::{format_timestamp, Candle, StreamKey};
pub use timeframe::{Timeframe, TimeframeError, TimeframeSet, DAY_MS, MINUTE_MS};
