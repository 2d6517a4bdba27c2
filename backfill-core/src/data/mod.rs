//! Candle data access: collaborator traits, in-memory implementations, integrity checks

pub mod gaps;
pub mod memory;
pub mod provider;
pub mod schema;

pub use gaps::{detect_gaps, Gap};
pub use memory::{MemoryCache, MemoryHistory};
pub use provider::{CacheKey, CandleCache, DataError, DataSource, HistoryReader};
pub use schema::{validate_schema, SchemaType, CANDLE_SCHEMA};
