//! Candle column contract for the persistent store.
//!
//! Defines the exact column names, order and types every persisted candle
//! partition must carry. Used for validation when loading data.

use serde::{Deserialize, Serialize};

/// Data types allowed in a candle partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaType {
    Int64,
    Float64,
}

/// A single column in the candle schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: &'static str,
    pub dtype: SchemaType,
}

/// The canonical candle schema, in fixed column order.
///
/// - Columns: timestamp, open, close, high, low, volume
/// - `timestamp` is a UTC millisecond epoch aligned to the minute
/// - Sort order: ascending by timestamp within each exchange/symbol partition
pub const CANDLE_SCHEMA: &[SchemaField] = &[
    SchemaField {
        name: "timestamp",
        dtype: SchemaType::Int64,
    },
    SchemaField {
        name: "open",
        dtype: SchemaType::Float64,
    },
    SchemaField {
        name: "close",
        dtype: SchemaType::Float64,
    },
    SchemaField {
        name: "high",
        dtype: SchemaType::Float64,
    },
    SchemaField {
        name: "low",
        dtype: SchemaType::Float64,
    },
    SchemaField {
        name: "volume",
        dtype: SchemaType::Float64,
    },
];

/// Result of schema validation.
#[derive(Debug, Clone)]
pub struct SchemaValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Validate (column_name, column_type) pairs against [`CANDLE_SCHEMA`].
pub fn validate_schema(columns: &[(&str, SchemaType)]) -> SchemaValidation {
    let mut errors = Vec::new();

    for expected in CANDLE_SCHEMA {
        match columns.iter().find(|(name, _)| *name == expected.name) {
            Some((_, dtype)) if *dtype == expected.dtype => {}
            Some((_, dtype)) => {
                errors.push(format!(
                    "column '{}': expected {:?}, got {:?}",
                    expected.name, expected.dtype, dtype
                ));
            }
            None => {
                errors.push(format!("missing required column '{}'", expected.name));
            }
        }
    }

    for (name, _) in columns {
        if !CANDLE_SCHEMA.iter().any(|f| f.name == *name) {
            errors.push(format!("unexpected column '{}' (not in schema)", name));
        }
    }

    SchemaValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}
