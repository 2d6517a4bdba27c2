//! Dataset fingerprinting: deterministic identification of candle sequences.

use crate::domain::Candle;

/// BLAKE3 hash over every field of every candle, in order.
///
/// Two sequences hash equal exactly when they are field-for-field identical,
/// so a cached load can be checked against a fresh one.
pub fn dataset_hash(candles: &[Candle]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in candles {
        hasher.update(&c.timestamp.to_le_bytes());
        hasher.update(&c.open.to_le_bytes());
        hasher.update(&c.close.to_le_bytes());
        hasher.update(&c.high.to_le_bytes());
        hasher.update(&c.low.to_le_bytes());
        hasher.update(&c.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
