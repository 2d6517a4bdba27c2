//! Warmup cache backed by JSON files.
//!
//! One file per cache key, named by the BLAKE3 hash of the key so that
//! symbols containing `/` or other path characters are safe. Entries carry
//! their write time and are served for at most the configured TTL; an
//! expired entry is a miss and is overwritten by the next fetch.

use backfill_core::clock::{Clock, SystemClock};
use backfill_core::data::{CacheKey, CandleCache, DataError};
use backfill_core::domain::{Candle, MINUTE_MS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How long a cached warmup is served before the store is asked again.
pub const DEFAULT_CACHE_TTL_MS: i64 = 5 * MINUTE_MS;

/// On-disk entry: the key is stored alongside the rows so hash collisions
/// are detected instead of served.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    key: CacheKey,
    #[serde(default)]
    written_at: i64,
    candles: Vec<Candle>,
}

#[derive(Clone)]
pub struct JsonFileCache {
    cache_dir: PathBuf,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for JsonFileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFileCache")
            .field("cache_dir", &self.cache_dir)
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}

impl JsonFileCache {
    /// Creates a cache in `cache_dir`, creating the directory if needed.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self, DataError> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)
            .map_err(|e| DataError::CacheError(format!("create cache dir: {e}")))?;
        Ok(Self {
            cache_dir,
            ttl_ms: DEFAULT_CACHE_TTL_MS,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// True when an entry file exists for `key`, fresh or not.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).exists()
    }

    /// Removes one entry, if present.
    pub fn remove(&self, key: &CacheKey) -> Result<(), DataError> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| DataError::CacheError(format!("remove entry: {e}")))?;
        }
        Ok(())
    }

    /// Number of entries on disk.
    pub fn len(&self) -> Result<usize, DataError> {
        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("read cache dir: {e}")))?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.path().is_file()
                    && entry.path().extension().and_then(|s| s.to_str()) == Some("json")
            })
            .count())
    }

    pub fn is_empty(&self) -> Result<bool, DataError> {
        Ok(self.len()? == 0)
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let name = blake3::hash(key.as_str().as_bytes()).to_hex();
        self.cache_dir.join(format!("{name}.json"))
    }
}

impl CandleCache for JsonFileCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<Candle>>, DataError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .map_err(|e| DataError::CacheError(format!("read entry: {e}")))?;
        let entry: CacheEntry = serde_json::from_str(&json)
            .map_err(|e| DataError::CacheError(format!("deserialize entry: {e}")))?;

        if entry.key != *key {
            return Ok(None);
        }
        if self.clock.now_ms() - entry.written_at > self.ttl_ms {
            return Ok(None);
        }
        Ok(Some(entry.candles))
    }

    /// Writes atomically: serialize to a `.tmp` sibling, then rename into place.
    fn set(&self, key: &CacheKey, candles: &[Candle]) -> Result<(), DataError> {
        let path = self.entry_path(key);
        let tmp_path = path.with_extension("json.tmp");

        let entry = CacheEntry {
            key: key.clone(),
            written_at: self.clock.now_ms(),
            candles: candles.to_vec(),
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| DataError::CacheError(format!("serialize entry: {e}")))?;
        fs::write(&tmp_path, json)
            .map_err(|e| DataError::CacheError(format!("write entry: {e}")))?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backfill_core::clock::ManualClock;

    fn rows() -> Vec<Candle> {
        vec![
            Candle::new(0, 100.0, 101.0, 102.0, 99.0, 3.5),
            Candle::new(60_000, 101.0, 100.5, 101.5, 100.0, 1.25),
        ]
    }

    /// Prices with full 53-bit mantissas, from a fixed xorshift sequence.
    fn noisy_rows(n: usize) -> Vec<Candle> {
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        (0..n)
            .map(|i| {
                let open = 1_000.0 * next();
                let close = 1_000.0 * next();
                let high = open.max(close) + next();
                let low = open.min(close) - next();
                Candle::new(i as i64 * MINUTE_MS, open, close, high, low, 1e6 * next())
            })
            .collect()
    }

    #[test]
    fn set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path()).unwrap();
        let key = CacheKey::new(0, 60_000, "Binance", "BTC/USDT");

        assert!(!cache.contains(&key));
        assert!(cache.get(&key).unwrap().is_none());

        cache.set(&key, &rows()).unwrap();

        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key).unwrap().unwrap(), rows());
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn floats_come_back_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path()).unwrap();
        let key = CacheKey::new(0, 20_000 * MINUTE_MS, "X", "Y");
        let rows = noisy_rows(20_000);

        cache.set(&key, &rows).unwrap();
        let back = cache.get(&key).unwrap().unwrap();

        let mismatched = rows
            .iter()
            .zip(&back)
            .filter(|(a, b)| {
                a.timestamp != b.timestamp
                    || a.open.to_bits() != b.open.to_bits()
                    || a.close.to_bits() != b.close.to_bits()
                    || a.high.to_bits() != b.high.to_bits()
                    || a.low.to_bits() != b.low.to_bits()
                    || a.volume.to_bits() != b.volume.to_bits()
            })
            .count();
        assert_eq!(back.len(), rows.len());
        assert_eq!(mismatched, 0);
        assert_eq!(
            backfill_core::fingerprint::dataset_hash(&rows),
            backfill_core::fingerprint::dataset_hash(&back)
        );
    }

    #[test]
    fn entries_expire_after_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = JsonFileCache::new(dir.path())
            .unwrap()
            .with_clock(clock.clone());
        let key = CacheKey::new(0, 60_000, "X", "Y");

        cache.set(&key, &rows()).unwrap();
        clock.advance(DEFAULT_CACHE_TTL_MS);
        assert_eq!(cache.get(&key).unwrap().unwrap(), rows());

        clock.advance(1);
        assert!(cache.get(&key).unwrap().is_none());
        assert!(cache.contains(&key));

        cache.set(&key, &rows()[..1]).unwrap();
        assert_eq!(cache.get(&key).unwrap().unwrap().len(), 1);
    }

    #[test]
    fn overwrite_replaces_rows() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path()).unwrap();
        let key = CacheKey::new(0, 60_000, "X", "Y");

        cache.set(&key, &rows()).unwrap();
        cache.set(&key, &rows()[..1]).unwrap();

        assert_eq!(cache.get(&key).unwrap().unwrap().len(), 1);
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn remove_deletes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path()).unwrap();
        let key = CacheKey::new(0, 60_000, "X", "Y");

        cache.set(&key, &rows()).unwrap();
        cache.remove(&key).unwrap();

        assert!(cache.is_empty().unwrap());
        assert!(cache.get(&key).unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path()).unwrap();
        let key = CacheKey::new(0, 60_000, "X", "Y");

        fs::write(cache.entry_path(&key), "not json").unwrap();

        assert!(matches!(cache.get(&key), Err(DataError::CacheError(_))));
    }
}
