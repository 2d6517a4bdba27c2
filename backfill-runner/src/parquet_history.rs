//! Parquet-backed candle history with Hive-style partitioning.
//!
//! Layout: `{root}/exchange={EXCHANGE}/symbol={SYMBOL}/{year}.parquet`
//!
//! - Reads validate every partition against the candle schema contract and
//!   return rows ascending by timestamp
//! - `import` merges new rows into existing partitions (new rows win on
//!   equal timestamps) and writes atomically (.tmp then rename)
//! - `/` in a symbol is stored as `-` in the directory name

use backfill_core::data::{validate_schema, DataError, HistoryReader, SchemaType};
use backfill_core::domain::{format_timestamp, Candle, Timeframe};
use chrono::{DateTime, Datelike, Utc};
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ParquetHistory {
    root: PathBuf,
}

impl ParquetHistory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one exchange/symbol: `{root}/exchange={EX}/symbol={SYM}/`
    fn symbol_dir(&self, exchange: &str, symbol: &str) -> PathBuf {
        self.root
            .join(format!("exchange={}", exchange.replace('/', "-")))
            .join(format!("symbol={}", symbol.replace('/', "-")))
    }

    fn year_path(&self, exchange: &str, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir(exchange, symbol)
            .join(format!("{year}.parquet"))
    }

    /// Partition years on disk for one exchange/symbol, ascending.
    fn years(&self, exchange: &str, symbol: &str) -> Result<Vec<i32>, DataError> {
        let dir = self.symbol_dir(exchange, symbol);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries =
            fs::read_dir(&dir).map_err(|e| DataError::StoreUnavailable(format!("read dir: {e}")))?;
        let mut years = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| DataError::StoreUnavailable(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            if let Some(year) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i32>().ok())
            {
                years.push(year);
            }
        }
        years.sort_unstable();
        Ok(years)
    }

    fn read_year(&self, exchange: &str, symbol: &str, year: i32) -> Result<Vec<Candle>, DataError> {
        let mut candles = load_and_validate_parquet(&self.year_path(exchange, symbol, year))?;
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    /// Merge `candles` into the store for one exchange/symbol.
    ///
    /// Returns the number of rows now stored across the touched partitions.
    ///
    /// Rows must be minute-aligned and pass the OHLCV sanity check; one bad
    /// row rejects the whole import.
    pub fn import(
        &self,
        exchange: &str,
        symbol: &str,
        candles: &[Candle],
    ) -> Result<usize, DataError> {
        if candles.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = candles
            .iter()
            .find(|c| !c.is_sane() || !c.is_aligned_to(Timeframe::Minute1))
        {
            return Err(DataError::ValidationError(format!(
                "rejected candle at {}: {bad:?}",
                format_timestamp(bad.timestamp)
            )));
        }

        let dir = self.symbol_dir(exchange, symbol);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::StoreUnavailable(format!("failed to create dir: {e}")))?;

        let mut by_year: HashMap<i32, Vec<Candle>> = HashMap::new();
        for candle in candles {
            by_year
                .entry(year_of(candle.timestamp)?)
                .or_default()
                .push(*candle);
        }

        let mut written = 0;
        for (year, incoming) in by_year {
            let path = self.year_path(exchange, symbol, year);
            let mut merged: BTreeMap<i64, Candle> = BTreeMap::new();
            if path.exists() {
                for c in load_and_validate_parquet(&path)? {
                    merged.insert(c.timestamp, c);
                }
            }
            for c in incoming {
                merged.insert(c.timestamp, c);
            }

            let rows: Vec<Candle> = merged.into_values().collect();
            let mut df = candles_to_dataframe(&rows)?;
            let tmp_path = path.with_extension("parquet.tmp");
            write_parquet(&mut df, &tmp_path)?;
            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::StoreUnavailable(format!("atomic rename failed: {e}"))
            })?;
            written += rows.len();
        }

        Ok(written)
    }
}

impl HistoryReader for ParquetHistory {
    fn range_query(
        &self,
        exchange: &str,
        symbol: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Candle>, DataError> {
        if start > end {
            return Ok(Vec::new());
        }
        let (first_year, last_year) = (year_of(start)?, year_of(end)?);

        let mut out = Vec::new();
        for year in self.years(exchange, symbol)? {
            if year < first_year || year > last_year {
                continue;
            }
            out.extend(
                self.read_year(exchange, symbol, year)?
                    .into_iter()
                    .filter(|c| c.timestamp >= start && c.timestamp <= end),
            );
        }
        Ok(out)
    }

    fn first_candle(&self, exchange: &str, symbol: &str) -> Result<Option<Candle>, DataError> {
        for year in self.years(exchange, symbol)? {
            if let Some(first) = self.read_year(exchange, symbol, year)?.first() {
                return Ok(Some(*first));
            }
        }
        Ok(None)
    }

    fn last_candle(&self, exchange: &str, symbol: &str) -> Result<Option<Candle>, DataError> {
        for year in self.years(exchange, symbol)?.into_iter().rev() {
            if let Some(last) = self.read_year(exchange, symbol, year)?.last() {
                return Ok(Some(*last));
            }
        }
        Ok(None)
    }
}

fn year_of(ms: i64) -> Result<i32, DataError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.year())
        .ok_or_else(|| DataError::ValidationError(format!("timestamp out of range: {ms}")))
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// Convert candles to a DataFrame in the schema's fixed column order.
fn candles_to_dataframe(candles: &[Candle]) -> Result<DataFrame, DataError> {
    let timestamps: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
    let opens: Vec<f64> = candles.iter().map(|c| c.open).collect();
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    DataFrame::new(vec![
        Column::new("timestamp".into(), timestamps),
        Column::new("open".into(), opens),
        Column::new("close".into(), closes),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

/// Load a Parquet partition and validate it against the candle schema.
fn load_and_validate_parquet(path: &Path) -> Result<Vec<Candle>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let dtype = match column.dtype() {
            DataType::Int64 => SchemaType::Int64,
            DataType::Float64 => SchemaType::Float64,
            other => {
                return Err(DataError::ValidationError(format!(
                    "column '{}' has unsupported type {other}",
                    column.name()
                )))
            }
        };
        columns.push((column.name().as_str(), dtype));
    }
    let validation = validate_schema(&columns);
    if !validation.is_valid {
        return Err(DataError::ValidationError(validation.errors.join("; ")));
    }

    dataframe_to_candles(&df)
}

fn dataframe_to_candles(df: &DataFrame) -> Result<Vec<Candle>, DataError> {
    let map_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));

    let ts_ca = df.column("timestamp").map_err(map_err)?.i64().map_err(map_err)?;
    let open_ca = df.column("open").map_err(map_err)?.f64().map_err(map_err)?;
    let close_ca = df.column("close").map_err(map_err)?.f64().map_err(map_err)?;
    let high_ca = df.column("high").map_err(map_err)?.f64().map_err(map_err)?;
    let low_ca = df.column("low").map_err(map_err)?.f64().map_err(map_err)?;
    let vol_ca = df.column("volume").map_err(map_err)?.f64().map_err(map_err)?;

    let n = df.height();
    let mut candles = Vec::with_capacity(n);
    for i in 0..n {
        let timestamp = ts_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null timestamp at row {i}")))?;
        let candle = Candle {
            timestamp,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(f64::NAN),
        };
        if candle.is_void() {
            return Err(DataError::ValidationError(format!(
                "null or NaN value at row {i} ({})",
                format_timestamp(timestamp)
            )));
        }
        candles.push(candle);
    }

    Ok(candles)
}
