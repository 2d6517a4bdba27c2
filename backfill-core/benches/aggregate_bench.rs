//! Criterion benchmarks for warmup hot paths.
//!
//! Benchmarks:
//! 1. Aggregation of a full 210-hour warmup into the common timeframes
//! 2. Window resolution
//! 3. Gap detection and dataset hashing over the same warmup

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use backfill_core::aggregate::aggregate;
use backfill_core::data::detect_gaps;
use backfill_core::domain::{Candle, Timeframe, TimeframeSet, MINUTE_MS};
use backfill_core::fingerprint::dataset_hash;
use backfill_core::window::RangeResolver;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_minutes(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.01).sin() * 10.0;
            let open = close - 0.3;
            Candle::new(i as i64 * MINUTE_MS, open, close, close + 1.5, close - 1.5, 1_000.0)
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_aggregate(c: &mut Criterion) {
    let timeframes = [
        Timeframe::Minute1,
        Timeframe::Minute5,
        Timeframe::Minute15,
        Timeframe::Hour1,
        Timeframe::Hour4,
    ];
    let mut group = c.benchmark_group("aggregate");
    for days in [1usize, 9, 30] {
        let minutes = make_minutes(days * 1440);
        group.bench_with_input(BenchmarkId::from_parameter(days), &minutes, |b, m| {
            b.iter(|| aggregate(black_box(m), black_box(&timeframes)))
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let resolver =
        RangeResolver::new(&TimeframeSet::new([Timeframe::Minute1, Timeframe::Hour1]).unwrap());
    c.bench_function("resolve_window", |b| {
        b.iter(|| {
            resolver.resolve(
                black_box("2021-01-10"),
                black_box("2021-02-10"),
                1_700_000_000_000,
            )
        })
    });
}

fn bench_integrity(c: &mut Criterion) {
    let minutes = make_minutes(9 * 1440);
    c.bench_function("detect_gaps_9d", |b| b.iter(|| detect_gaps(black_box(&minutes))));
    c.bench_function("dataset_hash_9d", |b| b.iter(|| dataset_hash(black_box(&minutes))));
}

criterion_group!(benches, bench_aggregate, bench_resolve, bench_integrity);
criterion_main!(benches);
