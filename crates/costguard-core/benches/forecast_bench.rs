//! Benchmarks for series building and trend fitting.
//!
//! Series are small in practice (tens of days); the larger sizes check that
//! fitting stays linear.

use chrono::{Days, NaiveDate, Utc};
use costguard_core::analytics::{CostObservation, CostSeriesBuilder, Forecaster};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// Noisy upward trend with some zero-cost days and duplicated dates.
fn observations(days: u64) -> Vec<CostObservation> {
    let Some(start) = NaiveDate::from_ymd_opt(2024, 1, 1) else {
        return Vec::new();
    };
    (0..days)
        .filter_map(|i| {
            let date = start.checked_add_days(Days::new(i % (days - days / 10).max(1)))?;
            let cost = if i % 7 == 0 {
                0.0
            } else {
                (i as f64).mul_add(0.5, 20.0) + ((i * 37) % 11) as f64
            };
            Some(CostObservation::new(date, cost))
        })
        .collect()
}

fn bench_build_series(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_series");
    let builder = CostSeriesBuilder::new();

    for days in [60_u64, 365, 3650] {
        let input = observations(days);
        group.bench_with_input(BenchmarkId::from_parameter(days), &input, |b, input| {
            b.iter(|| builder.build(black_box(input)));
        });
    }
    group.finish();
}

fn bench_fit_and_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_and_predict");
    let forecaster = Forecaster::new();
    let now = Utc::now();

    for days in [60_u64, 365, 3650] {
        let Ok(series) = CostSeriesBuilder::new().build(&observations(days)) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::from_parameter(days), &series, |b, series| {
            b.iter(|| forecaster.fit_and_predict_at(black_box(series), now));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build_series, bench_fit_and_predict);
criterion_main!(benches);
