//! Criterion benchmarks for BandLab hot paths.
//!
//! Benchmarks:
//! 1. ARIMA grid search (18 candidates, parallel vs. sequential)
//! 2. Single ARIMA fits by order
//! 3. Indicator series (SMA, RSI, ATR)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bandlab_core::domain::Bar;
use bandlab_core::forecast::{
    find_best_arima, perform_arima_forecast, ArimaModel, ArimaOrder, ArimaSearchConfig,
    SearchGrid,
};
use bandlab_core::indicators::{Atr, Indicator, Rsi, Sma};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.1).sin() * 10.0 + ((i * 37) % 17) as f64 * 0.2)
        .collect()
}

fn make_bars(n: usize) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    make_closes(n)
        .into_iter()
        .enumerate()
        .map(|(i, close)| Bar {
            symbol: "BENCH".into(),
            date: base_date + chrono::Duration::days(i as i64),
            open: close - 0.3,
            high: close + 1.5,
            low: close - 1.5,
            close,
            volume: 1_000_000,
            adj_close: close,
        })
        .collect()
}

// ── 1. ARIMA Grid Search ─────────────────────────────────────────────

fn bench_arima_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("arima_search");
    let grid = SearchGrid::default();

    for &window in &[90, 250] {
        let closes = make_closes(window);
        group.bench_with_input(BenchmarkId::new("parallel", window), &window, |b, _| {
            b.iter(|| find_best_arima(black_box(&closes), &grid, true))
        });
        group.bench_with_input(BenchmarkId::new("sequential", window), &window, |b, _| {
            b.iter(|| find_best_arima(black_box(&closes), &grid, false))
        });
    }

    let closes = make_closes(90);
    let config = ArimaSearchConfig::default();
    group.bench_function("forecast_4_steps_90", |b| {
        b.iter(|| perform_arima_forecast(black_box(&closes), &config))
    });

    group.finish();
}

// ── 2. Single Fits ───────────────────────────────────────────────────

fn bench_arima_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("arima_fit");
    let closes = make_closes(90);

    for order in [
        ArimaOrder::new(1, 0, 0),
        ArimaOrder::new(2, 1, 0),
        ArimaOrder::new(2, 1, 2),
    ] {
        group.bench_function(order.to_string(), |b| {
            b.iter(|| ArimaModel::fit(black_box(&closes), order))
        });
    }

    group.finish();
}

// ── 3. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");

    for &bar_count in &[252, 2520] {
        let bars = make_bars(bar_count);
        let stack: Vec<Box<dyn Indicator>> = vec![
            Box::new(Sma::new(14)),
            Box::new(Rsi::new(14)),
            Box::new(Atr::new(14)),
        ];
        group.bench_with_input(
            BenchmarkId::new("sma_rsi_atr", bar_count),
            &bar_count,
            |b, _| {
                b.iter(|| {
                    stack
                        .iter()
                        .map(|ind| ind.compute(black_box(&bars)))
                        .collect::<Vec<_>>()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_arima_search, bench_arima_fit, bench_indicators);
criterion_main!(benches);
