//! Benchmarks for the sliding-window rate counter
//!
//! Every inbound frame increments two counters per session plus two pool
//! counters, so `incr` sits on the read path.

use chat_idle::core::RateCounter;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, Instant};

fn bench_incr(c: &mut Criterion) {
    let counter = RateCounter::per_minute();

    c.bench_function("rate_counter/incr", |b| {
        b.iter(|| counter.incr(black_box(1)))
    });
}

fn bench_rate(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_counter/rate");

    for events in [100u64, 1_000, 10_000] {
        let counter = RateCounter::new(Duration::from_secs(3600));
        let start = Instant::now()
            .checked_sub(Duration::from_secs(1))
            .unwrap_or_else(Instant::now);
        for i in 0..events {
            counter.incr_at(1, start + Duration::from_micros(i));
        }

        group.bench_with_input(BenchmarkId::from_parameter(events), &counter, |b, counter| {
            b.iter(|| black_box(counter.rate()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_incr, bench_rate);
criterion_main!(benches);
