//! Hierarchical timer wheel benchmarks: registration throughput across
//! wheel levels and the fixed-now collection hot path.
//!
//! Run:
//!   cargo bench --bench timer_bench

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use asupersync_kernel::timer::TimerWheel;
use asupersync_kernel::types::Time;

fn bench_register(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer/register");
    // Deltas chosen to land in each of the four wheel levels (1ms, 256ms,
    // 65.536s, 4.66h resolution) plus the overflow heap.
    for &(label, delta_ms) in &[("level0", 10u64), ("level1", 5_000), ("level2", 200_000), ("overflow", 30 * 24 * 60 * 60 * 1000)] {
        let count = 1_000u64;
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::new("insert", label), &delta_ms, |b, &delta_ms| {
            b.iter_batched(
                || TimerWheel::<u32>::with_config(2048, u64::MAX, 7 * 24 * 60 * 60 * 1000, 1, 0),
                |mut wheel| {
                    let now = Time::ZERO;
                    for i in 0..count as u32 {
                        let deadline = Time::from_millis(delta_ms + u64::from(i));
                        wheel.register(now, deadline, i).unwrap();
                    }
                    black_box(wheel.len())
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_collect_expired(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer/collect_expired");
    for &count in &[100u32, 1_000, 10_000] {
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::new("fire_all", count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut wheel = TimerWheel::<u32>::with_capacity(count as u16 + 16);
                    let now = Time::ZERO;
                    for i in 0..count {
                        wheel.register(now, Time::from_millis(u64::from(i % 500)), i).unwrap();
                    }
                    wheel
                },
                |mut wheel| black_box(wheel.collect_expired(Time::from_millis(1_000)).len()),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_register, bench_collect_expired);
criterion_main!(benches);
