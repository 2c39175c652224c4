//! Three-lane scheduler benchmarks: dispatch throughput under a
//! ready-dominated workload, a cancel-dominated workload, and a mixed
//! workload, plus the timed-lane admission hot path.
//!
//! Run:
//!   cargo bench --bench scheduler_bench

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use asupersync_kernel::scheduler::Scheduler;
use asupersync_kernel::types::{TaskId, Time};

fn task(id: u16) -> TaskId {
    TaskId::new_for_test(id, 0)
}

fn bench_ready_dominated(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/ready_dominated");
    for &count in &[100u32, 1_000, 5_000] {
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::new("dispatch_all", count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut sched = Scheduler::new(0);
                    for i in 0..count {
                        sched.inject_ready_priority(task(i as u16), (i % 64) as u8);
                    }
                    sched
                },
                |mut sched| {
                    let mut dispatched = 0u64;
                    while matches!(sched.dispatch_once(Time::ZERO, None), asupersync_kernel::scheduler::DispatchOutcome::Dispatched(_)) {
                        dispatched += 1;
                    }
                    black_box(dispatched)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_cancel_dominated(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/cancel_dominated");
    for &count in &[100u32, 1_000, 5_000] {
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::new("dispatch_all", count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut sched = Scheduler::new(0);
                    for i in 0..count {
                        sched.inject_cancel(task(i as u16), (i % 64) as u8);
                    }
                    sched
                },
                |mut sched| {
                    let mut dispatched = 0u64;
                    while matches!(sched.dispatch_once(Time::ZERO, None), asupersync_kernel::scheduler::DispatchOutcome::Dispatched(_)) {
                        dispatched += 1;
                    }
                    black_box(dispatched)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_mixed_lanes(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/mixed_lanes");
    group.sample_size(50);
    for &(ready_n, cancel_n) in &[(90u32, 10u32), (450, 50), (900, 100)] {
        let total = ready_n + cancel_n;
        group.throughput(Throughput::Elements(u64::from(total)));
        group.bench_with_input(BenchmarkId::new("dispatch_all", total), &(ready_n, cancel_n), |b, &(ready_n, cancel_n)| {
            b.iter_batched(
                || {
                    let mut sched = Scheduler::new(0);
                    let mut id = 0u16;
                    for _ in 0..cancel_n {
                        sched.inject_cancel(task(id), 100);
                        id += 1;
                    }
                    for i in 0..ready_n {
                        sched.inject_ready_priority(task(id), (i % 64) as u8);
                        id += 1;
                    }
                    sched
                },
                |mut sched| {
                    let mut dispatched = 0u64;
                    while matches!(sched.dispatch_once(Time::ZERO, None), asupersync_kernel::scheduler::DispatchOutcome::Dispatched(_)) {
                        dispatched += 1;
                    }
                    black_box(dispatched)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ready_dominated, bench_cancel_dominated, bench_mixed_lanes);
criterion_main!(benches);
