//! Two-phase channel benchmarks: reserve/send/recv hot path throughput at
//! a few capacities, plus the reserve/abort cascade-wake path.
//!
//! Run:
//!   cargo bench --bench channel_bench

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use asupersync_kernel::channel::{Channel, ReserveOutcome};

fn bench_reserve_send_recv(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel/reserve_send_recv");
    for &capacity in &[1usize, 16, 256] {
        let ops = 1_000u64;
        group.throughput(Throughput::Elements(ops));
        group.bench_with_input(BenchmarkId::new("round_trip", capacity), &capacity, |b, &capacity| {
            b.iter_batched(
                || Channel::<u64>::new(capacity),
                |mut ch| {
                    let mut delivered = 0u64;
                    for i in 0..ops {
                        let waiter = ch.next_waiter();
                        if let ReserveOutcome::Ready(permit) = ch.reserve(waiter, false) {
                            ch.send(permit, i).unwrap();
                        }
                        if matches!(ch.recv(false), asupersync_kernel::channel::RecvOutcome::Ready(_)) {
                            delivered += 1;
                        }
                    }
                    black_box(delivered)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_reserve_abort_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel/reserve_abort_cascade");
    for &waiters in &[8u64, 64, 512] {
        group.throughput(Throughput::Elements(waiters));
        group.bench_with_input(BenchmarkId::new("cascade_wake", waiters), &waiters, |b, &waiters| {
            b.iter_batched(
                || {
                    let mut ch = Channel::<u64>::new(1);
                    let mut ids = Vec::new();
                    let w0 = ch.next_waiter();
                    let ReserveOutcome::Ready(first) = ch.reserve(w0, false) else {
                        unreachable!("first reserve on an empty channel is always ready")
                    };
                    for _ in 0..waiters {
                        let w = ch.next_waiter();
                        ch.reserve(w, false);
                        ids.push(w);
                    }
                    (ch, first, ids)
                },
                |(mut ch, first, ids)| {
                    ch.abort(first);
                    let mut woken = 0u64;
                    for &w in &ids {
                        if let ReserveOutcome::Ready(permit) = ch.reserve(w, false) {
                            ch.abort(permit);
                            woken += 1;
                        }
                    }
                    black_box(woken)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_reserve_send_recv, bench_reserve_abort_cascade);
criterion_main!(benches);
