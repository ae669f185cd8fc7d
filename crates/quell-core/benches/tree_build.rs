//! Criterion benchmarks for the per-poll hot path.
//!
//! Everything runs against synthetic tables and the mock source, never the
//! live `/proc`, so numbers are comparable across machines.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quell_core::lifecycle::LifecycleService;
use quell_core::source::linux::parse_stat;
use quell_core::test_utils::{synthetic_forest, synthetic_mock_source};
use quell_core::{build_tree, sort_processes, SortKey};

fn bench_build_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree");
    for count in [100usize, 1_000, 10_000] {
        let forest = synthetic_forest(count, 7);
        group.bench_with_input(BenchmarkId::new("build_tree", count), &forest, |b, input| {
            b.iter(|| black_box(build_tree(black_box(input.clone()))));
        });
    }
    group.finish();
}

fn bench_sort(c: &mut Criterion) {
    let forest = synthetic_forest(1_000, 7);
    let mut group = c.benchmark_group("sort");
    for key in SortKey::ALL {
        group.bench_with_input(BenchmarkId::new("sort_processes", key), &forest, |b, input| {
            b.iter(|| {
                let mut rows = input.clone();
                sort_processes(&mut rows, key.sorter());
                black_box(rows);
            });
        });
    }
    group.finish();
}

fn bench_poll(c: &mut Criterion) {
    let svc = LifecycleService::new(synthetic_mock_source(1_000, 7));
    // Warm the handle cache so the steady-state path is measured.
    let _ = svc.poll();
    c.bench_function("lifecycle/poll_1000_cached", |b| {
        b.iter(|| black_box(svc.poll().expect("mock poll")));
    });
}

fn bench_parse_stat(c: &mut Criterion) {
    let stat = "4242 (node dev server) S 1 4242 4242 0 -1 4194560 900 0 0 0 \
                120 30 0 0 20 0 11 0 98765 734003200 20480 18446744073709551615";
    c.bench_function("source/parse_stat", |b| {
        b.iter(|| black_box(parse_stat(black_box(stat)).expect("stat parses")));
    });
}

criterion_group!(benches, bench_build_tree, bench_sort, bench_poll, bench_parse_stat);
criterion_main!(benches);
