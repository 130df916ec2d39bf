// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Benchmarks for change detection over realistic message catalogues.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use inkwerk_core::types::MasterState;
use inkwerk_sync::detector::{SyncSnapshot, detect};

fn catalogue(size: usize) -> Vec<String> {
    (0..size).map(|i| format!("LOT{i:05}")).collect()
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");

    for size in [50usize, 500, 5_000] {
        let names = catalogue(size);
        let before = SyncSnapshot::from_state(&MasterState::from_names(
            names.iter().cloned(),
            Some("LOT00000"),
        ));

        // Unchanged catalogue: the common case on every poll.
        let same = MasterState::from_names(names.iter().cloned(), Some("LOT00000"));
        group.bench_with_input(BenchmarkId::new("unchanged", size), &same, |b, live| {
            b.iter(|| detect(black_box(live), Some(black_box(&before))))
        });

        // One new message plus a selection change.
        let mut grown_names = names.clone();
        grown_names.push("NEW".to_string());
        let grown = MasterState::from_names(grown_names, Some("NEW"));
        group.bench_with_input(BenchmarkId::new("one_added", size), &grown, |b, live| {
            b.iter(|| detect(black_box(live), Some(black_box(&before))))
        });
    }

    group.finish();
}

fn bench_baseline(c: &mut Criterion) {
    let live = MasterState::from_names(catalogue(500), Some("LOT00000"));
    c.bench_function("snapshot_from_state_500", |b| {
        b.iter(|| SyncSnapshot::from_state(black_box(&live)))
    });
}

criterion_group!(benches, bench_detect, bench_baseline);
criterion_main!(benches);
