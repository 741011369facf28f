use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mymusic_recorder::sequencer::note::check_note_list;
use mymusic_recorder::{Note, NoteList, merge};

/// Dense take: `count` notes cycling over an octave, 60ms apart
fn take(count: usize, offset: f64) -> NoteList {
    (0..count)
        .map(|i| {
            let start = offset + i as f64 * 60.0;
            Note::new(60 + (i % 12) as u8, 100, start, start + 50.0)
        })
        .collect()
}

/// Benchmark merging a new take into an existing performance
fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for size in [100, 1000, 4000] {
        let old = take(size, 0.0);
        // Shifted by half a note: every incoming note overlaps one old note
        let new = take(size / 10, 25.0);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(merge(black_box(&old), black_box(&new))));
        });
    }
    group.finish();
}

/// Benchmark the load-time invariant check
fn bench_check_note_list(c: &mut Criterion) {
    let notes = take(10_000, 0.0);

    c.bench_function("check_note_list_10k", |b| {
        b.iter(|| black_box(check_note_list(black_box(&notes)).is_ok()));
    });
}

criterion_group!(benches, bench_merge, bench_check_note_list);
criterion_main!(benches);
