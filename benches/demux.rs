//! Demux strategy benchmarks
//!
//! Static and table-driven strategies run over the same synthetic batch, so
//! their throughput is directly comparable. The parallel runs split that
//! batch across scoped worker threads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use input_demux::demux::{
    run_parallel, run_with, DynamicDemuxer, FieldDescriptorTable, OutputStore, RecordBuffer,
    StaticDemuxer,
};
use input_demux::layout::{gamepad_layout, mouse_layout, MouseLayout};

const SEED: u64 = 0x5EED;

fn batch(table: &FieldDescriptorTable, count: usize) -> RecordBuffer {
    RecordBuffer::synthetic(table, count, SEED).unwrap()
}

fn bench_mouse(c: &mut Criterion) {
    let mut group = c.benchmark_group("mouse_demux");
    let table = mouse_layout().build_table().unwrap();
    let static_mouse = StaticDemuxer::<MouseLayout>::new().unwrap();
    let dynamic = DynamicDemuxer::new(&table);

    for count in [10_000usize, 1_000_000].iter() {
        let records = batch(&table, *count);
        let mut out = OutputStore::allocate(&table, *count);
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::new("static", count), count, |b, &count| {
            b.iter(|| {
                run_with(&static_mouse, black_box(records.as_bytes()), count, &mut out).unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("dynamic", count), count, |b, &count| {
            b.iter(|| run_with(&dynamic, black_box(records.as_bytes()), count, &mut out).unwrap());
        });

        let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
        group.bench_with_input(BenchmarkId::new("parallel", count), count, |b, &count| {
            b.iter(|| {
                run_parallel(&dynamic, black_box(records.as_bytes()), count, &mut out, workers)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_gamepad(c: &mut Criterion) {
    let mut group = c.benchmark_group("gamepad_demux");
    let table = gamepad_layout().build_table().unwrap();
    let dynamic = DynamicDemuxer::new(&table);

    for count in [10_000usize, 1_000_000].iter() {
        let records = batch(&table, *count);
        let mut out = OutputStore::allocate(&table, *count);
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::new("dynamic", count), count, |b, &count| {
            b.iter(|| run_with(&dynamic, black_box(records.as_bytes()), count, &mut out).unwrap());
        });

        for workers in [2, 4] {
            let id = BenchmarkId::new(format!("parallel_x{}", workers), count);
            group.bench_with_input(id, count, |b, &count| {
                b.iter(|| {
                    run_parallel(&dynamic, black_box(records.as_bytes()), count, &mut out, workers)
                        .unwrap()
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_mouse, bench_gamepad);
criterion_main!(benches);
