use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rayon::prelude::*;
use std::sync::Arc;
use stripemap::HashTable;

const ITER: u64 = 32 * 1024;

fn task_insert_u64_u64() -> HashTable<u64, u64> {
    let table = HashTable::with_size(19);
    (0..ITER).into_par_iter().for_each(|i| {
        table.insert(i, i + 7);
    });
    table
}

fn insert_u64_u64(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_u64_u64");
    group.throughput(Throughput::Elements(ITER));
    let max = num_cpus::get();

    for threads in 1..=max {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .unwrap();
                pool.install(|| b.iter(task_insert_u64_u64));
            },
        );
    }

    group.finish();
}

fn task_insert_u64_u64_presized() -> HashTable<u64, u64> {
    let table = HashTable::with_size(19);
    table.reserve(ITER as usize).unwrap();
    (0..ITER).into_par_iter().for_each(|i| {
        table.insert(i, i + 7);
    });
    table
}

fn insert_u64_u64_presized(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_u64_u64_presized");
    group.throughput(Throughput::Elements(ITER));
    let max = num_cpus::get();

    for threads in 1..=max {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .unwrap();
                pool.install(|| b.iter(task_insert_u64_u64_presized));
            },
        );
    }

    group.finish();
}

fn task_get_u64_u64(threads: usize, table: Arc<HashTable<u64, u64>>) {
    let inc = ITER / (threads as u64);

    rayon::scope(|s| {
        for t in 0..(threads as u64) {
            let m = table.clone();
            s.spawn(move |_| {
                let start = t * inc;
                for i in start..(start + inc) {
                    assert_eq!(black_box(m.get(i)), Some(i + 7));
                }
            });
        }
    });
}

fn get_u64_u64(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_u64_u64");
    group.throughput(Throughput::Elements(ITER));
    let max = num_cpus::get();

    for threads in 1..=max {
        let table = Arc::new(task_insert_u64_u64());

        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .unwrap();
                pool.install(|| b.iter(|| task_get_u64_u64(threads, table.clone())));
            },
        );
    }

    group.finish();
}

fn insert_remove_u64_u64(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_remove_u64_u64");
    group.throughput(Throughput::Elements(ITER));

    group.bench_function("single_thread", |b| {
        let table = HashTable::with_size(19);
        b.iter(|| {
            for i in 0..ITER {
                table.insert(i, i);
            }
            for i in 0..ITER {
                black_box(table.remove(i));
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    insert_u64_u64,
    insert_u64_u64_presized,
    get_u64_u64,
    insert_remove_u64_u64,
);
criterion_main!(benches);
