use rand::Rng;
use std::sync::{Arc, Barrier};
use std::thread;
use stripemap::HashTable;

/// Number of writer threads in the full-table scenario.
const WRITERS: i32 = 8;

/// Total number of keys inserted across all writers.
#[cfg(not(miri))]
const KEYS: i32 = 1_000_000;
#[cfg(miri)]
const KEYS: i32 = 1_000;

#[test]
fn disjoint_writers_lose_nothing() {
    let table = Arc::new(HashTable::with_size(19));
    let per_writer = KEYS / WRITERS;

    let writers: Vec<_> = (0..WRITERS)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let start = t * per_writer;
                for key in start..start + per_writer {
                    table.insert(key, key * 100);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("failed to join thread");
    }

    assert_eq!(table.len(), KEYS as usize);
    for key in 0..KEYS {
        assert_eq!(table.get(key), Some(key * 100), "key {}", key);
    }

    let mut reachable = 0;
    table.for_each(|_, _| reachable += 1);
    assert_eq!(reachable, KEYS as usize);
}

/// Number of entries for each thread to place in the table.
const NUM_ENTRIES: usize = 128;

/// Number of iterations for each test
const ITERATIONS: usize = 64;

fn insert(table: &HashTable<i64, i64>, k: i64) {
    table.insert(k, k);
}

#[test]
fn test_concurrent_insert() {
    test(insert);
}

fn test<F>(associator: F)
where
    F: Fn(&HashTable<i64, i64>, i64) + Send + Copy + 'static,
{
    for _ in 0..ITERATIONS {
        test_once(associator);
    }
}

fn test_once<F>(associator: F)
where
    F: Fn(&HashTable<i64, i64>, i64) + Send + Copy + 'static,
{
    let table = Arc::new(HashTable::with_size(19));
    let mut threads = Vec::new();
    for _ in 0..num_cpus::get().min(8) {
        let table = table.clone();
        let handle = thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut mine = Vec::with_capacity(NUM_ENTRIES);
            for _ in 0..NUM_ENTRIES {
                let key: i64 = rng.gen();
                associator(&table, key);
                assert!(table.contains_key(key));
                mine.push(key);
            }
            // growth triggered by other threads must not lose anything we put in
            for key in mine {
                assert_eq!(table.get(key), Some(key));
            }
        });
        threads.push(handle);
    }
    for t in threads {
        t.join().expect("failed to join thread");
    }
}

#[test]
fn concurrent_overwrites_keep_one_entry_per_key() {
    const KEYS: i32 = 256;
    let threads = num_cpus::get().clamp(2, 8);
    let table = Arc::new(HashTable::with_size(19));
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..16 {
                    for key in 0..KEYS {
                        table.insert(key, (t, round));
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("failed to join thread");
    }

    assert_eq!(table.len(), KEYS as usize);
    let mut keys = Vec::new();
    table.for_each(|&k, &(_, round)| {
        assert_eq!(round, 15);
        keys.push(k);
    });
    keys.sort_unstable();
    assert_eq!(keys, (0..KEYS).collect::<Vec<_>>());
}
