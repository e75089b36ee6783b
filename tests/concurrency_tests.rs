//! Concurrency tests for single-flight collapsing and group behavior
//! under parallel callers.

use meshcache::{ByteView, Error, FlightGroup, Registry, Result};
use scoped_threadpool::Pool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Fifty overlapping gets for one missing key: the loader runs once, the
/// store ends with exactly one entry, and every caller sees the value.
#[test]
fn test_concurrent_gets_coalesce() {
    const CALLERS: u32 = 50;

    let loader_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loader_calls);
    let registry = Registry::new();
    let group = registry.new_group("flight", 2 << 10, move |_: &str| -> Result<Vec<u8>> {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(200));
        Ok(b"v".to_vec())
    });

    let barrier = Barrier::new(CALLERS as usize);
    let mut pool = Pool::new(CALLERS);
    pool.scoped(|scope| {
        for _ in 0..CALLERS {
            let group = &group;
            let barrier = &barrier;
            scope.execute(move || {
                barrier.wait();
                let view = group.get("k").unwrap();
                assert_eq!(view.as_bytes(), b"v");
            });
        }
    });

    assert_eq!(loader_calls.load(Ordering::SeqCst), 1);
    assert_eq!(group.cache_len(), 1);

    let metrics = group.metrics();
    assert_eq!(metrics.gets, CALLERS as u64);
    assert_eq!(metrics.loads_deduped, 1);
    assert_eq!(metrics.local_loads, 1);
}

/// Coalesced callers all see the loader's error, and a later caller
/// retries fresh.
#[test]
fn test_concurrent_errors_coalesce() {
    let loader_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loader_calls);
    let registry = Registry::new();
    let group = registry.new_group("flight-err", 2 << 10, move |key: &str| -> Result<Vec<u8>> {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        Err(Error::NotFound(key.to_owned()))
    });

    let barrier = Barrier::new(8);
    let mut pool = Pool::new(8);
    pool.scoped(|scope| {
        for _ in 0..8 {
            let group = &group;
            let barrier = &barrier;
            scope.execute(move || {
                barrier.wait();
                let out = group.get("gone");
                assert_eq!(out, Err(Error::NotFound("gone".to_owned())));
            });
        }
    });
    assert_eq!(loader_calls.load(Ordering::SeqCst), 1);

    // The record is gone with the flight; errors are never cached.
    let _ = group.get("gone");
    assert_eq!(loader_calls.load(Ordering::SeqCst), 2);
}

/// Flights for distinct keys run concurrently: each loader waits to see
/// the other one started before returning.
#[test]
fn test_flights_for_distinct_keys_run_in_parallel() {
    let started = Arc::new(AtomicUsize::new(0));
    let observer = Arc::clone(&started);
    let registry = Registry::new();
    let group = registry.new_group("parallel", 2 << 10, move |key: &str| -> Result<Vec<u8>> {
        observer.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(2);
        while observer.load(Ordering::SeqCst) < 2 {
            assert!(
                Instant::now() < deadline,
                "loads for distinct keys did not overlap"
            );
            std::hint::spin_loop();
        }
        Ok(key.as_bytes().to_vec())
    });

    let group_a = &group;
    thread::scope(|scope| {
        scope.spawn(move || assert_eq!(group_a.get("a").unwrap().as_bytes(), b"a"));
        assert_eq!(group.get("b").unwrap().as_bytes(), b"b");
    });
    assert_eq!(started.load(Ordering::SeqCst), 2);
}

/// The raw coalescer delivers one execution's value to a crowd of
/// waiters, while sequential calls each run their own thunk.
#[test]
fn test_flight_group_exactly_once_then_fresh() {
    let flights: Arc<FlightGroup<u64>> = Arc::new(FlightGroup::new());
    let executions = Arc::new(AtomicUsize::new(0));

    let barrier = Arc::new(Barrier::new(50));
    let handles: Vec<_> = (0..50)
        .map(|_| {
            let flights = Arc::clone(&flights);
            let executions = Arc::clone(&executions);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                flights.run("k", || {
                    executions.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(200));
                    7
                })
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 7);
    }
    assert_eq!(executions.load(Ordering::SeqCst), 1);

    // The flight is over; a fresh call executes again.
    flights.run("k", || {
        executions.fetch_add(1, Ordering::SeqCst);
        7
    });
    assert_eq!(executions.load(Ordering::SeqCst), 2);
}

/// Parallel readers of a hot key share immutable views; copies they make
/// never contaminate the cache.
#[test]
fn test_concurrent_value_isolation() {
    let registry = Registry::new();
    let group = registry.new_group("iso", 2 << 10, |_: &str| -> Result<Vec<u8>> {
        Ok(b"shared".to_vec())
    });
    // Warm the cache so every thread hits.
    let first: ByteView = group.get("k").unwrap();
    assert_eq!(first.as_bytes(), b"shared");

    let mut pool = Pool::new(8);
    pool.scoped(|scope| {
        for _ in 0..8 {
            let group = &group;
            scope.execute(move || {
                for _ in 0..100 {
                    let mut copy = group.get("k").unwrap().to_vec();
                    copy.iter_mut().for_each(|b| *b = b'?');
                }
            });
        }
    });

    assert_eq!(group.get("k").unwrap().as_bytes(), b"shared");
    assert_eq!(group.cache_len(), 1);
}

/// Hammering one group from many threads with an overlapping key set
/// keeps the store within budget and the engine deadlock-free.
#[test]
fn test_group_stress_under_budget() {
    let registry = Registry::new();
    let max_bytes = 512;
    let group = registry.new_group("stress", max_bytes, |key: &str| -> Result<Vec<u8>> {
        Ok(vec![b'x'; key.len() * 3])
    });

    let mut pool = Pool::new(8);
    pool.scoped(|scope| {
        for t in 0..8u64 {
            let group = &group;
            scope.execute(move || {
                for i in 0..1_000u64 {
                    let key = format!("key-{}", (t * 31 + i) % 64);
                    let view = group.get(&key).unwrap();
                    assert_eq!(view.len(), key.len() * 3);
                }
            });
        }
    });

    assert!(group.cache_used_bytes() <= max_bytes);
    assert!(group.cache_len() > 0);
}
