//! Single-flight duplicate-call suppression.
//!
//! When several threads miss on the same key at once, only the first one
//! should pay for the load; the rest should wait and share its result.
//! [`FlightGroup::run`] implements exactly that window: a call record
//! exists while one execution is in flight, every overlapping caller
//! blocks on that record, and the record is removed once the result has
//! been delivered, so a caller arriving after completion starts a fresh
//! flight of its own.
//!
//! The group never inspects the payload. Results are handed to waiters by
//! clone, which is why `T: Clone`; in the cache engine `T` is a
//! `Result<ByteView, Error>` and cloning is a reference-count bump.
//!
//! The in-flight map lock is held only around map mutation. The thunk
//! itself runs with no lock held, so flights for different keys proceed in
//! parallel, and waiters block on the call record's condition variable
//! rather than on the map lock.
//!
//! Cancellation is not supported: completion of the thunk is awaited
//! unconditionally. Callers needing timeouts must build them into the
//! thunk itself.

use core::fmt;
use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tracing::debug;

/// One in-flight call: a slot for the result and a completion signal.
struct Call<T> {
    result: Mutex<Option<T>>,
    done: Condvar,
}

impl<T: Clone> Call<T> {
    fn new() -> Self {
        Call {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    /// Blocks until the executing caller has stored a result, then
    /// returns a clone of it.
    fn wait(&self) -> T {
        let mut slot = self.result.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            self.done.wait(&mut slot);
        }
    }

    fn complete(&self, value: T) {
        *self.result.lock() = Some(value);
        self.done.notify_all();
    }
}

/// Collapses concurrent calls for the same key into one execution.
///
/// # Examples
///
/// ```
/// use meshcache::FlightGroup;
///
/// let flights: FlightGroup<u32> = FlightGroup::new();
/// let value = flights.run("answer", || 42);
/// assert_eq!(value, 42);
/// ```
pub struct FlightGroup<T> {
    calls: Mutex<HashMap<String, Arc<Call<T>>>>,
}

impl<T: Clone> FlightGroup<T> {
    /// Creates an empty flight group.
    pub fn new() -> Self {
        FlightGroup {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `work` for `key`, unless a flight for `key` is already in
    /// progress, in which case the current thread blocks and receives
    /// that flight's result instead.
    ///
    /// For any key, at most one thunk executes at any instant, and every
    /// caller that overlaps an execution observes the same value it
    /// produced. Errors are payload like any other value: they are
    /// delivered to all waiters verbatim and forgotten with the record.
    pub fn run<F>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> T,
    {
        let call = {
            let mut calls = self.calls.lock();
            if let Some(existing) = calls.get(key) {
                let existing = Arc::clone(existing);
                drop(calls);
                debug!(key, "joining in-flight call");
                return existing.wait();
            }
            let call = Arc::new(Call::new());
            calls.insert(key.to_owned(), Arc::clone(&call));
            call
        };

        let value = work();
        call.complete(value.clone());
        self.calls.lock().remove(key);
        value
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Clone> Default for FlightGroup<T> {
    fn default() -> Self {
        FlightGroup::new()
    }
}

impl<T> fmt::Debug for FlightGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightGroup")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_single_caller_executes() {
        let flights: FlightGroup<u32> = FlightGroup::new();
        assert_eq!(flights.run("k", || 7), 7);
        assert_eq!(flights.in_flight(), 0);
    }

    #[test]
    fn test_sequential_calls_each_execute() {
        let flights: FlightGroup<u32> = FlightGroup::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            flights.run("k", || {
                calls.fetch_add(1, Ordering::SeqCst);
                0
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_concurrent_calls_collapse() {
        let flights: Arc<FlightGroup<u64>> = Arc::new(FlightGroup::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let flights = Arc::clone(&flights);
                let executions = Arc::clone(&executions);
                thread::spawn(move || {
                    flights.run("k", || {
                        executions.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(100));
                        99
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 99);
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[test]
    fn test_distinct_keys_run_in_parallel() {
        let flights: Arc<FlightGroup<String>> = Arc::new(FlightGroup::new());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let flights = Arc::clone(&flights);
                thread::spawn(move || {
                    let key = format!("key-{i}");
                    flights.run(&key, || {
                        thread::sleep(Duration::from_millis(50));
                        key.clone()
                    })
                })
            })
            .collect();

        // If flights serialized across keys this would take ~200ms; allow
        // generous slack and just assert correctness of each result.
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("key-{i}"));
        }
    }

    #[test]
    fn test_error_payloads_are_shared() {
        let flights: FlightGroup<Result<u32, String>> = FlightGroup::new();
        let out = flights.run("k", || Err("boom".to_owned()));
        assert_eq!(out, Err("boom".to_owned()));

        // The failed record is gone; the next call runs its own thunk.
        let out = flights.run("k", || Ok(1));
        assert_eq!(out, Ok(1));
    }
}
