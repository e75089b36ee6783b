//! Store- and group-level counters.
//!
//! Two kinds of counters with two synchronization regimes:
//!
//! - [`CacheMetrics`]: plain integers owned by an [`LruCache`](crate::LruCache)
//!   and mutated under whatever lock guards the store, so recording a hit
//!   costs an increment and nothing more.
//! - Group flow counters: atomics, because [`Group::get`](crate::Group::get)
//!   runs on shared references from many threads at once. Callers read them
//!   through the [`GroupMetrics`] snapshot.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single LRU store.
///
/// All counters are cumulative since store creation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheMetrics {
    /// Lookups served, hit or miss.
    pub gets: u64,

    /// Lookups that found a resident entry.
    pub hits: u64,

    /// Entries removed to enforce the byte budget.
    pub evictions: u64,

    /// Entries inserted (new keys and replacements).
    pub insertions: u64,

    /// Total bytes charged by inserted entries.
    pub bytes_inserted: u64,

    /// Total bytes released by evicted entries.
    pub bytes_evicted: u64,
}

impl CacheMetrics {
    pub(crate) fn record_hit(&mut self) {
        self.gets += 1;
        self.hits += 1;
    }

    pub(crate) fn record_miss(&mut self) {
        self.gets += 1;
    }

    pub(crate) fn record_insertion(&mut self, charge: usize) {
        self.insertions += 1;
        self.bytes_inserted += charge as u64;
    }

    pub(crate) fn record_eviction(&mut self, charge: usize) {
        self.evictions += 1;
        self.bytes_evicted += charge as u64;
    }
}

/// Atomic flow counters owned by a group.
///
/// Increments use relaxed ordering: the counts are monotonic telemetry,
/// not synchronization.
#[derive(Default)]
pub(crate) struct GroupCounters {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    loads: AtomicU64,
    loads_deduped: AtomicU64,
    local_loads: AtomicU64,
    local_load_errors: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
}

impl GroupCounters {
    pub(crate) fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load_deduped(&self) {
        self.loads_deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_local_load_error(&self) {
        self.local_load_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> GroupMetrics {
        GroupMetrics {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            loads_deduped: self.loads_deduped.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errors: self.local_load_errors.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for GroupCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.snapshot(), f)
    }
}

/// A point-in-time snapshot of a group's flow counters.
///
/// Counters are sampled independently with relaxed loads; a snapshot taken
/// while requests are in flight may be internally skewed by a few counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GroupMetrics {
    /// Calls to `Group::get` that passed key validation.
    pub gets: u64,

    /// Gets answered from the local store.
    pub cache_hits: u64,

    /// Gets that entered the load path (misses).
    pub loads: u64,

    /// Loads that actually executed after single-flight collapsing.
    pub loads_deduped: u64,

    /// Loads answered by the local loader.
    pub local_loads: u64,

    /// Local loader failures.
    pub local_load_errors: u64,

    /// Loads answered by a remote peer.
    pub peer_loads: u64,

    /// Remote fetches that failed and fell back to the local loader.
    pub peer_errors: u64,
}
