//! Byte-budgeted Least Recently Used (LRU) store.
//!
//! The store keeps entries ordered by last use and evicts from the cold
//! end whenever the resident byte total exceeds the configured budget.
//! Every operation is O(1).
//!
//! # Data structure
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                       LruCache                                 │
//! │                                                                │
//! │  HashMap<String, *Node>      Doubly linked recency list        │
//! │  ┌──────────────┐           ┌────────────────────────────┐     │
//! │  │ "apple"  ─────────────▶  │ MRU ◀──▶ ... ◀──▶ LRU      │     │
//! │  │ "banana" ─────────────▶  │  ▲                  │      │     │
//! │  │ "cherry" ─────────────▶  │  │                  ▼      │     │
//! │  └──────────────┘           │ front             back     │     │
//! │                             └────────────────────────────┘     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Accounting
//!
//! An entry is charged `key.len() + value.size()` bytes. The store
//! maintains three invariants at every return from a public method:
//!
//! 1. `used_bytes` equals the sum of the charges of all resident entries.
//! 2. The index and the recency list hold exactly the same keys.
//! 3. With a non-zero budget, `used_bytes <= max_bytes`, except when a
//!    single entry alone exceeds the budget, in which case the budget is
//!    advisory and that entry stays resident.
//!
//! Both reads and writes refresh recency. Eviction removes strictly the
//! least recently used entry first and reports each removal through the
//! optional eviction callback.
//!
//! # Thread safety
//!
//! `LruCache` is **not** thread-safe; every method takes `&mut self`.
//! The group layer wraps it in a mutex and runs the callback under that
//! lock, which is why callbacks must be short and must not reenter the
//! owning group.
//!
//! # Examples
//!
//! ```
//! use meshcache::{ByteView, LruCache, LruConfig};
//!
//! let mut cache = LruCache::init(LruConfig::new(10), None);
//!
//! cache.add("aa", ByteView::from("1234")); // charge 6
//! cache.add("bb", ByteView::from("1234")); // charge 6 -> evicts "aa"
//!
//! assert!(cache.get("aa").is_none());
//! assert!(cache.get("bb").is_some());
//! assert_eq!(cache.used_bytes(), 6);
//! ```

use crate::byteview::Measurable;
use crate::config::LruConfig;
use crate::entry::CacheEntry;
use crate::list::{List, Node};
use crate::metrics::CacheMetrics;
use core::fmt;
use hashbrown::HashMap;

/// Callback invoked synchronously with each entry removed by eviction.
pub type EvictionCallback<V> = Box<dyn FnMut(String, V) + Send>;

/// A byte-budgeted LRU store keyed by strings.
///
/// The value type only needs to report its content size through
/// [`Measurable`]; the store itself knows nothing about bytes beyond the
/// charges it sums.
///
/// # Safety
///
/// The index holds raw pointers into list nodes. A pointer stays valid
/// from the `push_front` that created it until the node is popped off the
/// list, and the index entry is removed in the same operation, so the map
/// never holds a dangling handle.
pub struct LruCache<V> {
    config: LruConfig,
    /// Sum of the charges of all resident entries.
    used_bytes: usize,
    list: List<CacheEntry<V>>,
    index: HashMap<String, *mut Node<CacheEntry<V>>>,
    on_evict: Option<EvictionCallback<V>>,
    metrics: CacheMetrics,
}

// SAFETY: LruCache owns all data; the raw pointers in `index` only target
// nodes owned by `list`, which lives and dies with the cache.
unsafe impl<V: Send> Send for LruCache<V> {}

// SAFETY: all mutation requires &mut self; shared references cannot cause
// data races.
unsafe impl<V: Send> Sync for LruCache<V> {}

impl<V: Measurable> LruCache<V> {
    /// Creates a store from a configuration and an optional eviction
    /// callback.
    ///
    /// The callback fires once per evicted entry with that entry's final
    /// key and value, in eviction order.
    pub fn init(config: LruConfig, on_evict: Option<EvictionCallback<V>>) -> Self {
        LruCache {
            config,
            used_bytes: 0,
            list: List::new(),
            index: HashMap::new(),
            on_evict,
            metrics: CacheMetrics::default(),
        }
    }

    /// Current number of resident entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no entries are resident.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Sum of the byte charges of all resident entries.
    #[inline]
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Configured byte budget (`0` = unbounded).
    #[inline]
    pub fn max_bytes(&self) -> usize {
        self.config.max_bytes()
    }

    /// Counters accumulated by this store.
    #[inline]
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Looks up a key, refreshing its recency on a hit.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        if let Some(&node) = self.index.get(key) {
            self.metrics.record_hit();
            // SAFETY: node comes from our index, so it is a live non-sigil
            // node of our list.
            unsafe {
                self.list.move_to_front(node);
                Some(&(*node).value().value)
            }
        } else {
            self.metrics.record_miss();
            None
        }
    }

    /// Inserts or replaces a value, refreshing the key's recency, then
    /// trims the cold end until the store is back under budget.
    pub fn add(&mut self, key: &str, value: V) {
        if let Some(&node) = self.index.get(key) {
            // SAFETY: node comes from our index.
            unsafe {
                self.list.move_to_front(node);
                let entry = (*node).value_mut();
                let new_charge = entry.key.len() + value.size();
                self.used_bytes = self.used_bytes - entry.charge + new_charge;
                entry.value = value;
                entry.charge = new_charge;
                self.metrics.record_insertion(new_charge);
            }
        } else {
            let entry = CacheEntry::new(key.to_owned(), value);
            let charge = entry.charge;
            let node = self.list.push_front(entry);
            self.index.insert(key.to_owned(), node);
            self.used_bytes += charge;
            self.metrics.record_insertion(charge);
        }

        // The entry just touched sits at the front and is evicted last; a
        // lone entry larger than the whole budget stays resident.
        while self.config.max_bytes() != 0
            && self.used_bytes > self.config.max_bytes()
            && self.list.len() > 1
        {
            self.remove_oldest();
        }
    }

    /// Evicts the least recently used entry, if any, applying the
    /// eviction callback.
    pub fn remove_oldest(&mut self) {
        if let Some(node) = self.list.pop_back() {
            let entry = node.into_value();
            self.index.remove(&entry.key);
            self.used_bytes -= entry.charge;
            self.metrics.record_eviction(entry.charge);
            if let Some(on_evict) = self.on_evict.as_mut() {
                on_evict(entry.key, entry.value);
            }
        }
    }
}

impl<V> fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.config.max_bytes())
            .field("used_bytes", &self.used_bytes)
            .field("len", &self.index.len())
            .finish()
    }
}
