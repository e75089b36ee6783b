//! The cache group orchestrator and group registry.
//!
//! A [`Group`] is a named cache namespace: one byte-budgeted LRU store,
//! one backend loader, one single-flight domain, and (optionally) one
//! peer picker. Its [`get`](Group::get) ties the subsystems together:
//!
//! 1. An empty key fails immediately.
//! 2. A resident entry is returned from the local store.
//! 3. Otherwise the miss enters single-flight. Inside the flight the key
//!    is routed: a remote owner is fetched through its transport (with
//!    failures logged and masked by a local fallback), anything else is
//!    loaded from the backend and populated into the local store.
//!
//! Remote-origin values are deliberately **not** cached locally: in the
//! ring's steady state a key has one owning peer, and caching it
//! elsewhere would duplicate memory across the fleet with no
//! invalidation to keep the copies honest.
//!
//! Groups live in a [`Registry`]. Prefer passing an explicit registry to
//! the code that serves transport requests; the process-wide default
//! behind [`new_group`]/[`lookup_group`] exists for ergonomics in small
//! programs.

use crate::byteview::ByteView;
use crate::config::LruConfig;
use crate::error::{Error, Result};
use crate::lru::LruCache;
use crate::metrics::{CacheMetrics, GroupCounters, GroupMetrics};
use crate::peers::PeerPicker;
use crate::singleflight::FlightGroup;
use core::fmt;
use hashbrown::HashMap;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces the authoritative value for a key on a local cache miss.
///
/// Closures of the right shape implement `Loader` directly:
///
/// ```
/// use meshcache::{Group, Result};
///
/// let group = Group::new("lengths", 1 << 20, |key: &str| -> Result<Vec<u8>> {
///     Ok(key.len().to_string().into_bytes())
/// });
/// assert_eq!(group.get("four").unwrap().as_bytes(), b"4");
/// ```
pub trait Loader: Send + Sync {
    /// Loads the value for `key` from the backing source.
    fn load(&self, key: &str) -> Result<Vec<u8>>;
}

impl<F> Loader for F
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    fn load(&self, key: &str) -> Result<Vec<u8>> {
        self(key)
    }
}

/// A named cache namespace over one loader and one byte budget.
///
/// All methods take `&self`; a group is shared across threads behind an
/// [`Arc`] and synchronizes internally. The store mutex and the
/// single-flight mutex are never held together, and no lock is held
/// across a loader or transport call.
pub struct Group {
    name: String,
    loader: Box<dyn Loader>,
    cache_bytes: usize,
    /// Lazily created on first populate, so an all-miss group costs no
    /// store.
    cache: Mutex<Option<LruCache<ByteView>>>,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    flight: FlightGroup<Result<ByteView>>,
    counters: GroupCounters,
}

impl Group {
    /// Creates a standalone (unregistered) group.
    ///
    /// `cache_bytes` is the local store's budget; `0` means unbounded.
    pub fn new(name: impl Into<String>, cache_bytes: usize, loader: impl Loader + 'static) -> Self {
        Group {
            name: name.into(),
            loader: Box::new(loader),
            cache_bytes,
            cache: Mutex::new(None),
            peers: OnceCell::new(),
            flight: FlightGroup::new(),
            counters: GroupCounters::default(),
        }
    }

    /// The group's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers the peer picker that routes keys across the fleet.
    ///
    /// # Panics
    ///
    /// Panics if called more than once; wiring peers twice is a
    /// configuration bug.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) {
        if self.peers.set(picker).is_err() {
            panic!("register_peers called more than once");
        }
    }

    /// Returns the cached or loaded value for `key`.
    ///
    /// Fails with [`Error::EmptyKey`] for an empty key; otherwise any
    /// error is the loader's, verbatim. Peer-fetch failures never
    /// surface; they are logged and masked by the local fallback.
    pub fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        self.counters.record_get();

        if let Some(view) = self.cache_get(key) {
            self.counters.record_cache_hit();
            debug!(group = %self.name, key, "cache hit");
            return Ok(view);
        }

        self.load(key)
    }

    /// Flow counters for this group.
    pub fn metrics(&self) -> GroupMetrics {
        self.counters.snapshot()
    }

    /// Counters of the local store (zeroes before the first populate).
    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache
            .lock()
            .as_ref()
            .map(|lru| lru.metrics().clone())
            .unwrap_or_default()
    }

    /// Number of entries resident in the local store.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().as_ref().map_or(0, LruCache::len)
    }

    /// Bytes resident in the local store.
    pub fn cache_used_bytes(&self) -> usize {
        self.cache.lock().as_ref().map_or(0, LruCache::used_bytes)
    }

    fn cache_get(&self, key: &str) -> Option<ByteView> {
        let mut cache = self.cache.lock();
        cache.as_mut().and_then(|lru| lru.get(key).cloned())
    }

    fn populate(&self, key: &str, value: ByteView) {
        let mut cache = self.cache.lock();
        cache
            .get_or_insert_with(|| LruCache::init(LruConfig::new(self.cache_bytes), None))
            .add(key, value);
    }

    /// Miss path: one flight per key; routing happens inside the flight
    /// so coalesced callers share the peer fetch too.
    fn load(&self, key: &str) -> Result<ByteView> {
        self.counters.record_load();
        self.flight.run(key, || {
            self.counters.record_load_deduped();

            if let Some(picker) = self.peers.get() {
                if let Some(peer) = picker.pick(key) {
                    match peer.fetch(&self.name, key) {
                        Ok(bytes) => {
                            self.counters.record_peer_load();
                            // Owned by the remote's owner; keep no local copy.
                            return Ok(ByteView::from(bytes));
                        }
                        Err(err) => {
                            self.counters.record_peer_error();
                            warn!(
                                group = %self.name,
                                key,
                                error = %err,
                                "peer fetch failed; falling back to local load"
                            );
                        }
                    }
                }
            }

            self.load_locally(key)
        })
    }

    fn load_locally(&self, key: &str) -> Result<ByteView> {
        match self.loader.load(key) {
            Ok(bytes) => {
                self.counters.record_local_load();
                let view = ByteView::from(bytes);
                self.populate(key, view.clone());
                Ok(view)
            }
            Err(err) => {
                self.counters.record_local_load_error();
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cache_bytes", &self.cache_bytes)
            .field("has_peers", &self.peers.get().is_some())
            .finish()
    }
}

/// A name-to-group mapping with interior locking.
///
/// Creation takes the write lock, lookup the read lock. Tests and
/// embedders can run any number of isolated registries; the process-wide
/// default behind [`new_group`] is just one of them.
#[derive(Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Creates a group and registers it under `name`.
    ///
    /// Re-using a name replaces the previous registration; handles to the
    /// replaced group keep working but new lookups see the new one.
    pub fn new_group(
        &self,
        name: &str,
        cache_bytes: usize,
        loader: impl Loader + 'static,
    ) -> Arc<Group> {
        let group = Arc::new(Group::new(name, cache_bytes, loader));
        self.groups
            .write()
            .insert(name.to_owned(), Arc::clone(&group));
        group
    }

    /// Looks up a registered group by name.
    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Number of registered groups.
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// Returns `true` if no groups are registered.
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("groups", &self.groups.read().len())
            .finish()
    }
}

static DEFAULT_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Creates a group in the process-wide default registry.
///
/// See [`Registry::new_group`].
pub fn new_group(name: &str, cache_bytes: usize, loader: impl Loader + 'static) -> Arc<Group> {
    DEFAULT_REGISTRY.new_group(name, cache_bytes, loader)
}

/// Looks up a group in the process-wide default registry.
pub fn lookup_group(name: &str) -> Option<Arc<Group>> {
    DEFAULT_REGISTRY.get(name)
}
