#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Group::get(key)                        │
//! │                                                                  │
//! │   local LRU ──hit──▶ return                                      │
//! │       │miss                                                      │
//! │       ▼                                                          │
//! │   FlightGroup::run(key)          (one thunk per key in flight)   │
//! │       │                                                          │
//! │       ├─▶ PeerPicker::pick(key) ──remote──▶ PeerTransport::fetch │
//! │       │                                         │error           │
//! │       │                                         ▼ (logged)       │
//! │       └────────self / no peers────────▶ Loader::load(key)        │
//! │                                              │ok                 │
//! │                                              ▼                   │
//! │                                        populate local LRU        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Locking discipline
//!
//! Each [`Group`] owns two independent locks: the cache mutex around its
//! LRU store and the single-flight mutex around the in-flight call map.
//! They are never held at the same time, and neither is held across a
//! loader or transport call, so the engine cannot deadlock on its own
//! locks no matter how callers overlap.

/// Immutable byte values handed to cache consumers.
///
/// Provides [`ByteView`], a cheaply clonable immutable byte sequence, and
/// the [`Measurable`] capability the LRU store uses to charge entries
/// against its byte budget.
pub mod byteview;

/// Doubly linked recency list with in-place reordering.
///
/// Internal infrastructure for the LRU store. Exposes raw pointer
/// operations that require careful invariant maintenance; use the
/// high-level [`LruCache`] instead.
pub(crate) mod list;

/// Cache entry triple: key, value, byte charge.
pub(crate) mod entry;

/// Cache configuration structures.
pub mod config;

/// Byte-budgeted Least Recently Used (LRU) store.
pub mod lru;

/// Single-flight duplicate-call suppression.
///
/// Collapses concurrent calls for the same string key into one execution
/// whose result every caller shares.
pub mod singleflight;

/// Consistent-hash ring with virtual nodes.
pub mod ring;

/// Fixed-size bloom filter.
pub mod bloom;

/// Peer picker and peer transport interfaces.
pub mod peers;

/// Transport-agnostic peer pool implementing [`PeerPicker`] over the ring.
pub mod pool;

/// The cache group orchestrator and group registry.
pub mod group;

/// Store- and group-level counters.
pub mod metrics;

/// Error and result types.
pub mod error;

pub use byteview::{ByteView, Measurable};
pub use config::LruConfig;
pub use error::{Error, Result};
pub use group::{lookup_group, new_group, Group, Loader, Registry};
pub use lru::LruCache;
pub use peers::{PeerPicker, PeerTransport};
pub use pool::PeerPool;
pub use ring::HashRing;
pub use singleflight::FlightGroup;

pub use bloom::BloomFilter;
pub use metrics::{CacheMetrics, GroupMetrics};
