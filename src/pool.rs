//! Transport-agnostic peer pool.
//!
//! [`PeerPool`] is the bundled [`PeerPicker`]: a consistent-hash ring
//! over the fleet membership plus a table of per-peer transports. The
//! embedding program decides what a transport *is* (HTTP client, RPC
//! stub, in-process stub in tests); the pool only decides *which* peer
//! owns a key and whether that peer is someone else.

use crate::peers::{PeerPicker, PeerTransport};
use crate::ring::HashRing;
use core::fmt;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Default number of virtual ring points per peer.
///
/// Every node of a fleet must use the same value.
pub const DEFAULT_REPLICAS: usize = 50;

struct PoolState {
    ring: HashRing,
    transports: HashMap<String, Arc<dyn PeerTransport>>,
}

/// Routes keys to peers via consistent hashing.
///
/// The pool knows its own peer identifier; when the ring resolves a key
/// to that identifier (or the membership is empty)
/// [`pick`](PeerPicker::pick) returns `None` and the group loads locally.
///
/// Membership changes and lookups serialize on one internal lock, which
/// also covers the ring (the ring itself is not thread-safe).
pub struct PeerPool {
    self_id: String,
    replicas: usize,
    state: Mutex<PoolState>,
}

impl PeerPool {
    /// Creates a pool for the node identified by `self_id`, using
    /// [`DEFAULT_REPLICAS`] virtual points per peer.
    pub fn new(self_id: impl Into<String>) -> Self {
        Self::with_replicas(self_id, DEFAULT_REPLICAS)
    }

    /// Creates a pool with an explicit virtual-point multiplicity.
    ///
    /// # Panics
    ///
    /// Panics if `replicas` is zero.
    pub fn with_replicas(self_id: impl Into<String>, replicas: usize) -> Self {
        PeerPool {
            self_id: self_id.into(),
            replicas,
            state: Mutex::new(PoolState {
                ring: HashRing::new(replicas),
                transports: HashMap::new(),
            }),
        }
    }

    /// This node's peer identifier.
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Replaces the fleet membership wholesale.
    ///
    /// Each element pairs a peer identifier with the transport used to
    /// reach it. The local node may be listed with any transport (it is
    /// never fetched through); listing it keeps every node's ring
    /// identical, which is required for the fleet to agree on ownership.
    pub fn set_peers<I>(&self, peers: I)
    where
        I: IntoIterator<Item = (String, Arc<dyn PeerTransport>)>,
    {
        let mut state = self.state.lock();
        state.ring = HashRing::new(self.replicas);
        state.transports.clear();
        for (id, transport) in peers {
            state.ring.add(&[id.as_str()]);
            state.transports.insert(id, transport);
        }
    }

    /// Number of peers currently in the membership.
    pub fn peer_count(&self) -> usize {
        self.state.lock().ring.len()
    }
}

impl PeerPicker for PeerPool {
    fn pick(&self, key: &str) -> Option<Arc<dyn PeerTransport>> {
        let state = self.state.lock();
        match state.ring.get(key) {
            Some(owner) if owner != self.self_id => {
                debug!(peer = owner, key, "routing to remote peer");
                state.transports.get(owner).cloned()
            }
            _ => None,
        }
    }
}

impl fmt::Debug for PeerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerPool")
            .field("self_id", &self.self_id)
            .field("replicas", &self.replicas)
            .field("peers", &self.state.lock().ring.len())
            .finish()
    }
}
