//! Consistent-hash ring with virtual nodes.
//!
//! Peers are projected onto a circle of 32-bit hash points; a key belongs
//! to the first peer point at or clockwise of the key's own hash. Each
//! real peer contributes `replicas` virtual points so load spreads evenly
//! even with few peers, and membership changes remap only the slice of
//! the key space between affected points.
//!
//! Every node in a fleet must build an identical ring, so the point
//! derivation is fixed: virtual point `i` of peer `p` hashes the decimal
//! rendering of `i` concatenated with `p` (`"0peer"`, `"1peer"`, …), and
//! the default hash is CRC32-IEEE. Interoperating rings must agree on the
//! hash, the replica count, and this exact derivation.
//!
//! The ring is a plain data structure with no interior locking; callers
//! that mutate it concurrently with reads must serialize access (see
//! [`PeerPool`](crate::PeerPool)).

use core::fmt;
use hashbrown::HashMap;

/// A 32-bit hash over bytes used to place peers and keys on the ring.
pub type RingHashFn = fn(&[u8]) -> u32;

/// A consistent-hash ring mapping keys to peer identifiers.
///
/// # Examples
///
/// ```
/// use meshcache::HashRing;
///
/// let mut ring = HashRing::new(50);
/// ring.add(&["peer-a", "peer-b", "peer-c"]);
///
/// let owner = ring.get("some-key").unwrap().to_owned();
/// // Ownership is deterministic for a given membership.
/// assert_eq!(ring.get("some-key"), Some(owner.as_str()));
/// ```
pub struct HashRing {
    replicas: usize,
    hash: RingHashFn,
    /// All virtual points, sorted ascending.
    points: Vec<u32>,
    /// Virtual point -> real peer identifier.
    owners: HashMap<u32, String>,
    /// Real peers in insertion order, for rebuilds on removal.
    members: Vec<String>,
}

impl HashRing {
    /// Creates a ring using CRC32-IEEE with `replicas` virtual points per
    /// peer.
    ///
    /// # Panics
    ///
    /// Panics if `replicas` is zero.
    pub fn new(replicas: usize) -> Self {
        Self::with_hash(replicas, crc32fast::hash)
    }

    /// Creates a ring with a caller-supplied hash function.
    ///
    /// All peers of a fleet must use the same hash.
    ///
    /// # Panics
    ///
    /// Panics if `replicas` is zero.
    pub fn with_hash(replicas: usize, hash: RingHashFn) -> Self {
        assert!(replicas > 0, "a ring needs at least one replica per peer");
        HashRing {
            replicas,
            hash,
            points: Vec::new(),
            owners: HashMap::new(),
            members: Vec::new(),
        }
    }

    /// Number of real peers on the ring.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the ring has no peers.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Adds peers to the ring, projecting `replicas` virtual points for
    /// each new peer, then re-sorts the point space.
    ///
    /// Peers already on the ring are ignored. Distinct virtual points
    /// that hash to the same value overwrite each other last-writer-wins;
    /// with CRC32 and typical replica counts this is rare enough to
    /// accept.
    pub fn add<S: AsRef<str>>(&mut self, peers: &[S]) {
        for peer in peers {
            let peer = peer.as_ref();
            if self.members.iter().any(|m| m == peer) {
                continue;
            }
            self.members.push(peer.to_owned());
            self.insert_points(peer);
        }
        self.points.sort_unstable();
    }

    /// Removes a peer and rebuilds the point space from the remaining
    /// membership. Returns `false` if the peer was not on the ring.
    ///
    /// Rebuilding keeps the surviving points bit-identical to a ring that
    /// never knew the removed peer, so every node converges to the same
    /// ownership after a membership change.
    pub fn remove(&mut self, peer: &str) -> bool {
        let Some(pos) = self.members.iter().position(|m| m == peer) else {
            return false;
        };
        self.members.remove(pos);

        self.points.clear();
        self.owners.clear();
        // Split the borrow: drain a copy of the membership list.
        let members = std::mem::take(&mut self.members);
        for member in &members {
            self.insert_points(member);
        }
        self.members = members;
        self.points.sort_unstable();
        true
    }

    /// Returns the peer owning `key`, or `None` when the ring is empty.
    ///
    /// The owner is the peer mapped at the first point `>= hash(key)`,
    /// wrapping to the lowest point past the top of the space.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.points.partition_point(|&point| point < hash);
        let idx = if idx == self.points.len() { 0 } else { idx };
        self.owners.get(&self.points[idx]).map(String::as_str)
    }

    fn insert_points(&mut self, peer: &str) {
        for i in 0..self.replicas {
            let point = (self.hash)(format!("{i}{peer}").as_bytes());
            self.points.push(point);
            self.owners.insert(point, peer.to_owned());
        }
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("peers", &self.members.len())
            .field("points", &self.points.len())
            .finish()
    }
}
