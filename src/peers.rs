//! Peer picker and peer transport interfaces.
//!
//! These two traits are the engine's entire view of the fleet. The
//! surrounding program supplies the wire protocol by implementing
//! [`PeerTransport`] (one value per remote peer) and routing by
//! implementing [`PeerPicker`], or by using the bundled
//! [`PeerPool`](crate::PeerPool).

use crate::error::Result;
use std::sync::Arc;

/// Fetches values from one remote peer.
///
/// Implementations may block arbitrarily long; the engine never holds a
/// lock across a fetch. Deadlines and retries belong inside the
/// implementation.
///
/// The engine mandates no wire format. HTTP implementations
/// conventionally request `<base_path>/<group>/<key>` with both segments
/// URL-escaped and treat any non-200 response as a fetch error, but any
/// protocol that can answer `(group, key)` with bytes fits.
pub trait PeerTransport: Send + Sync {
    /// Retrieves the value for `key` in the remote peer's group named
    /// `group`.
    fn fetch(&self, group: &str, key: &str) -> Result<Vec<u8>>;
}

/// Chooses the peer responsible for a key.
pub trait PeerPicker: Send + Sync {
    /// Returns the transport for the owning peer, or `None` when the key
    /// resolves to the local node or no peers are configured; both mean
    /// "load locally".
    fn pick(&self, key: &str) -> Option<Arc<dyn PeerTransport>>;
}
