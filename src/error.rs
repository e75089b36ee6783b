//! Error types for the cache engine.
//!
//! Errors are cheap, clonable values: a single-flight load fans its result
//! out to every coalesced caller, so the error side of that result must be
//! clonable too.

use thiserror::Error;

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by cache operations.
///
/// Peer-fetch failures are recovered internally by falling back to the
/// local loader, so [`Error::PeerFetch`] only reaches callers that invoke
/// a [`PeerTransport`](crate::PeerTransport) directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An empty key was supplied to a group lookup.
    #[error("key is required")]
    EmptyKey,

    /// The backend has no value for this key.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The backend loader failed.
    #[error("load failed: {0}")]
    Load(String),

    /// A remote peer could not serve the requested value.
    #[error("peer fetch failed: {0}")]
    PeerFetch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(Error::EmptyKey.to_string(), "key is required");
        assert_eq!(
            Error::NotFound("Tom".to_owned()).to_string(),
            "key not found: Tom"
        );
        assert_eq!(
            Error::PeerFetch("connection refused".to_owned()).to_string(),
            "peer fetch failed: connection refused"
        );
    }

    #[test]
    fn test_errors_are_clonable_and_comparable() {
        let err = Error::Load("backend down".to_owned());
        assert_eq!(err.clone(), err);
        assert_ne!(err, Error::EmptyKey);
    }
}
