//! Cache configuration structures.
//!
//! Each store is created from its configuration struct, the single entry
//! point for construction parameters.

use core::fmt;

/// Configuration for a byte-budgeted LRU store.
///
/// # Examples
///
/// ```
/// use meshcache::LruConfig;
///
/// let config = LruConfig::new(64 * 1024);
/// assert_eq!(config.max_bytes(), 64 * 1024);
///
/// // A zero budget disables eviction entirely.
/// assert_eq!(LruConfig::unbounded().max_bytes(), 0);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct LruConfig {
    /// Resident-byte budget; `0` means unbounded.
    max_bytes: usize,
}

impl LruConfig {
    /// Creates a configuration with the given resident-byte budget.
    ///
    /// A budget of `0` disables eviction. An entry is charged
    /// `key.len() + value.size()` bytes.
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Creates a configuration with no byte budget.
    pub fn unbounded() -> Self {
        Self { max_bytes: 0 }
    }

    /// Returns the configured byte budget (`0` = unbounded).
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

impl fmt::Debug for LruConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruConfig")
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = LruConfig::new(100);
        assert_eq!(config.max_bytes(), 100);
    }

    #[test]
    fn test_unbounded_is_zero() {
        assert_eq!(LruConfig::unbounded(), LruConfig::new(0));
        assert_eq!(LruConfig::default().max_bytes(), 0);
    }
}
