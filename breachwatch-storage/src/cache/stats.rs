//! Cache statistics snapshot.

use serde::{Deserialize, Serialize};

/// Point-in-time view of a [`LookupCache`](super::LookupCache).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that went to the store.
    pub misses: u64,
    /// Entries currently held.
    pub entry_count: u64,
    /// Maximum entries the cache may hold.
    pub capacity: u64,
    /// Entries displaced by newer ones.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }
}
