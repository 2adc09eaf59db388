//! Read-through lookup cache.
//!
//! [`LookupCache`] fronts a [`BreachStore`](crate::BreachStore) point lookup
//! with a bounded LRU. On a miss it reads the store itself and keeps the
//! result, including "no record", so repeat lookups for unknown identifiers
//! are served from memory too.
//!
//! # Consistency
//!
//! Entries are not invalidated by ingestion. A cached snapshot reflects the
//! last store read for that identifier and can lag behind a concurrent
//! ingestion run until it is evicted.
//!
//! # Locking
//!
//! One mutex guards the LRU index. It is taken for the hit-path recency bump
//! and for the post-miss insertion, never across the store round-trip.

pub mod lookup;
pub mod lru;
pub mod stats;

pub use lookup::LookupCache;
pub use lru::LruIndex;
pub use stats::CacheStats;
