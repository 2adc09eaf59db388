//! Read-through lookup cache over a [`BreachStore`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use breachwatch_core::{BreachConfig, BreachResult, Identifier, StorageError};
use tracing::debug;

use super::lru::LruIndex;
use super::stats::CacheStats;
use crate::metrics::{
    MetricsSink, CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, LOOKUP_DURATION_SECONDS,
    LOOKUP_REQUESTS_TOTAL,
};
use crate::BreachStore;

/// Cached store answer. `None` records that the store had no such identifier.
type Snapshot = Option<Vec<String>>;

/// Bounded LRU in front of a store's point lookup.
///
/// Every [`get`](Self::get) counts one request, one hit or one miss, and one
/// latency observation on the injected [`MetricsSink`]. Concurrent misses on
/// the same identifier are not coalesced; each reads the store and the last
/// insertion wins.
pub struct LookupCache<S: BreachStore> {
    store: Arc<S>,
    entries: Mutex<LruIndex<Identifier, Snapshot>>,
    metrics: Arc<dyn MetricsSink>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<S: BreachStore> LookupCache<S> {
    /// Create a cache holding at most `capacity` identifiers.
    pub fn new(store: Arc<S>, capacity: usize, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            store,
            entries: Mutex::new(LruIndex::new(capacity)),
            metrics,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a cache sized from the configured byte budget.
    pub fn from_config(store: Arc<S>, config: &BreachConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self::new(store, config.cache_capacity(), metrics)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Look up the breach tags for an identifier.
    ///
    /// `Ok(None)` means the store holds no record. A store failure is
    /// returned unchanged and leaves the cache untouched.
    pub async fn get(&self, identifier: &Identifier) -> BreachResult<Option<Vec<String>>> {
        let started = Instant::now();
        self.metrics.inc_counter(LOOKUP_REQUESTS_TOTAL);

        let result = self.read_through(identifier).await;

        self.metrics
            .observe(LOOKUP_DURATION_SECONDS, started.elapsed().as_secs_f64());
        result
    }

    /// Like [`get`](Self::get), but a missing record is
    /// `StorageError::NotFound`.
    ///
    /// An existing record with no tags is `Ok` with an empty list.
    pub async fn find_breaches(&self, identifier: &Identifier) -> BreachResult<Vec<String>> {
        match self.get(identifier).await? {
            Some(breaches) => Ok(breaches),
            None => Err(StorageError::NotFound {
                identifier: identifier.as_str().to_string(),
            }
            .into()),
        }
    }

    /// Whether an identifier is cached. Does not touch recency or counters.
    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains(identifier))
            .unwrap_or(false)
    }

    pub fn stats(&self) -> CacheStats {
        let (entry_count, capacity) = self
            .entries
            .lock()
            .map(|entries| (entries.len() as u64, entries.capacity() as u64))
            .unwrap_or_default();

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            capacity,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    async fn read_through(&self, identifier: &Identifier) -> BreachResult<Snapshot> {
        if let Some(snapshot) = self.with_entries(|entries| entries.get(identifier).cloned())? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.metrics.inc_counter(CACHE_HITS_TOTAL);
            debug!(identifier = %identifier, "cache hit");
            return Ok(snapshot);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_counter(CACHE_MISSES_TOTAL);
        debug!(identifier = %identifier, "cache miss");

        // Lock is released here; the store round-trip runs unguarded.
        let fetched = self.store.find_by_key(identifier).await?;

        let evicted =
            self.with_entries(|entries| entries.put(identifier.clone(), fetched.clone()))?;
        if let Some((evicted, _)) = evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(identifier = %evicted, "cache eviction");
        }

        Ok(fetched)
    }

    fn with_entries<R>(
        &self,
        f: impl FnOnce(&mut LruIndex<Identifier, Snapshot>) -> R,
    ) -> BreachResult<R> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(f(&mut entries))
    }
}

impl<S: BreachStore> std::fmt::Debug for LookupCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
