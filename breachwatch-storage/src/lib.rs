//! breachwatch Storage - Store Trait, Stores and Lookup Cache
//!
//! Defines the authoritative store abstraction (identifier → breach set),
//! an in-memory store for tests, the LMDB-backed production store, and the
//! read-through lookup cache that fronts it.

pub mod cache;
pub mod lmdb;
pub mod metrics;

pub use cache::{CacheStats, LookupCache, LruIndex};
pub use lmdb::{LmdbBreachStore, LmdbStoreError};
pub use metrics::{MetricsSink, NoopMetrics};

use async_trait::async_trait;
use breachwatch_core::{
    BreachError, BreachRecord, BreachResult, BulkWriteSummary, Identifier, StorageError, UpsertOp,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Durable identifier → set-of-tags mapping.
///
/// Implementations must apply each `bulk_upsert` batch atomically with
/// set-union semantics, so concurrent ingestion runs that touch overlapping
/// identifiers never lose a tag.
#[async_trait]
pub trait BreachStore: Send + Sync {
    /// Point lookup. `None` means no record exists for the identifier.
    async fn find_by_key(&self, identifier: &Identifier) -> BreachResult<Option<Vec<String>>>;

    /// For each operation: add the tag to the identifier's set, creating the
    /// record when absent. Adding a tag that is already present is a no-op.
    async fn bulk_upsert(&self, batch: &[UpsertOp]) -> BreachResult<BulkWriteSummary>;

    /// Every record's tag list, in store order.
    async fn list_all(&self) -> BreachResult<Vec<Vec<String>>>;

    /// Number of records held.
    async fn record_count(&self) -> BreachResult<u64>;

    /// Release the store. Later operations fail with `StorageError::Unavailable`.
    async fn close(&self) -> BreachResult<()>;

    /// The de-duplicated global breach catalog, sorted.
    async fn catalog(&self) -> BreachResult<Vec<String>> {
        let unique: BTreeSet<String> = self.list_all().await?.into_iter().flatten().collect();
        Ok(unique.into_iter().collect())
    }
}

// ============================================================================
// MOCK STORE
// ============================================================================

/// In-memory store for testing.
///
/// Counts reads and bulk calls and can be told to fail specific bulk calls
/// or to behave as unreachable.
#[derive(Debug, Default)]
pub struct MockStore {
    records: RwLock<HashMap<Identifier, BreachRecord>>,
    reads: AtomicUsize,
    bulk_calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    // 1-based bulk call numbers that should be rejected
    failing_calls: Mutex<HashSet<usize>>,
    unavailable: AtomicBool,
    closed: AtomicBool,
}

impl MockStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing upsert accounting.
    pub fn insert_record(&self, identifier: Identifier, breaches: Vec<String>) {
        if let Ok(mut records) = self.records.write() {
            let record = BreachRecord {
                identifier: identifier.clone(),
                breaches,
            };
            records.insert(identifier, record);
        }
    }

    /// Current tag list for an identifier, without counting a read.
    pub fn record(&self, identifier: &Identifier) -> Option<Vec<String>> {
        self.records
            .read()
            .ok()
            .and_then(|records| records.get(identifier).map(|r| r.breaches.clone()))
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `find_by_key` calls served or attempted.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `bulk_upsert` calls received, failed ones included.
    pub fn bulk_call_count(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    /// Size of every batch received, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes
            .lock()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }

    /// Reject the `call`-th bulk upsert (1-based) without applying it.
    pub fn fail_bulk_call(&self, call: usize) {
        if let Ok(mut failing) = self.failing_calls.lock() {
            failing.insert(call);
        }
    }

    /// Make every operation fail with `StorageError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_reachable(&self) -> BreachResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "store closed".to_string(),
            }
            .into());
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "mock store unreachable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl BreachStore for MockStore {
    async fn find_by_key(&self, identifier: &Identifier) -> BreachResult<Option<Vec<String>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.ensure_reachable()?;
        let records = self
            .records
            .read()
            .map_err(|_| BreachError::Storage(StorageError::LockPoisoned))?;
        Ok(records.get(identifier).map(|r| r.breaches.clone()))
    }

    async fn bulk_upsert(&self, batch: &[UpsertOp]) -> BreachResult<BulkWriteSummary> {
        let call = self.bulk_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut sizes) = self.batch_sizes.lock() {
            sizes.push(batch.len());
        }
        self.ensure_reachable()?;

        let should_fail = self
            .failing_calls
            .lock()
            .map_err(|_| BreachError::Storage(StorageError::LockPoisoned))?
            .contains(&call);
        if should_fail {
            return Err(StorageError::Rejected {
                operation: "bulk_upsert".to_string(),
                reason: format!("injected failure on call {}", call),
            }
            .into());
        }

        let mut records = self
            .records
            .write()
            .map_err(|_| BreachError::Storage(StorageError::LockPoisoned))?;

        let mut summary = BulkWriteSummary::default();
        for op in batch {
            match records.get_mut(&op.identifier) {
                Some(record) => {
                    summary.matched += 1;
                    if record.add_breach(&op.tag) {
                        summary.modified += 1;
                    }
                }
                None => {
                    let mut record = BreachRecord::new(op.identifier.clone());
                    record.add_breach(&op.tag);
                    records.insert(op.identifier.clone(), record);
                    summary.upserted += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn list_all(&self) -> BreachResult<Vec<Vec<String>>> {
        self.ensure_reachable()?;
        let records = self
            .records
            .read()
            .map_err(|_| BreachError::Storage(StorageError::LockPoisoned))?;
        Ok(records.values().map(|r| r.breaches.clone()).collect())
    }

    async fn record_count(&self) -> BreachResult<u64> {
        self.ensure_reachable()?;
        Ok(self.len() as u64)
    }

    async fn close(&self) -> BreachResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "mock store unreachable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
