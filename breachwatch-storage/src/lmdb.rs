//! LMDB-backed authoritative store.
//!
//! Uses the heed crate (Rust bindings for LMDB). One unnamed database maps
//! the identifier string to a JSON array of breach tags.
//!
//! # Atomicity
//!
//! Each `bulk_upsert` batch runs inside a single write transaction. LMDB
//! serializes writers, so concurrent ingestion runs touching the same
//! identifier merge into one another instead of overwriting.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use breachwatch_core::{
    merge_tag, BreachConfig, BreachError, BreachResult, BulkWriteSummary, Identifier,
    StorageError, UpsertOp,
};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use tracing::{debug, info};

use crate::BreachStore;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Tag list could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored value is not a tag list.
    #[error("Corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for BreachError {
    fn from(e: LmdbStoreError) -> Self {
        let storage = match e {
            LmdbStoreError::EnvOpen(_) | LmdbStoreError::DbOpen(_) | LmdbStoreError::Io(_) => {
                StorageError::Unavailable {
                    reason: e.to_string(),
                }
            }
            LmdbStoreError::Corrupt { key, reason } => StorageError::Corrupt {
                identifier: key,
                reason,
            },
            LmdbStoreError::Transaction(_) | LmdbStoreError::Serialization(_) => {
                StorageError::Rejected {
                    operation: "lmdb".to_string(),
                    reason: e.to_string(),
                }
            }
        };
        BreachError::Storage(storage)
    }
}

/// Durable breach store on a local LMDB environment.
pub struct LmdbBreachStore {
    env: Env,
    db: Database<Str, Bytes>,
    closed: AtomicBool,
}

impl LmdbBreachStore {
    /// Open (or create) the store under `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - `map_size_mb` does not fit in a byte count
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, map_size_mb: usize) -> Result<Self, LmdbStoreError> {
        let map_size = map_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            LmdbStoreError::EnvOpen(format!("map size of {} MB overflows", map_size_mb))
        })?;

        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        info!(path = %path.as_ref().display(), map_size_mb, "opened breach store");

        Ok(Self {
            env,
            db,
            closed: AtomicBool::new(false),
        })
    }

    /// Open the store at the configured path and map size.
    pub fn from_config(config: &BreachConfig) -> BreachResult<Self> {
        Ok(Self::open(&config.store_path, config.store_map_size_mb)?)
    }

    fn ensure_open(&self) -> BreachResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "store closed".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn decode_tags(key: &str, bytes: &[u8]) -> Result<Vec<String>, LmdbStoreError> {
    serde_json::from_slice(bytes).map_err(|e| LmdbStoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn encode_tags(tags: &[String]) -> Result<Vec<u8>, LmdbStoreError> {
    serde_json::to_vec(tags).map_err(|e| LmdbStoreError::Serialization(e.to_string()))
}

#[async_trait]
impl BreachStore for LmdbBreachStore {
    async fn find_by_key(&self, identifier: &Identifier) -> BreachResult<Option<Vec<String>>> {
        self.ensure_open()?;
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let found = self
            .db
            .get(&rtxn, identifier.as_str())
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        match found {
            Some(bytes) => Ok(Some(decode_tags(identifier.as_str(), bytes)?)),
            None => Ok(None),
        }
    }

    async fn bulk_upsert(&self, batch: &[UpsertOp]) -> BreachResult<BulkWriteSummary> {
        self.ensure_open()?;
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut summary = BulkWriteSummary::default();
        for op in batch {
            let key = op.identifier.as_str();
            let existing = self
                .db
                .get(&wtxn, key)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
                .map(|bytes| decode_tags(key, bytes))
                .transpose()?;

            let tags = match existing {
                Some(mut tags) => {
                    summary.matched += 1;
                    if !merge_tag(&mut tags, &op.tag) {
                        continue;
                    }
                    summary.modified += 1;
                    tags
                }
                None => {
                    summary.upserted += 1;
                    vec![op.tag.as_str().to_string()]
                }
            };

            self.db
                .put(&mut wtxn, key, &encode_tags(&tags)?)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        }

        // Dropping an uncommitted txn aborts it, so an error above leaves
        // the whole batch unapplied.
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        debug!(
            size = batch.len(),
            matched = summary.matched,
            modified = summary.modified,
            upserted = summary.upserted,
            "bulk upsert committed"
        );
        Ok(summary)
    }

    async fn list_all(&self) -> BreachResult<Vec<Vec<String>>> {
        self.ensure_open()?;
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut all = Vec::new();
        for entry in iter {
            let (key, bytes) = entry.map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            all.push(decode_tags(key, bytes)?);
        }
        Ok(all)
    }

    async fn record_count(&self) -> BreachResult<u64> {
        self.ensure_open()?;
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(self
            .db
            .len(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?)
    }

    async fn close(&self) -> BreachResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.env
            .force_sync()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        info!("closed breach store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breachwatch_core::Tag;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbBreachStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store =
            LmdbBreachStore::open(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).unwrap()
    }

    fn op(raw: &str, tag: &str) -> UpsertOp {
        UpsertOp::new(id(raw), Tag::parse(tag).unwrap())
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.find_by_key(&id("a@example.com")).await.unwrap(), None);
        assert_eq!(store.record_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_creates_then_unions() {
        let (store, _dir) = create_test_store();

        let first = store
            .bulk_upsert(&[op("a@example.com", "tagY"), op("b@example.com", "tagY")])
            .await
            .unwrap();
        assert_eq!(first.upserted, 2);
        assert_eq!(first.matched, 0);

        let second = store
            .bulk_upsert(&[op("a@example.com", "tagZ"), op("b@example.com", "tagY")])
            .await
            .unwrap();
        assert_eq!(second.matched, 2);
        assert_eq!(second.modified, 1);
        assert_eq!(second.upserted, 0);

        assert_eq!(
            store.find_by_key(&id("a@example.com")).await.unwrap(),
            Some(vec!["tagY".to_string(), "tagZ".to_string()])
        );
        assert_eq!(
            store.find_by_key(&id("b@example.com")).await.unwrap(),
            Some(vec!["tagY".to_string()])
        );
        assert_eq!(store.record_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_catalog_over_all_records() {
        let (store, _dir) = create_test_store();
        store
            .bulk_upsert(&[op("a@example.com", "beta"), op("b@example.com", "alpha")])
            .await
            .unwrap();
        store.bulk_upsert(&[op("a@example.com", "alpha")]).await.unwrap();

        assert_eq!(store.list_all().await.unwrap().len(), 2);
        assert_eq!(store.catalog().await.unwrap(), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = LmdbBreachStore::open(temp_dir.path(), 10).unwrap();
            store.bulk_upsert(&[op("a@example.com", "t")]).await.unwrap();
            store.close().await.unwrap();
        }

        let store = LmdbBreachStore::open(temp_dir.path(), 10).unwrap();
        assert_eq!(
            store.find_by_key(&id("a@example.com")).await.unwrap(),
            Some(vec!["t".to_string()])
        );
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let (store, _dir) = create_test_store();
        store.close().await.unwrap();
        // second close is a no-op
        store.close().await.unwrap();

        let err = store.find_by_key(&id("a@example.com")).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.bulk_upsert(&[op("a@example.com", "t")]).await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_value_reported() {
        let (store, _dir) = create_test_store();
        {
            let mut wtxn = store.env.write_txn().unwrap();
            store.db.put(&mut wtxn, "a@example.com", b"not json").unwrap();
            wtxn.commit().unwrap();
        }

        let err = store.find_by_key(&id("a@example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            BreachError::Storage(StorageError::Corrupt { ref identifier, .. }) if identifier == "a@example.com"
        ));
    }

    #[test]
    fn test_oversized_map_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let result = LmdbBreachStore::open(temp_dir.path(), usize::MAX);
        assert!(matches!(result, Err(LmdbStoreError::EnvOpen(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_keep_every_tag() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let keys: Vec<String> = (0..40).map(|i| format!("user{:03}@example.com", i)).collect();

        let mut handles = Vec::new();
        for tag in ["t1", "t2", "t3", "t4"] {
            let store = store.clone();
            let keys = keys.clone();
            handles.push(tokio::spawn(async move {
                for chunk in keys.chunks(7) {
                    let batch: Vec<UpsertOp> = chunk.iter().map(|k| op(k, tag)).collect();
                    store.bulk_upsert(&batch).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.record_count().await.unwrap(), 40);
        for key in &keys {
            let mut tags = store.find_by_key(&id(key)).await.unwrap().unwrap();
            tags.sort();
            assert_eq!(tags, vec!["t1", "t2", "t3", "t4"]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_batch_applies_nothing() {
        let (store, _dir) = create_test_store();
        {
            let mut wtxn = store.env.write_txn().unwrap();
            store.db.put(&mut wtxn, "b@example.com", b"not json").unwrap();
            wtxn.commit().unwrap();
        }

        let result = store
            .bulk_upsert(&[
                op("a@example.com", "t"),
                op("b@example.com", "t"),
                op("c@example.com", "t"),
            ])
            .await;

        assert!(matches!(
            result,
            Err(BreachError::Storage(StorageError::Corrupt { .. }))
        ));
        // the op before the failure was rolled back with the rest
        assert_eq!(store.find_by_key(&id("a@example.com")).await.unwrap(), None);
        assert_eq!(store.find_by_key(&id("c@example.com")).await.unwrap(), None);
        assert_eq!(store.record_count().await.unwrap(), 1);
    }

    #[test]
    fn test_error_conversion() {
        let err: BreachError = LmdbStoreError::EnvOpen("boom".into()).into();
        assert!(err.is_retryable());

        let err: BreachError = LmdbStoreError::Transaction("full".into()).into();
        assert!(matches!(
            err,
            BreachError::Storage(StorageError::Rejected { .. })
        ));
    }
}
