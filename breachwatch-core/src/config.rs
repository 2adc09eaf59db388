//! Configuration types

use crate::{BreachError, BreachResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default cache byte budget in megabytes.
pub const DEFAULT_CACHE_SIZE_MB: usize = 100;

/// Assumed footprint of one cache entry, used to turn the byte budget into an
/// entry count.
pub const DEFAULT_CACHE_ENTRY_BYTES: usize = 1024;

/// Upserts per bulk request. Stays under the store's per-request operation cap.
pub const DEFAULT_BATCH_SIZE: usize = 950;

/// Default LMDB map size in megabytes.
pub const DEFAULT_STORE_MAP_SIZE_MB: usize = 10 * 1024;

/// Master configuration for the lookup cache, ingestion and the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachConfig {
    /// Cache byte budget in megabytes.
    pub cache_size_mb: usize,
    /// Assumed bytes per cached entry.
    pub cache_entry_bytes: usize,
    /// Upserts per bulk request.
    pub batch_size: usize,
    /// Directory holding the LMDB environment.
    pub store_path: PathBuf,
    /// LMDB map size in megabytes.
    pub store_map_size_mb: usize,
}

impl Default for BreachConfig {
    fn default() -> Self {
        Self {
            cache_size_mb: DEFAULT_CACHE_SIZE_MB,
            cache_entry_bytes: DEFAULT_CACHE_ENTRY_BYTES,
            batch_size: DEFAULT_BATCH_SIZE,
            store_path: PathBuf::from("./data/breaches"),
            store_map_size_mb: DEFAULT_STORE_MAP_SIZE_MB,
        }
    }
}

impl BreachConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_size_mb(mut self, mb: usize) -> Self {
        self.cache_size_mb = mb;
        self
    }

    pub fn with_cache_entry_bytes(mut self, bytes: usize) -> Self {
        self.cache_entry_bytes = bytes;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_store_map_size_mb(mut self, mb: usize) -> Self {
        self.store_map_size_mb = mb;
        self
    }

    /// Maximum number of cache entries the byte budget allows.
    pub fn cache_capacity(&self) -> usize {
        if self.cache_entry_bytes == 0 {
            return 0;
        }
        self.cache_size_mb.saturating_mul(1024 * 1024) / self.cache_entry_bytes
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - the cache budget yields at least one entry
    /// - batch_size > 0
    /// - store_map_size_mb > 0
    /// - store_path is not empty
    pub fn validate(&self) -> BreachResult<()> {
        if self.cache_entry_bytes == 0 {
            return Err(invalid(
                "cache_entry_bytes",
                self.cache_entry_bytes.to_string(),
                "cache_entry_bytes must be greater than 0",
            ));
        }

        if self.cache_capacity() == 0 {
            return Err(invalid(
                "cache_size_mb",
                self.cache_size_mb.to_string(),
                "cache budget must hold at least one entry",
            ));
        }

        if self.batch_size == 0 {
            return Err(invalid(
                "batch_size",
                self.batch_size.to_string(),
                "batch_size must be greater than 0",
            ));
        }

        if self.store_map_size_mb == 0 {
            return Err(invalid(
                "store_map_size_mb",
                self.store_map_size_mb.to_string(),
                "store_map_size_mb must be greater than 0",
            ));
        }

        if self.store_path.as_os_str().is_empty() {
            return Err(BreachError::Config(ConfigError::MissingRequired {
                field: "store_path".to_string(),
            }));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: String, reason: &str) -> BreachError {
    BreachError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}
