//! Error types for breachwatch operations

use thiserror::Error;

/// Authoritative store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("No record found for identifier {identifier}")]
    NotFound { identifier: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Store rejected {operation}: {reason}")]
    Rejected { operation: String, reason: String },

    #[error("Corrupt record for {identifier}: {reason}")]
    Corrupt { identifier: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors raised while reading a breach dump.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Failed to read {source_name}: {reason}")]
    Read { source_name: String, reason: String },
}

impl SourceError {
    /// Wrap an I/O error raised while reading `source_name`.
    pub fn read(source_name: impl Into<String>, err: &std::io::Error) -> Self {
        SourceError::Read {
            source_name: source_name.into(),
            reason: err.to_string(),
        }
    }
}

/// Master error type for all breachwatch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BreachError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

impl BreachError {
    /// True when the store holds no record at all for the identifier.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BreachError::Storage(StorageError::NotFound { .. }))
    }

    /// True for transient failures the caller should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BreachError::Storage(StorageError::Unavailable { .. }))
    }

    /// True for malformed or missing input.
    pub fn is_validation(&self) -> bool {
        matches!(self, BreachError::Validation(_))
    }
}

/// Result type alias for breachwatch operations.
pub type BreachResult<T> = Result<T, BreachError>;

// =============================================================================
// TESTS
// =============================================================================
