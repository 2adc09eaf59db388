//! breachwatch Core - Identifier and Record Types
//!
//! Plain data structures shared by every other crate: the validated
//! identifier and tag newtypes, the stored record shape, bulk-write
//! bookkeeping, the error tree and configuration.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;

pub mod config;
pub mod error;

pub use config::BreachConfig;
pub use error::{
    BreachError, BreachResult, ConfigError, SourceError, StorageError, ValidationError,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Anchored pattern every stored identifier must satisfy.
pub const STRICT_IDENTIFIER_PATTERN: &str = r"^[a-zA-Z0-9.%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Longest identifier accepted, in bytes (the RFC 5321 path limit). Keeps
/// every key well under LMDB's 511-byte key ceiling.
pub const MAX_IDENTIFIER_LEN: usize = 254;

static STRICT_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(STRICT_IDENTIFIER_PATTERN).expect("Invalid identifier regex"));

/// Check a raw string against the strict identifier pattern and length cap.
pub fn is_valid_identifier(raw: &str) -> bool {
    raw.len() <= MAX_IDENTIFIER_LEN && STRICT_IDENTIFIER.is_match(raw)
}

/// A lookup/merge key (an email-like string).
///
/// Case-sensitive as stored; no folding or trimming happens here. Callers
/// that scrape raw text go through the extractor, which sanitizes first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validate and wrap a raw identifier.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "identifier".to_string(),
            });
        }
        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(ValidationError::InvalidValue {
                field: "identifier".to_string(),
                reason: format!(
                    "{} bytes exceeds the {}-byte limit",
                    raw.len(),
                    MAX_IDENTIFIER_LEN
                ),
            });
        }
        if !is_valid_identifier(&raw) {
            return Err(ValidationError::InvalidValue {
                field: "identifier".to_string(),
                reason: format!("'{}' is not a well-formed identifier", raw),
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A breach/source label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Validate and wrap a breach label. Empty or blank labels are rejected.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "tag".to_string(),
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Tag {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Tag::parse(value)
    }
}

impl From<Tag> for String {
    fn from(value: Tag) -> Self {
        value.0
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// The stored unit: one identifier and the breaches it appeared in.
///
/// `breaches` behaves as a set (no duplicates) but keeps first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachRecord {
    pub identifier: Identifier,
    pub breaches: Vec<String>,
}

impl BreachRecord {
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            breaches: Vec::new(),
        }
    }

    /// Add a tag to the set. Returns false when it was already present.
    pub fn add_breach(&mut self, tag: &Tag) -> bool {
        merge_tag(&mut self.breaches, tag)
    }
}

/// Set-union a tag into an ordered tag list. Returns true if the list changed.
pub fn merge_tag(breaches: &mut Vec<String>, tag: &Tag) -> bool {
    if breaches.iter().any(|b| b == tag.as_str()) {
        return false;
    }
    breaches.push(tag.as_str().to_string());
    true
}

/// One pending "add tag to identifier's set, create if absent" operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpsertOp {
    pub identifier: Identifier,
    pub tag: Tag,
}

impl UpsertOp {
    pub fn new(identifier: Identifier, tag: Tag) -> Self {
        Self { identifier, tag }
    }
}

/// Acknowledgement counts for a bulk upsert.
///
/// - `matched`: operations whose identifier already had a record
/// - `modified`: matched records whose tag set actually grew
/// - `upserted`: records created by the operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkWriteSummary {
    pub matched: u64,
    pub modified: u64,
    pub upserted: u64,
}

impl BulkWriteSummary {
    /// Number of operations the summary accounts for.
    pub fn acknowledged(&self) -> u64 {
        self.matched + self.upserted
    }
}

impl AddAssign for BulkWriteSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.matched += rhs.matched;
        self.modified += rhs.modified;
        self.upserted += rhs.upserted;
    }
}
