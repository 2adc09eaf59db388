//! breachwatch Test Utilities
//!
//! Shared test infrastructure for the breachwatch workspace:
//! - Proptest generators for identifiers, tags and dump text
//! - A metrics sink that records every call
//! - Fixtures for common scenarios
//! - Assertions for breachwatch error kinds

// Re-export mock storage from its source crate
pub use breachwatch_storage::MockStore;

pub use breachwatch_core::{
    BreachConfig, BreachError, BreachResult, ConfigError, Identifier, StorageError, Tag,
    ValidationError,
};

use breachwatch_storage::MetricsSink;
use std::collections::HashMap;
use std::sync::Mutex;

// ============================================================================
// RECORDING METRICS
// ============================================================================

/// Metrics sink that keeps every counter increment and observation.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    // name -> (total, number of increment calls)
    counters: Mutex<HashMap<&'static str, (u64, usize)>>,
    observations: Mutex<HashMap<&'static str, Vec<f64>>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter; zero if never touched.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.get(name).map(|(total, _)| *total).unwrap_or(0))
            .unwrap_or(0)
    }

    /// How many increment calls reached a counter.
    pub fn counter_calls(&self, name: &str) -> usize {
        self.counters
            .lock()
            .map(|c| c.get(name).map(|(_, calls)| *calls).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Every value observed for a histogram, in call order.
    pub fn observations(&self, name: &str) -> Vec<f64> {
        self.observations
            .lock()
            .map(|o| o.get(name).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl MetricsSink for RecordingMetrics {
    fn inc_counter(&self, name: &'static str) {
        self.inc_counter_by(name, 1);
    }

    fn inc_counter_by(&self, name: &'static str, by: u64) {
        if let Ok(mut counters) = self.counters.lock() {
            let entry = counters.entry(name).or_default();
            entry.0 += by;
            entry.1 += 1;
        }
    }

    fn observe(&self, name: &'static str, value: f64) {
        if let Ok(mut observations) = self.observations.lock() {
            observations.entry(name).or_default().push(value);
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for breachwatch types.

    use super::*;
    use proptest::prelude::*;

    /// Raw string that passes the strict identifier check.
    pub fn arb_identifier_string() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9.+-]{0,11}@[a-z0-9]{1,10}\\.[a-z]{2,4}"
    }

    /// Non-blank breach label.
    pub fn arb_tag() -> impl Strategy<Value = Tag> {
        "[A-Za-z0-9][A-Za-z0-9 _.-]{0,23}"
            .prop_map(|raw| Tag::parse(raw).expect("generator yields non-blank tags"))
    }

    /// Identifier list with deliberate repeats.
    pub fn arb_identifiers_with_duplicates(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_identifier_string(), 1..=max.max(1)).prop_flat_map(|pool| {
            let len = pool.len();
            prop::collection::vec(0..len, 0..len * 3 + 1)
                .prop_map(move |picks| picks.into_iter().map(|i| pool[i].clone()).collect())
        })
    }

    /// One dump line: an identifier buried in combo-list noise.
    pub fn arb_dump_line() -> impl Strategy<Value = (String, String)> {
        (
            arb_identifier_string(),
            prop_oneof![
                Just(("".to_string(), "".to_string())),
                "[a-zA-Z0-9]{1,12}".prop_map(|pw| ("".to_string(), format!(":{}", pw))),
                "[a-zA-Z0-9]{1,12}".prop_map(|pw| ("".to_string(), format!(";{}", pw))),
                "[a-z]{1,8}".prop_map(|prefix| (format!("{} ", prefix), "".to_string())),
            ],
        )
            .prop_map(|(identifier, (prefix, suffix))| {
                let line = format!("{}{}{}", prefix, identifier, suffix);
                (line, identifier)
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// `count` distinct, sortable identifiers (`user00000@example.com`, ...).
    pub fn identifiers(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("user{:05}@example.com", i))
            .collect()
    }

    pub fn identifier(raw: &str) -> Identifier {
        Identifier::parse(raw).expect("fixture identifier must be valid")
    }

    pub fn tag(raw: &str) -> Tag {
        Tag::parse(raw).expect("fixture tag must be non-blank")
    }

    /// Small combo-list style dump with noise, duplicates and one invalid
    /// address. Holds four distinct valid identifiers.
    pub fn sample_dump() -> &'static str {
        "alice@example.com:hunter2\n\
         # exported 2024-01-01\n\
         bob.smith+lists@mail.example.org;pa55\n\
         carol_underscore@example.com:nope\n\
         ALICE@example.com:other\n\
         alice@example.com:hunter2\n\
         dave@example.co.uk\n"
    }

    /// Store seeded with one record per `(identifier, tags)` pair.
    pub fn seeded_store(records: &[(&str, &[&str])]) -> MockStore {
        let store = MockStore::new();
        for (raw, tags) in records {
            store.insert_record(
                identifier(raw),
                tags.iter().map(|t| t.to_string()).collect(),
            );
        }
        store
    }

    /// Config with a tiny cache and batch size for exercising edges.
    pub fn small_config() -> BreachConfig {
        BreachConfig::new()
            .with_cache_size_mb(1)
            .with_cache_entry_bytes(1024 * 1024 / 4)
            .with_batch_size(3)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for breachwatch results.

    use super::*;
    use std::collections::BTreeSet;

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &BreachResult<T>) {
        match result {
            Err(BreachError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a lookup found no record for `identifier`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &BreachResult<T>, identifier: &str) {
        match result {
            Err(BreachError::Storage(StorageError::NotFound { identifier: id })) => {
                assert_eq!(id, identifier, "Wrong identifier in NotFound error");
            }
            other => panic!("Expected NotFound error for {}, got: {:?}", identifier, other),
        }
    }

    #[track_caller]
    pub fn assert_unavailable<T: std::fmt::Debug>(result: &BreachResult<T>) {
        match result {
            Err(BreachError::Storage(StorageError::Unavailable { .. })) => {}
            other => panic!("Expected Unavailable error, got: {:?}", other),
        }
    }

    /// Assert that a stored tag list equals `expected` as a set.
    #[track_caller]
    pub fn assert_tag_set(actual: &[String], expected: &[&str]) {
        let actual_set: BTreeSet<&str> = actual.iter().map(String::as_str).collect();
        let expected_set: BTreeSet<&str> = expected.iter().copied().collect();
        assert_eq!(actual_set, expected_set, "tag sets differ");
        assert_eq!(actual.len(), actual_set.len(), "tag list has duplicates: {:?}", actual);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_recording_metrics() {
        let metrics = RecordingMetrics::new();
        metrics.inc_counter("a");
        metrics.inc_counter_by("a", 4);
        metrics.observe("h", 0.5);
        assert_eq!(metrics.counter("a"), 5);
        assert_eq!(metrics.counter_calls("a"), 2);
        assert_eq!(metrics.counter("missing"), 0);
        assert_eq!(metrics.observations("h"), vec![0.5]);
    }

    #[test]
    fn test_fixture_identifiers_are_valid_and_distinct() {
        let ids = fixtures::identifiers(50);
        let unique: std::collections::BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 50);
        assert!(ids.iter().all(|raw| Identifier::parse(raw.as_str()).is_ok()));
    }

    proptest! {
        #[test]
        fn prop_generated_identifiers_are_valid(raw in generators::arb_identifier_string()) {
            prop_assert!(Identifier::parse(raw).is_ok());
        }
    }
}
