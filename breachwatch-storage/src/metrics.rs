//! Metrics sink abstraction.
//!
//! Components record through an injected [`MetricsSink`] instead of touching
//! a global registry, so tests can count calls with a double while the binary
//! maps every name onto one process-wide Prometheus registry.

use std::sync::Arc;

/// Every `LookupCache::get` call.
pub const LOOKUP_REQUESTS_TOTAL: &str = "breachwatch_lookup_requests_total";
/// Lookups answered from the cache.
pub const CACHE_HITS_TOTAL: &str = "breachwatch_cache_hits_total";
/// Lookups that went to the store.
pub const CACHE_MISSES_TOTAL: &str = "breachwatch_cache_misses_total";
/// Wall-clock duration of each lookup, in seconds.
pub const LOOKUP_DURATION_SECONDS: &str = "breachwatch_lookup_duration_seconds";

/// Bulk upsert batches acknowledged by the store.
pub const INGEST_BATCHES_SUCCEEDED_TOTAL: &str = "breachwatch_ingest_batches_succeeded_total";
/// Bulk upsert batches the store failed.
pub const INGEST_BATCHES_FAILED_TOTAL: &str = "breachwatch_ingest_batches_failed_total";
/// Identifiers carried by acknowledged batches.
pub const INGEST_IDENTIFIERS_SUCCEEDED_TOTAL: &str =
    "breachwatch_ingest_identifiers_succeeded_total";
/// Identifiers carried by failed batches.
pub const INGEST_IDENTIFIERS_FAILED_TOTAL: &str = "breachwatch_ingest_identifiers_failed_total";

/// Destination for counters and histogram observations.
pub trait MetricsSink: Send + Sync {
    /// Increment the named counter by one.
    fn inc_counter(&self, name: &'static str);

    /// Increment the named counter by `by` in one step.
    fn inc_counter_by(&self, name: &'static str, by: u64);

    /// Record one observation into the named histogram.
    fn observe(&self, name: &'static str, value: f64);
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn inc_counter(&self, _name: &'static str) {}

    fn inc_counter_by(&self, _name: &'static str, _by: u64) {}

    fn observe(&self, _name: &'static str, _value: f64) {}
}

impl NoopMetrics {
    /// Shared handle, convenient for constructors taking `Arc<dyn MetricsSink>`.
    pub fn shared() -> Arc<dyn MetricsSink> {
        Arc::new(NoopMetrics)
    }
}
