//! Prometheus Metrics Definitions
//!
//! Registers every breachwatch metric in the process-wide default registry
//! and exposes them through a [`MetricsSink`] so the cache and pipeline never
//! see Prometheus types.

use breachwatch_storage::metrics::{
    CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, INGEST_BATCHES_FAILED_TOTAL,
    INGEST_BATCHES_SUCCEEDED_TOTAL, INGEST_IDENTIFIERS_FAILED_TOTAL,
    INGEST_IDENTIFIERS_SUCCEEDED_TOTAL, LOOKUP_DURATION_SECONDS, LOOKUP_REQUESTS_TOTAL,
};
use breachwatch_storage::MetricsSink;
use once_cell::sync::Lazy;
use prometheus::{register_counter, register_histogram, Counter, Encoder, Histogram, TextEncoder};

use crate::error::{CliError, CliResult};

/// Lookup latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const LOOKUP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - registered once per process
pub static METRICS: Lazy<CliResult<BreachMetrics>> = Lazy::new(BreachMetrics::new);

/// Container for all breachwatch metrics.
#[derive(Clone)]
pub struct BreachMetrics {
    pub lookup_requests_total: Counter,
    pub cache_hits_total: Counter,
    pub cache_misses_total: Counter,
    pub lookup_duration_seconds: Histogram,
    pub ingest_batches_succeeded_total: Counter,
    pub ingest_batches_failed_total: Counter,
    pub ingest_identifiers_succeeded_total: Counter,
    pub ingest_identifiers_failed_total: Counter,
}

fn registration_error(name: &str, e: prometheus::Error) -> CliError {
    CliError::Telemetry(format!("Failed to register {}: {}", name, e))
}

impl BreachMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> CliResult<Self> {
        Ok(Self {
            lookup_requests_total: register_counter!(
                LOOKUP_REQUESTS_TOTAL,
                "Total number of identifier lookups"
            )
            .map_err(|e| registration_error(LOOKUP_REQUESTS_TOTAL, e))?,

            cache_hits_total: register_counter!(
                CACHE_HITS_TOTAL,
                "Lookups answered from the cache"
            )
            .map_err(|e| registration_error(CACHE_HITS_TOTAL, e))?,

            cache_misses_total: register_counter!(
                CACHE_MISSES_TOTAL,
                "Lookups that read the store"
            )
            .map_err(|e| registration_error(CACHE_MISSES_TOTAL, e))?,

            lookup_duration_seconds: register_histogram!(
                LOOKUP_DURATION_SECONDS,
                "Identifier lookup duration in seconds",
                LOOKUP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error(LOOKUP_DURATION_SECONDS, e))?,

            ingest_batches_succeeded_total: register_counter!(
                INGEST_BATCHES_SUCCEEDED_TOTAL,
                "Bulk upsert batches acknowledged by the store"
            )
            .map_err(|e| registration_error(INGEST_BATCHES_SUCCEEDED_TOTAL, e))?,

            ingest_batches_failed_total: register_counter!(
                INGEST_BATCHES_FAILED_TOTAL,
                "Bulk upsert batches the store failed"
            )
            .map_err(|e| registration_error(INGEST_BATCHES_FAILED_TOTAL, e))?,

            ingest_identifiers_succeeded_total: register_counter!(
                INGEST_IDENTIFIERS_SUCCEEDED_TOTAL,
                "Identifiers carried by acknowledged batches"
            )
            .map_err(|e| registration_error(INGEST_IDENTIFIERS_SUCCEEDED_TOTAL, e))?,

            ingest_identifiers_failed_total: register_counter!(
                INGEST_IDENTIFIERS_FAILED_TOTAL,
                "Identifiers carried by failed batches"
            )
            .map_err(|e| registration_error(INGEST_IDENTIFIERS_FAILED_TOTAL, e))?,
        })
    }

    fn counter(&self, name: &str) -> Option<&Counter> {
        match name {
            LOOKUP_REQUESTS_TOTAL => Some(&self.lookup_requests_total),
            CACHE_HITS_TOTAL => Some(&self.cache_hits_total),
            CACHE_MISSES_TOTAL => Some(&self.cache_misses_total),
            INGEST_BATCHES_SUCCEEDED_TOTAL => Some(&self.ingest_batches_succeeded_total),
            INGEST_BATCHES_FAILED_TOTAL => Some(&self.ingest_batches_failed_total),
            INGEST_IDENTIFIERS_SUCCEEDED_TOTAL => Some(&self.ingest_identifiers_succeeded_total),
            INGEST_IDENTIFIERS_FAILED_TOTAL => Some(&self.ingest_identifiers_failed_total),
            _ => None,
        }
    }
}

/// [`MetricsSink`] backed by the process-wide registry.
#[derive(Clone, Copy)]
pub struct PrometheusSink {
    metrics: &'static BreachMetrics,
}

impl PrometheusSink {
    /// Register the metrics on first use and return a sink over them.
    pub fn global() -> CliResult<Self> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| CliError::Telemetry(e.to_string()))?;
        Ok(Self { metrics })
    }
}

impl MetricsSink for PrometheusSink {
    fn inc_counter(&self, name: &'static str) {
        self.inc_counter_by(name, 1);
    }

    fn inc_counter_by(&self, name: &'static str, by: u64) {
        match self.metrics.counter(name) {
            Some(counter) => counter.inc_by(by as f64),
            None => tracing::debug!(metric = name, "unknown counter"),
        }
    }

    fn observe(&self, name: &'static str, value: f64) {
        if name == LOOKUP_DURATION_SECONDS {
            self.metrics.lookup_duration_seconds.observe(value);
        } else {
            tracing::debug!(metric = name, "unknown histogram");
        }
    }
}

/// Encode the default registry in Prometheus text format.
pub fn render_metrics() -> CliResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| CliError::Telemetry(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| CliError::Telemetry(format!("Metrics are not UTF-8: {}", e)))
}
