//! breachwatch Telemetry
//!
//! Structured logging via `tracing` and Prometheus metrics behind the
//! [`MetricsSink`](breachwatch_storage::MetricsSink) seam.

pub mod metrics;
pub mod tracer;

pub use metrics::{render_metrics, BreachMetrics, PrometheusSink, METRICS};
pub use tracer::{init_tracing, LogFormat, DEFAULT_LOG_FILTER};
