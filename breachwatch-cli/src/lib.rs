//! breachwatch CLI - Wiring for the `breachwatch` binary
//!
//! Configuration from the environment, tracing and Prometheus setup, and the
//! `check` / `ingest` / `breaches` commands over an LMDB store.

pub mod commands;
pub mod config;
pub mod error;
pub mod telemetry;

pub use config::CliConfig;
pub use error::{CliError, CliResult};
