//! Subcommand implementations.
//!
//! Each command writes JSON to the given writer so it can be tested without
//! capturing stdout.

use std::io::Write;
use std::path::PathBuf;

use breachwatch_core::{BreachError, Identifier, StorageError};
use breachwatch_ingest::{IngestionPipeline, UploadReport};
use breachwatch_storage::{BreachStore, LookupCache};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::CliResult;

/// Result of checking one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckResult {
    Found { breaches: Vec<String> },
    NotFound,
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckLine {
    pub identifier: String,
    #[serde(flatten)]
    pub result: CheckResult,
}

/// Look up each identifier through the cache and print one JSON line per
/// identifier.
///
/// Malformed identifiers are reported inline. A store failure aborts the
/// command with that error.
pub async fn check<S, W>(
    cache: &LookupCache<S>,
    identifiers: &[String],
    out: &mut W,
) -> CliResult<Vec<CheckLine>>
where
    S: BreachStore,
    W: Write,
{
    let mut lines = Vec::with_capacity(identifiers.len());
    for raw in identifiers {
        let result = match Identifier::parse(raw.as_str()) {
            Err(e) => CheckResult::Invalid {
                reason: e.to_string(),
            },
            Ok(identifier) => match cache.find_breaches(&identifier).await {
                Ok(breaches) => CheckResult::Found { breaches },
                Err(BreachError::Storage(StorageError::NotFound { .. })) => CheckResult::NotFound,
                Err(e) => return Err(e.into()),
            },
        };
        let line = CheckLine {
            identifier: raw.clone(),
            result,
        };
        serde_json::to_writer(&mut *out, &line)?;
        writeln!(out)?;
        lines.push(line);
    }

    let stats = cache.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        hit_rate = stats.hit_rate(),
        "lookups finished"
    );
    Ok(lines)
}

/// Ingest dump files under one tag and print the upload report.
pub async fn ingest<S, W>(
    pipeline: &IngestionPipeline<S>,
    files: &[PathBuf],
    tag: &str,
    out: &mut W,
) -> CliResult<UploadReport>
where
    S: BreachStore,
    W: Write,
{
    let report = pipeline.upload_files(files, tag).await?;
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(report)
}

/// Print the de-duplicated breach catalog as a JSON array.
pub async fn breaches<S, W>(store: &S, out: &mut W) -> CliResult<Vec<String>>
where
    S: BreachStore,
    W: Write,
{
    let catalog = store.catalog().await?;
    serde_json::to_writer(&mut *out, &catalog)?;
    writeln!(out)?;
    Ok(catalog)
}

/// Close the store once a command has run.
///
/// A command error takes precedence over a close failure, which is then only
/// logged.
pub async fn finish<S: BreachStore>(store: &S, result: CliResult<()>) -> CliResult<()> {
    let closed = store.close().await;
    match (result, closed) {
        (Err(e), Err(close_error)) => {
            warn!(error = %close_error, "store close failed after command error");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), closed) => Ok(closed?),
    }
}
