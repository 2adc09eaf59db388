//! Bulk upload of breach dump files.

use std::path::{Path, PathBuf};

use breachwatch_core::{BreachResult, SourceError, Tag};
use breachwatch_storage::BreachStore;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extract::extract_file;
use crate::pipeline::{IngestOutcome, IngestionPipeline};
use crate::progress::IngestionRun;

/// What happened to one file of an upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Zero-length or unreadable metadata; not part of the run's total.
    Skipped { reason: String },
    /// Could not be read; nothing from it was ingested.
    Unreadable { error: String },
    /// Extracted and ingested, possibly with failed batches.
    Ingested(IngestOutcome),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Summary of one `upload_files` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    pub run_id: Uuid,
    pub tag: String,
    pub files: Vec<FileReport>,
    /// Files that took part in the run.
    pub total: usize,
    /// Files ingested without a failed batch.
    pub processed: usize,
    pub percent_complete: f64,
    /// Store size after the upload, when the store could report it.
    pub record_count: Option<u64>,
}

impl<S: BreachStore> IngestionPipeline<S> {
    /// Extract and ingest a set of dump files under one tag.
    ///
    /// Empty files are dropped before the run starts and do not count toward
    /// its total. Files are processed in order; an unreadable file is logged
    /// and reported but does not stop the others.
    pub async fn upload_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        tag: &str,
    ) -> BreachResult<UploadReport> {
        let tag = Tag::parse(tag)?;

        let mut files = Vec::with_capacity(paths.len());
        let mut sources = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match std::fs::metadata(path) {
                Ok(meta) if meta.len() == 0 => {
                    warn!(path = %path.display(), "skipping empty file");
                    files.push(skipped(path, "empty file"));
                }
                Ok(_) => sources.push(path.to_path_buf()),
                Err(e) => {
                    let error = SourceError::read(path.display().to_string(), &e);
                    warn!(path = %path.display(), error = %error, "skipping file");
                    files.push(skipped(path, &error.to_string()));
                }
            }
        }

        let run = IngestionRun::new(tag, sources.len());
        info!(
            run_id = %run.run_id(),
            tag = %run.tag(),
            total = run.total(),
            "upload started"
        );

        for path in sources {
            let status = match extract_file(&path) {
                Ok(identifiers) => {
                    let outcome = self.ingest_into(&run, identifiers).await;
                    if !outcome.is_complete() {
                        warn!(
                            run_id = %run.run_id(),
                            path = %path.display(),
                            failed_batches = outcome.failed_batches(),
                            "file partially ingested"
                        );
                    }
                    FileStatus::Ingested(outcome)
                }
                Err(error) => {
                    warn!(
                        run_id = %run.run_id(),
                        path = %path.display(),
                        error = %error,
                        "file unreadable"
                    );
                    FileStatus::Unreadable {
                        error: error.to_string(),
                    }
                }
            };
            info!(
                run_id = %run.run_id(),
                processed = run.processed(),
                total = run.total(),
                percent = run.percent_complete(),
                "upload progress"
            );
            files.push(FileReport { path, status });
        }

        let record_count = match self.store().record_count().await {
            Ok(count) => {
                info!(run_id = %run.run_id(), record_count = count, "store size after upload");
                Some(count)
            }
            Err(error) => {
                warn!(run_id = %run.run_id(), error = %error, "could not count records");
                None
            }
        };

        info!(
            run_id = %run.run_id(),
            processed = run.processed(),
            total = run.total(),
            "upload finished"
        );

        Ok(UploadReport {
            run_id: run.run_id(),
            tag: run.tag().as_str().to_string(),
            files,
            total: run.total(),
            processed: run.processed(),
            percent_complete: run.percent_complete(),
            record_count,
        })
    }
}

fn skipped(path: &Path, reason: &str) -> FileReport {
    FileReport {
        path: path.to_path_buf(),
        status: FileStatus::Skipped {
            reason: reason.to_string(),
        },
    }
}
