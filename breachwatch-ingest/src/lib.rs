//! breachwatch Ingest - Extraction and Bulk Merge
//!
//! Scans raw breach dumps for identifiers, collapses duplicates, and merges
//! one breach tag into every identifier's record through batched set-union
//! upserts. Batch failures are isolated and reported rather than aborting
//! the run.

pub mod batch;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod upload;

pub use batch::{batch_count, dedup, partition};
pub use extract::{extract_all, extract_file, identifiers_in_line, Extractor};
pub use pipeline::{BatchFailure, IngestOutcome, IngestionPipeline};
pub use progress::IngestionRun;
pub use upload::{FileReport, FileStatus, UploadReport};
