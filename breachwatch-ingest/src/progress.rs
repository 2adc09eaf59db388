//! Ingestion run bookkeeping.

use std::sync::atomic::{AtomicUsize, Ordering};

use breachwatch_core::Tag;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Progress of one bulk upload across its source files.
///
/// `processed` only moves forward and never passes `total`; it can be read
/// while other tasks increment it.
#[derive(Debug)]
pub struct IngestionRun {
    run_id: Uuid,
    tag: Tag,
    total: usize,
    processed: AtomicUsize,
    started_at: DateTime<Utc>,
}

impl IngestionRun {
    pub fn new(tag: Tag, total: usize) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            tag,
            total,
            processed: AtomicUsize::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Acquire)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Count one more source as processed. Returns the new count.
    pub fn mark_processed(&self) -> usize {
        let total = self.total;
        match self
            .processed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < total).then_some(n + 1)
            }) {
            Ok(previous) => previous + 1,
            Err(current) => current,
        }
    }

    /// `processed / total * 100`. A run with nothing to process is complete.
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed() as f64 / self.total as f64 * 100.0
    }
}
