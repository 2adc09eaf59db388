//! Deduplicating, batched bulk-merge of identifiers into a [`BreachStore`].

use std::collections::BTreeSet;
use std::sync::Arc;

use breachwatch_core::{
    BreachConfig, BreachError, BreachResult, BulkWriteSummary, Identifier, Tag, UpsertOp,
};
use breachwatch_storage::metrics::{
    INGEST_BATCHES_FAILED_TOTAL, INGEST_BATCHES_SUCCEEDED_TOTAL, INGEST_IDENTIFIERS_FAILED_TOTAL,
    INGEST_IDENTIFIERS_SUCCEEDED_TOTAL,
};
use breachwatch_storage::{BreachStore, MetricsSink};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::batch::{dedup, partition};
use crate::progress::IngestionRun;

/// One batch the store did not acknowledge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    /// Zero-based batch position within the call.
    pub batch_index: usize,
    /// Position of the batch's first identifier in the deduplicated list.
    pub offset: usize,
    pub size: usize,
    pub error: String,
    pub retryable: bool,
}

/// Result of one `ingest` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub tag: String,
    /// Valid identifiers left after deduplication.
    pub unique: usize,
    /// Distinct inputs that failed identifier validation.
    pub rejected: usize,
    pub batches: usize,
    /// Identifiers in acknowledged batches.
    pub succeeded: usize,
    /// Identifiers in failed batches.
    pub failed: usize,
    /// Store acknowledgement counts summed over acknowledged batches.
    pub summary: BulkWriteSummary,
    pub failures: Vec<BatchFailure>,
    /// Completion of the enclosing run after this call.
    pub percent_complete: f64,
}

impl IngestOutcome {
    /// True when every batch was acknowledged.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_batches(&self) -> usize {
        self.failures.len()
    }
}

/// Turns identifier streams into set-union upserts against a store.
///
/// Batches are submitted one after another. A failed batch is recorded and
/// the next one is still submitted; only an invalid tag aborts a call, and
/// it does so before the store is touched.
pub struct IngestionPipeline<S: BreachStore> {
    store: Arc<S>,
    batch_size: usize,
    metrics: Arc<dyn MetricsSink>,
}

impl<S: BreachStore> IngestionPipeline<S> {
    pub fn new(store: Arc<S>, batch_size: usize, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            metrics,
        }
    }

    pub fn from_config(store: Arc<S>, config: &BreachConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self::new(store, config.batch_size, metrics)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Merge `tag` into the record of every valid identifier in `identifiers`.
    ///
    /// Duplicates are collapsed before batching. Strings that are not valid
    /// identifiers are counted in `rejected` and skipped. The call is treated
    /// as a single-source run, so `percent_complete` is 100 when every batch
    /// was acknowledged and 0 otherwise.
    pub async fn ingest<I>(&self, identifiers: I, tag: &str) -> BreachResult<IngestOutcome>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let tag = Tag::parse(tag)?;

        let mut unique = BTreeSet::new();
        let mut rejected = BTreeSet::new();
        for raw in identifiers {
            let raw = raw.as_ref();
            match Identifier::parse(raw) {
                Ok(identifier) => {
                    unique.insert(identifier);
                }
                Err(_) => {
                    rejected.insert(raw.to_string());
                }
            }
        }
        if !rejected.is_empty() {
            debug!(tag = %tag, rejected = rejected.len(), "skipping malformed identifiers");
        }

        let run = IngestionRun::new(tag, 1);
        let mut outcome = self.ingest_into(&run, unique).await;
        outcome.rejected = rejected.len();
        Ok(outcome)
    }

    /// Ingest already-validated identifiers as one source of `run`.
    ///
    /// The source is marked processed on the run only if no batch failed.
    pub async fn ingest_into<I>(&self, run: &IngestionRun, identifiers: I) -> IngestOutcome
    where
        I: IntoIterator<Item = Identifier>,
    {
        let unique: Vec<Identifier> = dedup(identifiers);
        let tag = run.tag();

        let mut outcome = IngestOutcome {
            tag: tag.as_str().to_string(),
            unique: unique.len(),
            rejected: 0,
            batches: 0,
            succeeded: 0,
            failed: 0,
            summary: BulkWriteSummary::default(),
            failures: Vec::new(),
            percent_complete: run.percent_complete(),
        };

        if unique.is_empty() {
            debug!(run_id = %run.run_id(), tag = %tag, "nothing to ingest");
            run.mark_processed();
            outcome.percent_complete = run.percent_complete();
            return outcome;
        }

        let batches = partition(&unique, self.batch_size);
        outcome.batches = batches.len();
        info!(
            run_id = %run.run_id(),
            tag = %tag,
            unique = unique.len(),
            batches = batches.len(),
            "ingesting identifiers"
        );

        let mut offset = 0;
        for (batch_index, chunk) in batches.into_iter().enumerate() {
            let ops: Vec<UpsertOp> = chunk
                .iter()
                .map(|identifier| UpsertOp::new(identifier.clone(), tag.clone()))
                .collect();

            match self.store.bulk_upsert(&ops).await {
                Ok(summary) => {
                    outcome.succeeded += ops.len();
                    outcome.summary += summary;
                    self.metrics.inc_counter(INGEST_BATCHES_SUCCEEDED_TOTAL);
                    self.metrics
                        .inc_counter_by(INGEST_IDENTIFIERS_SUCCEEDED_TOTAL, ops.len() as u64);
                    debug!(
                        run_id = %run.run_id(),
                        batch = batch_index,
                        size = ops.len(),
                        upserted = summary.upserted,
                        modified = summary.modified,
                        "batch acknowledged"
                    );
                }
                Err(error) => {
                    outcome.failed += ops.len();
                    self.metrics.inc_counter(INGEST_BATCHES_FAILED_TOTAL);
                    self.metrics
                        .inc_counter_by(INGEST_IDENTIFIERS_FAILED_TOTAL, ops.len() as u64);
                    warn!(
                        run_id = %run.run_id(),
                        batch = batch_index,
                        size = ops.len(),
                        error = %error,
                        "batch failed"
                    );
                    outcome
                        .failures
                        .push(batch_failure(batch_index, offset, ops.len(), &error));
                }
            }
            offset += chunk.len();
        }

        if outcome.is_complete() {
            run.mark_processed();
        }
        outcome.percent_complete = run.percent_complete();

        info!(
            run_id = %run.run_id(),
            tag = %tag,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "ingestion finished"
        );
        outcome
    }
}

fn batch_failure(
    batch_index: usize,
    offset: usize,
    size: usize,
    error: &BreachError,
) -> BatchFailure {
    BatchFailure {
        batch_index,
        offset,
        size,
        error: error.to_string(),
        retryable: error.is_retryable(),
    }
}
