//! Property and scenario tests for the ingestion pipeline.

use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::Arc;

use breachwatch_ingest::{extract_all, IngestionPipeline};
use breachwatch_storage::metrics::{
    INGEST_BATCHES_FAILED_TOTAL, INGEST_BATCHES_SUCCEEDED_TOTAL, INGEST_IDENTIFIERS_FAILED_TOTAL,
    INGEST_IDENTIFIERS_SUCCEEDED_TOTAL,
};
use breachwatch_storage::{BreachStore, LmdbBreachStore, NoopMetrics};
use breachwatch_test_utils::assertions::{assert_tag_set, assert_validation_error};
use breachwatch_test_utils::fixtures::{
    identifier, identifiers, sample_dump, seeded_store, small_config,
};
use breachwatch_test_utils::generators::{arb_dump_line, arb_identifiers_with_duplicates, arb_tag};
use breachwatch_test_utils::{MockStore, RecordingMetrics};
use proptest::prelude::*;
use tempfile::TempDir;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build")
}

fn pipeline_with(
    store: Arc<MockStore>,
    batch_size: usize,
) -> (IngestionPipeline<MockStore>, Arc<RecordingMetrics>) {
    let metrics = Arc::new(RecordingMetrics::new());
    let pipeline = IngestionPipeline::new(store, batch_size, metrics.clone());
    (pipeline, metrics)
}

#[tokio::test]
async fn test_default_batch_split_with_middle_failure() {
    let store = Arc::new(MockStore::new());
    store.fail_bulk_call(2);
    let (pipeline, metrics) = pipeline_with(store.clone(), 950);

    let outcome = pipeline.ingest(identifiers(2000), "combo").await.unwrap();

    assert_eq!(store.batch_sizes(), vec![950, 950, 100]);
    assert_eq!(outcome.batches, 3);
    assert_eq!(outcome.succeeded, 1050);
    assert_eq!(outcome.failed, 950);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].batch_index, 1);
    assert_eq!(outcome.failures[0].offset, 950);
    assert_eq!(outcome.failures[0].size, 950);
    assert_eq!(outcome.summary.upserted, 1050);

    // first and third batches applied, second not
    assert_eq!(store.len(), 1050);
    assert!(store.record(&identifier("user00000@example.com")).is_some());
    assert!(store.record(&identifier("user00950@example.com")).is_none());
    assert!(store.record(&identifier("user01999@example.com")).is_some());

    assert_eq!(metrics.counter(INGEST_BATCHES_SUCCEEDED_TOTAL), 2);
    assert_eq!(metrics.counter(INGEST_BATCHES_FAILED_TOTAL), 1);
    assert_eq!(metrics.counter(INGEST_IDENTIFIERS_SUCCEEDED_TOTAL), 1050);
    assert_eq!(metrics.counter(INGEST_IDENTIFIERS_FAILED_TOTAL), 950);
    // one increment per batch, not per identifier
    assert_eq!(metrics.counter_calls(INGEST_IDENTIFIERS_SUCCEEDED_TOTAL), 2);
    assert_eq!(metrics.counter_calls(INGEST_IDENTIFIERS_FAILED_TOTAL), 1);
}

#[tokio::test]
async fn test_batch_size_comes_from_config() {
    let store = Arc::new(MockStore::new());
    let config = small_config();
    let pipeline = IngestionPipeline::from_config(store.clone(), &config, NoopMetrics::shared());

    let outcome = pipeline.ingest(identifiers(7), "t").await.unwrap();

    assert_eq!(store.batch_sizes(), vec![3, 3, 1]);
    assert!(outcome.is_complete());
}

#[tokio::test]
async fn test_oversized_identifier_does_not_sink_its_batch() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LmdbBreachStore::open(dir.path(), 10).unwrap());
    let pipeline = IngestionPipeline::new(store.clone(), 950, NoopMetrics::shared());

    let oversized = format!("{}@example.com", "a".repeat(600));
    let outcome = pipeline
        .ingest(
            vec![
                "ok@example.com".to_string(),
                oversized,
                "also-ok@example.com".to_string(),
            ],
            "combo",
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejected, 1);
    assert_eq!(outcome.unique, 2);
    assert_eq!(outcome.failed, 0);
    assert!(outcome.is_complete());
    assert_eq!(
        store.find_by_key(&identifier("ok@example.com")).await.unwrap(),
        Some(vec!["combo".to_string()])
    );
    assert_eq!(store.record_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_ingest_unions_with_existing_tags() {
    let store = Arc::new(seeded_store(&[("a@example.com", &["tagY"][..])]));
    let (pipeline, _) = pipeline_with(store.clone(), 950);

    let outcome = pipeline.ingest(["a@example.com"], "tagZ").await.unwrap();

    assert_eq!(outcome.summary.matched, 1);
    assert_eq!(outcome.summary.modified, 1);
    let tags = store.find_by_key(&identifier("a@example.com")).await.unwrap().unwrap();
    assert_tag_set(&tags, &["tagY", "tagZ"]);
}

#[tokio::test]
async fn test_missing_tag_makes_no_store_calls() {
    let store = Arc::new(MockStore::new());
    let (pipeline, metrics) = pipeline_with(store.clone(), 950);

    let result = pipeline.ingest(["a@example.com"], "").await;

    assert_validation_error(&result);
    assert_eq!(store.bulk_call_count(), 0);
    assert_eq!(metrics.counter(INGEST_BATCHES_SUCCEEDED_TOTAL), 0);
}

#[tokio::test]
async fn test_unavailable_store_fails_every_batch_without_aborting() {
    let store = Arc::new(MockStore::new());
    store.set_unavailable(true);
    let (pipeline, _) = pipeline_with(store.clone(), 2);

    let outcome = pipeline
        .ingest(identifiers(5), "t")
        .await
        .expect("batch failures are reported, not raised");

    assert_eq!(store.bulk_call_count(), 3);
    assert_eq!(outcome.failed, 5);
    assert!(outcome.failures.iter().all(|f| f.retryable));
    assert_eq!(outcome.percent_complete, 0.0);
}

#[tokio::test]
async fn test_extract_then_ingest_sample_dump() {
    let store = Arc::new(MockStore::new());
    let (pipeline, _) = pipeline_with(store.clone(), 950);

    let extracted = extract_all(Cursor::new(sample_dump()), "sample").unwrap();
    let raw: Vec<String> = extracted.into_iter().map(|id| id.into_inner()).collect();
    let outcome = pipeline.ingest(raw, "sample-2024").await.unwrap();

    assert_eq!(outcome.unique, 4);
    assert_eq!(store.len(), 4);
    assert!(store.record(&identifier("ALICE@example.com")).is_some());
}

#[tokio::test]
async fn test_reingesting_same_tag_changes_nothing() {
    let store = Arc::new(MockStore::new());
    let (pipeline, _) = pipeline_with(store.clone(), 4);

    pipeline.ingest(identifiers(10), "t").await.unwrap();
    let second = pipeline.ingest(identifiers(10), "t").await.unwrap();

    assert_eq!(second.summary.matched, 10);
    assert_eq!(second.summary.modified, 0);
    assert_eq!(second.summary.upserted, 0);
    assert_eq!(store.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_on_overlapping_identifiers_keep_all_tags() {
    let store = Arc::new(MockStore::new());
    let mut handles = Vec::new();
    for tag in ["t1", "t2", "t3", "t4"] {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let (pipeline, _) = pipeline_with(store, 7);
            pipeline.ingest(identifiers(50), tag).await.unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_complete());
    }

    assert_eq!(store.len(), 50);
    for raw in identifiers(50) {
        let tags = store.record(&identifier(&raw)).unwrap();
        assert_tag_set(&tags, &["t1", "t2", "t3", "t4"]);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every unique identifier is sent exactly once, in batches no larger
    /// than the configured size.
    #[test]
    fn prop_each_unique_identifier_sent_once(
        raw in arb_identifiers_with_duplicates(40),
        batch_size in 1usize..16,
        tag in arb_tag(),
    ) {
        let rt = runtime();
        let store = Arc::new(MockStore::new());
        let (pipeline, _) = pipeline_with(store.clone(), batch_size);

        let outcome = rt.block_on(pipeline.ingest(raw.clone(), tag.as_str())).unwrap();
        let unique: BTreeSet<&String> = raw.iter().collect();

        prop_assert_eq!(outcome.unique, unique.len());
        prop_assert_eq!(outcome.succeeded, unique.len());
        prop_assert_eq!(store.len(), unique.len());
        let sizes = store.batch_sizes();
        prop_assert_eq!(sizes.iter().sum::<usize>(), unique.len());
        prop_assert!(sizes.iter().all(|&s| s >= 1 && s <= batch_size));
        for id in unique {
            let record = store.record(&identifier(id)).unwrap();
            prop_assert_eq!(record, vec![tag.as_str().to_string()]);
        }
    }

    /// Succeeded and failed always account for every unique identifier.
    #[test]
    fn prop_failures_partition_the_input(
        count in 1usize..60,
        batch_size in 1usize..10,
        failing in prop::collection::btree_set(1usize..8, 0..4),
    ) {
        let rt = runtime();
        let store = Arc::new(MockStore::new());
        for call in &failing {
            store.fail_bulk_call(*call);
        }
        let (pipeline, _) = pipeline_with(store.clone(), batch_size);

        let outcome = rt.block_on(pipeline.ingest(identifiers(count), "t")).unwrap();

        prop_assert_eq!(outcome.succeeded + outcome.failed, count);
        prop_assert_eq!(outcome.succeeded, store.len());
        let failed_sizes: usize = outcome.failures.iter().map(|f| f.size).sum();
        prop_assert_eq!(failed_sizes, outcome.failed);
        for failure in &outcome.failures {
            prop_assert!(failing.contains(&(failure.batch_index + 1)));
        }
    }

    /// Identifiers buried in combo-list noise are recovered intact.
    #[test]
    fn prop_extraction_recovers_buried_identifiers(
        lines in prop::collection::vec(arb_dump_line(), 0..30),
    ) {
        let text: String = lines.iter().map(|(line, _)| format!("{}\n", line)).collect();
        let expected: Vec<String> = lines.into_iter().map(|(_, id)| id).collect();

        let found = extract_all(Cursor::new(text), "generated").unwrap();
        let found: Vec<String> = found.into_iter().map(|id| id.into_inner()).collect();
        prop_assert_eq!(found, expected);
    }
}
