mod common;

use common::{bundle_png, drain, names, FakeDecider, FakeStore, FakeUploader};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::broadcast;

use watermill_core::config::PipelineConfig;
use watermill_core::events::{EventPublisher, LiveEvent};
use watermill_core::pipeline::{CycleOutcome, Pipeline, PipelineParts, Stage};
use watermill_core::queue::MemoryTaskSource;
use watermill_core::types::{BundleTask, Verdict};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    pipeline: Pipeline,
    source: Arc<MemoryTaskSource>,
    store: Arc<FakeStore>,
    decider: Arc<FakeDecider>,
    uploader: Arc<FakeUploader>,
    events: broadcast::Receiver<LiveEvent>,
    dir: TempDir,
    server: mockito::ServerGuard,
}

impl Harness {
    async fn new(store: FakeStore, decider: FakeDecider, uploader: FakeUploader) -> Self {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/img.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(bundle_png())
            .create_async()
            .await;
        server
            .mock("GET", "/missing.png")
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let config = PipelineConfig {
            fade_delay_ms: 0,
            static_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let source = Arc::new(MemoryTaskSource::new());
        let store = Arc::new(store);
        let decider = Arc::new(decider);
        let uploader = Arc::new(uploader);
        let publisher = EventPublisher::new();
        let events = publisher.subscribe();

        let pipeline = Pipeline::new(
            PipelineParts {
                source: source.clone(),
                store: store.clone(),
                decider: decider.clone(),
                uploader: uploader.clone(),
                publisher,
            },
            &config,
        )
        .unwrap();
        *decider.status.lock().unwrap() = Some(pipeline.status());

        Self {
            pipeline,
            source,
            store,
            decider,
            uploader,
            events,
            dir,
            server,
        }
    }

    fn enqueue(&self, bundle_id: &str, path: &str) {
        let url = format!("{}{path}", self.server.url());
        self.source.push(&BundleTask::new(bundle_id, url)).unwrap();
    }
}

fn report(outcome: &CycleOutcome) -> &watermill_core::persist::PersistReport {
    match outcome {
        CycleOutcome::Finalized { report, .. } => report,
        other => panic!("expected Finalized, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_bundle_slices_publishes_and_finalizes() {
    let mut h = Harness::new(
        FakeStore::with_references(&[]),
        FakeDecider::answering(&[("01", Verdict::No), ("02", Verdict::No)]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/img.png");

    let outcome = h.pipeline.run_cycle().await;
    assert!(matches!(&outcome, CycleOutcome::Finalized { bundle_id, .. } if bundle_id == "b1"));

    for i in 1..=8 {
        assert!(
            h.dir.path().join(format!("coins/b1/{i:02}.png")).is_file(),
            "missing crop {i:02}"
        );
    }

    let events = drain(&mut h.events);
    let mut expected = vec!["clear_canvas"];
    expected.extend(std::iter::repeat("add_coin").take(8));
    expected.extend(["overlay_marks", "fade_out"]);
    assert_eq!(names(&events), expected);

    let ids: Vec<String> = events
        .iter()
        .filter(|e| e.name() == "add_coin")
        .map(|e| e.payload()["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["01", "02", "03", "04", "05", "06", "07", "08"]);
    assert_eq!(events[1].payload()["url"], "/static/coins/b1/01.png");
    assert_eq!(events[0].payload()["bundle_id"], "b1");

    assert!(h.store.records().is_empty());
    assert!(h.uploader.uploads().is_empty());
}

#[tokio::test]
async fn malformed_item_touches_nothing_and_loop_continues() {
    let mut h = Harness::new(
        FakeStore::with_references(&["01"]),
        FakeDecider::answering(&[("01", Verdict::Yes)]),
        FakeUploader::default(),
    )
    .await;
    h.source.push_raw("{not valid json");

    let outcome = h.pipeline.run_cycle().await;
    assert!(matches!(
        outcome,
        CycleOutcome::Aborted {
            bundle_id: None,
            stage: Stage::Dequeued,
            ..
        }
    ));
    assert!(drain(&mut h.events).is_empty());
    assert_eq!(h.store.calls(), 0);
    assert_eq!(h.decider.calls(), 0);
    assert!(h.source.is_empty(), "item must not be requeued");

    assert_eq!(h.pipeline.run_cycle().await, CycleOutcome::Idle);
}

#[tokio::test]
async fn missing_fields_are_dropped_like_bad_json() {
    let h = Harness::new(
        FakeStore::default(),
        FakeDecider::failing(),
        FakeUploader::default(),
    )
    .await;
    h.source.push_raw(r#"{"bundle_id":"b1"}"#);

    let outcome = h.pipeline.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Aborted { bundle_id: None, .. }));
    assert!(!h.dir.path().join("coins").exists());
}

#[tokio::test]
async fn no_decision_aborts_before_overlay() {
    let mut h = Harness::new(
        FakeStore::with_references(&["01"]),
        FakeDecider::failing(),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/img.png");

    let outcome = h.pipeline.run_cycle().await;
    assert!(matches!(
        &outcome,
        CycleOutcome::Aborted { bundle_id: Some(id), stage: Stage::MetadataFetched, .. } if id == "b1"
    ));

    let events = drain(&mut h.events);
    assert!(!names(&events).contains(&"overlay_marks"));
    assert!(!names(&events).contains(&"fade_out"));
    assert!(h.store.records().is_empty());

    let status = h.pipeline.status().borrow().clone();
    assert_eq!(status.stage, Stage::Idle);
    assert!(status.bundle_id.is_none());
    let last = status.last.expect("last cycle recorded");
    assert_eq!(last.outcome, Stage::Aborted);
    assert_eq!(last.bundle_id.as_deref(), Some("b1"));
}

#[tokio::test]
async fn empty_decision_list_is_terminal() {
    let h = Harness::new(
        FakeStore::with_references(&["01"]),
        FakeDecider::answering(&[]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/img.png");

    let outcome = h.pipeline.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Aborted { stage: Stage::MetadataFetched, .. }));
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn missing_reference_skips_only_that_slot() {
    let h = Harness::new(
        FakeStore::with_references(&["01", "03"]),
        FakeDecider::answering(&[
            ("01", Verdict::Yes),
            ("02", Verdict::Yes),
            ("03", Verdict::Yes),
            ("04", Verdict::No),
        ]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/img.png");

    let outcome = h.pipeline.run_cycle().await;
    let report = report(&outcome);

    assert_eq!(report.yes_count, 3);
    assert_eq!(report.created(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].slot_id, "02");

    let records = h.store.records();
    let uuids: Vec<&str> = records.iter().map(|r| r.coin_uuid.as_str()).collect();
    assert_eq!(uuids, ["coin-uuid-01", "coin-uuid-03"]);
    assert!(records.iter().all(|r| r.image_url.is_some()));
    assert_eq!(h.uploader.uploads(), ["100.png", "101.png"]);
}

#[tokio::test]
async fn failed_upload_leaves_record_without_url() {
    let h = Harness::new(
        FakeStore::with_references(&["05"]),
        FakeDecider::answering(&[("05", Verdict::Yes)]),
        FakeUploader::failing(),
    )
    .await;
    h.enqueue("b1", "/img.png");

    let outcome = h.pipeline.run_cycle().await;
    let report = report(&outcome);
    assert_eq!(report.created(), 1);
    assert_eq!(report.uploaded(), 0);

    let records = h.store.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].image_url.is_none());
    assert_eq!(h.uploader.uploads().len(), 1, "upload must not be retried");
}

#[tokio::test]
async fn records_exist_only_for_yes_with_reference() {
    let h = Harness::new(
        FakeStore::with_references(&["01", "02", "07", "08"]),
        FakeDecider::answering(&[
            ("01", Verdict::Yes),
            ("02", Verdict::No),
            ("06", Verdict::Yes),
            ("07", Verdict::Yes),
            ("08", Verdict::No),
        ]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/img.png");

    let outcome = h.pipeline.run_cycle().await;
    let report = report(&outcome);
    assert!(report.created() <= report.yes_count);

    let uuids: Vec<String> = h.store.records().into_iter().map(|r| r.coin_uuid).collect();
    assert_eq!(uuids, ["coin-uuid-01", "coin-uuid-07"]);
}

#[tokio::test]
async fn rejected_insert_skips_upload() {
    let mut store = FakeStore::with_references(&["01"]);
    store.reject_inserts = true;
    let h = Harness::new(
        store,
        FakeDecider::answering(&[("01", Verdict::Yes)]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/img.png");

    let outcome = h.pipeline.run_cycle().await;
    let report = report(&outcome);
    assert_eq!(report.created(), 0);
    assert_eq!(report.skipped.len(), 1);
    assert!(h.uploader.uploads().is_empty());
}

#[tokio::test]
async fn unknown_slot_in_decision_is_skipped() {
    let h = Harness::new(
        FakeStore::with_references(&["01"]),
        FakeDecider::answering(&[("01", Verdict::Yes), ("11", Verdict::Yes)]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/img.png");

    let outcome = h.pipeline.run_cycle().await;
    let report = report(&outcome);
    assert_eq!(report.created(), 1);
    assert_eq!(report.skipped[0].slot_id, "11");
}

#[tokio::test]
async fn download_failure_aborts_without_events() {
    let mut h = Harness::new(
        FakeStore::with_references(&["01"]),
        FakeDecider::answering(&[("01", Verdict::Yes)]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/missing.png");

    let outcome = h.pipeline.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Aborted { stage: Stage::Downloading, .. }));
    assert!(drain(&mut h.events).is_empty());
    assert_eq!(h.store.calls(), 0);
}

#[tokio::test]
async fn metadata_failure_aborts_after_publishing_slots() {
    let mut store = FakeStore::with_references(&["01"]);
    store.fail_metadata = true;
    let mut h = Harness::new(
        store,
        FakeDecider::answering(&[("01", Verdict::Yes)]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/img.png");

    let outcome = h.pipeline.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Aborted { stage: Stage::Published, .. }));
    assert_eq!(h.decider.calls(), 0);

    let events = drain(&mut h.events);
    assert_eq!(events.len(), 9);
    assert_eq!(events[0].name(), "clear_canvas");
}

#[tokio::test]
async fn status_shows_bundle_in_flight() {
    let h = Harness::new(
        FakeStore::with_references(&[]),
        FakeDecider::answering(&[("01", Verdict::No)]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b7", "/img.png");

    h.pipeline.run_cycle().await;

    let seen = h.decider.seen_status.lock().unwrap().clone().unwrap();
    assert_eq!(seen.bundle_id.as_deref(), Some("b7"));
    assert_eq!(seen.stage, Stage::MetadataFetched);

    let after = h.pipeline.status().borrow().clone();
    assert!(!after.is_processing());
    assert_eq!(after.last.unwrap().outcome, Stage::Finalized);
}

#[tokio::test]
async fn metadata_is_sorted_before_classification() {
    let h = Harness::new(
        FakeStore::with_references(&[]),
        FakeDecider::answering(&[("01", Verdict::No)]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/img.png");

    h.pipeline.run_cycle().await;

    let seen: Vec<String> = h
        .decider
        .seen_metadata
        .lock()
        .unwrap()
        .iter()
        .map(|m| m.slot_id.clone())
        .collect();
    assert_eq!(seen, ["01", "02", "03", "04", "05", "06", "07", "08"]);
}

#[tokio::test]
async fn one_bundle_per_cycle() {
    let h = Harness::new(
        FakeStore::with_references(&[]),
        FakeDecider::answering(&[("01", Verdict::No)]),
        FakeUploader::default(),
    )
    .await;
    h.enqueue("b1", "/img.png");
    h.enqueue("b2", "/img.png");

    let first = h.pipeline.run_cycle().await;
    assert!(matches!(&first, CycleOutcome::Finalized { bundle_id, .. } if bundle_id == "b1"));
    assert_eq!(h.source.len(), 1);

    let second = h.pipeline.run_cycle().await;
    assert!(matches!(&second, CycleOutcome::Finalized { bundle_id, .. } if bundle_id == "b2"));
    assert_eq!(h.pipeline.run_cycle().await, CycleOutcome::Idle);
}
