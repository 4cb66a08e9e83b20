use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::blob::BlobUploader;
use crate::config::PipelineConfig;
use crate::decision::DecisionClient;
use crate::error::PipelineError;
use crate::events::EventPublisher;
use crate::partition::Partitioner;
use crate::persist::{PersistReport, ResultPersister};
use crate::queue::TaskSource;
use crate::store::{self, CoinStore};
use crate::types::{BundleTask, CoinMetadata, Decision};

use super::stage::{LastCycle, PipelineStatus, Stage};

// ---------------------------------------------------------------------------
// CycleOutcome
// ---------------------------------------------------------------------------

/// Result of one poll of the task source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Queue was empty.
    Idle,
    Finalized {
        bundle_id: String,
        report: PersistReport,
    },
    /// `stage` is the last stage reached before the failure.
    Aborted {
        bundle_id: Option<String>,
        stage: Stage,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The collaborators one pipeline drives.
pub struct PipelineParts {
    pub source: Arc<dyn TaskSource>,
    pub store: Arc<dyn CoinStore>,
    pub decider: Arc<dyn DecisionClient>,
    pub uploader: Arc<dyn BlobUploader>,
    pub publisher: EventPublisher,
}

/// Pipeline Orchestrator. Processes at most one bundle per cycle, start to
/// finish, before polling again.
pub struct Pipeline {
    source: Arc<dyn TaskSource>,
    store: Arc<dyn CoinStore>,
    decider: Arc<dyn DecisionClient>,
    publisher: EventPublisher,
    partitioner: Partitioner,
    persister: ResultPersister,
    status: watch::Sender<PipelineStatus>,
    poll_interval: Duration,
    fade_delay: Duration,
}

impl Pipeline {
    pub fn new(parts: PipelineParts, config: &PipelineConfig) -> Result<Self, reqwest::Error> {
        let partitioner = Partitioner::new(&config.static_dir, config.download_timeout())?;
        let persister = ResultPersister::new(
            parts.store.clone(),
            parts.uploader,
            config.static_dir.clone(),
        );
        let (status, _) = watch::channel(PipelineStatus::idle());

        Ok(Self {
            source: parts.source,
            store: parts.store,
            decider: parts.decider,
            publisher: parts.publisher,
            partitioner,
            persister,
            status,
            poll_interval: config.poll_interval(),
            fade_delay: config.fade_delay(),
        })
    }

    /// Read-only view of the orchestrator's state for other tasks.
    pub fn status(&self) -> watch::Receiver<PipelineStatus> {
        self.status.subscribe()
    }

    /// Run cycles forever, sleeping `poll_interval` after each one.
    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.poll_interval.as_secs(),
            "bundle processor started"
        );
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Poll once and, if a task was waiting, drive it to completion.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let raw = match self.source.take_next().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("no item found in bundle queue");
                return CycleOutcome::Idle;
            }
            Err(e) => {
                let e = PipelineError::from(e);
                tracing::error!("{e}");
                return CycleOutcome::Aborted {
                    bundle_id: None,
                    stage: Stage::Idle,
                    error: e.to_string(),
                };
            }
        };

        tracing::info!(item = %raw, "pulled item from queue");
        self.transition(Stage::Dequeued, None);

        let task = match BundleTask::decode(&raw) {
            Ok(task) => task,
            Err(e) => return self.abort(None, Stage::Dequeued, e),
        };
        tracing::info!(
            bundle_id = %task.bundle_id,
            image_url = %task.image_url,
            "starting bundle"
        );
        self.transition(Stage::Dequeued, Some(&task.bundle_id));

        match self.process(&task).await {
            Ok(report) => {
                tracing::info!(
                    bundle_id = %task.bundle_id,
                    yes = report.yes_count,
                    created = report.created(),
                    uploaded = report.uploaded(),
                    skipped = report.skipped.len(),
                    "completed bundle"
                );
                self.finish(Some(task.bundle_id.clone()), Stage::Finalized);
                CycleOutcome::Finalized {
                    bundle_id: task.bundle_id,
                    report,
                }
            }
            Err((stage, e)) => self.abort(Some(task.bundle_id), stage, e),
        }
    }

    async fn process(&self, task: &BundleTask) -> Result<PersistReport, (Stage, PipelineError)> {
        let bundle_id = task.bundle_id.as_str();

        self.transition(Stage::Downloading, Some(bundle_id));
        let slots = self
            .partitioner
            .partition(bundle_id, &task.image_url)
            .await
            .map_err(|e| (Stage::Downloading, e))?;
        self.transition(Stage::Partitioned, Some(bundle_id));

        self.publisher.clear(bundle_id);
        for slot in &slots {
            self.publisher
                .add_slot(bundle_id, &slot.slot_id.to_string(), &slot.url);
        }
        self.transition(Stage::Published, Some(bundle_id));

        let metadata = store::fetch_metadata(self.store.as_ref(), bundle_id)
            .await
            .map_err(|e| (Stage::Published, e))?;
        tracing::info!(bundle_id, rows = metadata.len(), "fetched coin metadata");
        self.transition(Stage::MetadataFetched, Some(bundle_id));

        let decisions = self
            .decider
            .classify(bundle_id, &task.image_url, &metadata)
            .await
            .map_err(|e| (Stage::MetadataFetched, PipelineError::Decision(e.to_string())))?;
        if decisions.is_empty() {
            return Err((
                Stage::MetadataFetched,
                PipelineError::Decision("classifier returned no decisions".into()),
            ));
        }
        tracing::info!(bundle_id, ?decisions, "received decisions");
        warn_on_slot_mismatch(bundle_id, &metadata, &decisions);
        self.transition(Stage::Decided, Some(bundle_id));

        let report = self.persister.persist(bundle_id, &decisions).await;
        self.transition(Stage::Persisted, Some(bundle_id));

        self.publisher.overlay(&decisions);
        tokio::time::sleep(self.fade_delay).await;
        self.publisher.fade_out();

        Ok(report)
    }

    fn abort(&self, bundle_id: Option<String>, stage: Stage, e: PipelineError) -> CycleOutcome {
        match &bundle_id {
            Some(id) => tracing::error!(bundle_id = %id, stage = %stage, "bundle aborted: {e}"),
            None => tracing::error!(stage = %stage, "queue item dropped: {e}"),
        }
        self.finish(bundle_id.clone(), Stage::Aborted);
        CycleOutcome::Aborted {
            bundle_id,
            stage,
            error: e.to_string(),
        }
    }

    fn transition(&self, stage: Stage, bundle_id: Option<&str>) {
        tracing::debug!(stage = %stage, bundle_id, "pipeline transition");
        self.status.send_modify(|s| {
            s.stage = stage;
            s.bundle_id = bundle_id.map(str::to_string);
            s.updated_at = Utc::now();
        });
    }

    /// Record the terminal stage and return to `Idle` with no bundle in flight.
    fn finish(&self, bundle_id: Option<String>, outcome: Stage) {
        let now = Utc::now();
        self.status.send_modify(|s| {
            s.stage = Stage::Idle;
            s.bundle_id = None;
            s.updated_at = now;
            s.last = Some(LastCycle {
                bundle_id,
                outcome,
                finished_at: now,
            });
        });
    }
}

/// Decisions and metadata should cover the same slots. A mismatch is a data
/// quality problem, not a failure: extra or missing entries are logged and
/// otherwise ignored.
fn warn_on_slot_mismatch(bundle_id: &str, metadata: &[CoinMetadata], decisions: &[Decision]) {
    let expected: BTreeSet<&str> = metadata.iter().map(|m| m.slot_id.as_str()).collect();
    let got: BTreeSet<&str> = decisions.iter().map(|d| d.slot_id.as_str()).collect();

    let missing: Vec<&str> = expected.difference(&got).copied().collect();
    let extra: Vec<&str> = got.difference(&expected).copied().collect();
    if !missing.is_empty() || !extra.is_empty() {
        tracing::warn!(bundle_id, ?missing, ?extra, "decision slots do not match metadata slots");
    }
}
