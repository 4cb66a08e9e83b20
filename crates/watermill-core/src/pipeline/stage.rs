use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the orchestrator is in processing the current bundle.
///
/// Transitions: `Idle → Dequeued → Downloading → Partitioned → Published →
/// MetadataFetched → Decided → Persisted → Finalized`. Any stage failure moves
/// straight to `Aborted`. Both terminal stages drop back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Dequeued,
    Downloading,
    Partitioned,
    Published,
    MetadataFetched,
    Decided,
    Persisted,
    Finalized,
    Aborted,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Dequeued => "dequeued",
            Stage::Downloading => "downloading",
            Stage::Partitioned => "partitioned",
            Stage::Published => "published",
            Stage::MetadataFetched => "metadata_fetched",
            Stage::Decided => "decided",
            Stage::Persisted => "persisted",
            Stage::Finalized => "finalized",
            Stage::Aborted => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Finalized | Stage::Aborted)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the previous bundle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastCycle {
    pub bundle_id: Option<String>,
    /// `Finalized` or `Aborted`.
    pub outcome: Stage,
    pub finished_at: DateTime<Utc>,
}

/// Snapshot published by the orchestrator on every transition.
///
/// `bundle_id` is the bundle currently in flight and is cleared once the
/// bundle finalizes or aborts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub stage: Stage,
    pub bundle_id: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub last: Option<LastCycle>,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self::idle()
    }
}

impl PipelineStatus {
    pub fn idle() -> Self {
        Self {
            stage: Stage::Idle,
            bundle_id: None,
            updated_at: Utc::now(),
            last: None,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.bundle_id.is_some()
    }
}
