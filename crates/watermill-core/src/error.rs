use std::path::PathBuf;

use thiserror::Error;

/// Stage failures that abort a bundle.
///
/// Every variant here ends processing of the current bundle; the task is not
/// returned to the queue.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed queue item: {0}")]
    QueueDecode(String),

    #[error("failed to fetch image '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to partition slot {slot}: {reason}")]
    Partition { slot: String, reason: String },

    #[error("failed to fetch coin metadata: {0}")]
    Metadata(#[source] StoreError),

    #[error("no usable decision: {0}")]
    Decision(String),

    #[error("task source unavailable: {0}")]
    Queue(#[from] QueueError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Per-slot persistence failure. Never aborts the bundle.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("decision references unknown slot '{0}'")]
    InvalidSlot(String),

    #[error("duplicate decision for slot {0}")]
    DuplicateSlot(String),

    #[error("coin image not found: {}", .0.display())]
    MissingCrop(PathBuf),

    #[error("no coin row for (bundle_id={bundle_id}, coin_id={slot_id})")]
    ReferenceNotFound { bundle_id: String, slot_id: String },

    #[error("coin reference lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("goodcoins insert returned no row for coin_uuid={0}")]
    InsertRejected(String),

    #[error("goodcoins insert failed: {0}")]
    Insert(#[source] StoreError),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected store response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid object name '{0}'")]
    InvalidName(String),

    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blob store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
