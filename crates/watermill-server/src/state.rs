use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use watermill_core::blob::BlobUploader;
use watermill_core::events::EventPublisher;
use watermill_core::pipeline::PipelineStatus;

/// Shared state for all handlers.
///
/// The publisher and the status receiver are the same ones the pipeline loop
/// holds, so handlers push into the same feed the orchestrator drives.
#[derive(Clone)]
pub struct AppState {
    pub publisher: EventPublisher,
    pub status: watch::Receiver<PipelineStatus>,
    /// Target for `/upload_screenshot`.
    pub screenshots: Arc<dyn BlobUploader>,
    /// Target for `/upload_screenshot_lens`.
    pub lens: Arc<dyn BlobUploader>,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(
        publisher: EventPublisher,
        status: watch::Receiver<PipelineStatus>,
        screenshots: Arc<dyn BlobUploader>,
        lens: Arc<dyn BlobUploader>,
        static_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            publisher,
            status,
            screenshots,
            lens,
            static_dir: static_dir.into(),
        }
    }

    /// State for a server running without a pipeline loop: the status stays
    /// idle forever.
    pub fn detached(
        publisher: EventPublisher,
        screenshots: Arc<dyn BlobUploader>,
        lens: Arc<dyn BlobUploader>,
        static_dir: impl Into<PathBuf>,
    ) -> Self {
        let (_, rx) = watch::channel(PipelineStatus::idle());
        Self::new(publisher, rx, screenshots, lens, static_dir)
    }
}
