#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{broadcast, watch};

use watermill_core::blob::BlobUploader;
use watermill_core::decision::DecisionClient;
use watermill_core::error::{StoreError, UploadError};
use watermill_core::events::LiveEvent;
use watermill_core::pipeline::PipelineStatus;
use watermill_core::store::CoinStore;
use watermill_core::types::{CoinMetadata, Decision, GoodCoinRecord, Verdict};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    pub metadata: Vec<CoinMetadata>,
    /// slot id -> coins.id
    pub references: HashMap<String, String>,
    pub fail_metadata: bool,
    pub reject_inserts: bool,
    pub calls: AtomicUsize,
    pub records: Mutex<Vec<GoodCoinRecord>>,
    next_id: AtomicUsize,
}

impl FakeStore {
    /// Eight metadata rows; references only for the listed slots.
    pub fn with_references(slots: &[&str]) -> Self {
        Self {
            metadata: (1..=8)
                .map(|i| CoinMetadata {
                    slot_id: format!("{i:02}"),
                    name: format!("Coin {i}"),
                    symbol: format!("C{i}"),
                    description: String::new(),
                })
                .collect(),
            references: slots
                .iter()
                .map(|s| (s.to_string(), format!("coin-uuid-{s}")))
                .collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<GoodCoinRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl CoinStore for FakeStore {
    async fn coin_metadata(&self, _bundle_id: &str) -> Result<Vec<CoinMetadata>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_metadata {
            return Err(StoreError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        // Reverse so the join has to sort.
        Ok(self.metadata.iter().rev().cloned().collect())
    }

    async fn coin_reference(
        &self,
        _bundle_id: &str,
        slot_id: &str,
    ) -> Result<Option<String>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.references.get(slot_id).cloned())
    }

    async fn insert_good_coin(&self, coin_uuid: &str) -> Result<Option<String>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_inserts {
            return Ok(None);
        }
        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 100).to_string();
        self.records.lock().unwrap().push(GoodCoinRecord {
            id: id.clone(),
            coin_uuid: coin_uuid.to_string(),
            image_url: None,
        });
        Ok(Some(id))
    }

    async fn set_good_coin_image(&self, record_id: &str, image_url: &str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| StoreError::Decode(format!("no goodcoins row {record_id}")))?;
        record.image_url = Some(image_url.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decider
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDecider {
    pub response: Option<Vec<Decision>>,
    pub calls: AtomicUsize,
    /// When set, the status seen at classification time is captured here.
    pub status: Mutex<Option<watch::Receiver<PipelineStatus>>>,
    pub seen_status: Mutex<Option<PipelineStatus>>,
    pub seen_metadata: Mutex<Vec<CoinMetadata>>,
}

impl FakeDecider {
    pub fn answering(verdicts: &[(&str, Verdict)]) -> Self {
        Self {
            response: Some(
                verdicts
                    .iter()
                    .map(|(id, v)| Decision::new(*id, *v))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionClient for FakeDecider {
    async fn classify(
        &self,
        _bundle_id: &str,
        _image_url: &str,
        metadata: &[CoinMetadata],
    ) -> Result<Vec<Decision>, Box<dyn std::error::Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_metadata.lock().unwrap() = metadata.to_vec();
        if let Some(rx) = self.status.lock().unwrap().as_ref() {
            *self.seen_status.lock().unwrap() = Some(rx.borrow().clone());
        }
        self.response
            .clone()
            .ok_or_else(|| "classifier produced no usable result".into())
    }
}

// ---------------------------------------------------------------------------
// Uploader
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeUploader {
    pub fail: bool,
    pub uploads: Mutex<Vec<String>>,
}

impl FakeUploader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobUploader for FakeUploader {
    async fn upload(
        &self,
        name: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, UploadError> {
        self.uploads.lock().unwrap().push(name.to_string());
        if self.fail {
            return Err(UploadError::Status {
                status: 500,
                body: "bucket offline".into(),
            });
        }
        Ok(format!("https://cdn.test/coins/{name}"))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn bundle_png() -> Vec<u8> {
    let img = RgbaImage::from_fn(512, 512, |x, y| {
        Rgba([(x / 2) as u8, (y / 2) as u8, 128, 255])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn drain(rx: &mut broadcast::Receiver<LiveEvent>) -> Vec<LiveEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

pub fn names(events: &[LiveEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}
