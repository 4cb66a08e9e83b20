//! Result Persister: one `goodcoins` row and one upload per "yes" slot.
//!
//! Each slot is handled on its own. A failure is logged, recorded in the
//! report and the next slot is processed. Writes are two separate steps
//! (insert, then attach the URL) with no transaction: a row is visible
//! without an image until the upload finishes, and stays that way if the
//! upload fails.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::blob::{self, BlobUploader};
use crate::error::PersistError;
use crate::paths;
use crate::store::CoinStore;
use crate::types::{Decision, GoodCoinRecord, SlotId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSlot {
    pub slot_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    /// Number of "yes" verdicts seen.
    pub yes_count: usize,
    /// Rows created, with `image_url` set when the upload succeeded.
    pub records: Vec<GoodCoinRecord>,
    pub skipped: Vec<SkippedSlot>,
}

impl PersistReport {
    pub fn created(&self) -> usize {
        self.records.len()
    }

    pub fn uploaded(&self) -> usize {
        self.records.iter().filter(|r| r.image_url.is_some()).count()
    }
}

pub struct ResultPersister {
    store: Arc<dyn CoinStore>,
    uploader: Arc<dyn BlobUploader>,
    static_dir: PathBuf,
}

impl ResultPersister {
    pub fn new(
        store: Arc<dyn CoinStore>,
        uploader: Arc<dyn BlobUploader>,
        static_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            uploader,
            static_dir: static_dir.into(),
        }
    }

    /// Slots are keyed by their canonical id, so `"1"` and `"01"` are the
    /// same slot. Only the first "yes" for a slot is persisted.
    pub async fn persist(&self, bundle_id: &str, decisions: &[Decision]) -> PersistReport {
        let mut report = PersistReport::default();
        let mut seen = BTreeSet::new();

        for decision in decisions.iter().filter(|d| d.is_yes()) {
            report.yes_count += 1;
            let result = match SlotId::parse(&decision.slot_id) {
                None => Err(PersistError::InvalidSlot(decision.slot_id.clone())),
                Some(slot) if !seen.insert(slot) => {
                    Err(PersistError::DuplicateSlot(slot.to_string()))
                }
                Some(slot) => self.persist_slot(bundle_id, slot).await,
            };
            match result {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    match &e {
                        PersistError::ReferenceNotFound { .. } | PersistError::DuplicateSlot(_) => {
                            tracing::warn!(bundle_id, slot_id = %decision.slot_id, "{e}")
                        }
                        _ => tracing::error!(bundle_id, slot_id = %decision.slot_id, "{e}"),
                    }
                    report.skipped.push(SkippedSlot {
                        slot_id: decision.slot_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    async fn persist_slot(
        &self,
        bundle_id: &str,
        slot: SlotId,
    ) -> Result<GoodCoinRecord, PersistError> {
        let local = paths::coin_path(&self.static_dir, bundle_id, slot);
        let is_file = tokio::fs::metadata(&local)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(PersistError::MissingCrop(local));
        }

        let slot_id = slot.to_string();
        let coin_uuid = self
            .store
            .coin_reference(bundle_id, &slot_id)
            .await
            .map_err(PersistError::Lookup)?
            .ok_or_else(|| PersistError::ReferenceNotFound {
                bundle_id: bundle_id.to_string(),
                slot_id: slot_id.clone(),
            })?;

        let record_id = self
            .store
            .insert_good_coin(&coin_uuid)
            .await
            .map_err(PersistError::Insert)?
            .ok_or_else(|| PersistError::InsertRejected(coin_uuid.clone()))?;

        let mut record = GoodCoinRecord {
            id: record_id,
            coin_uuid,
            image_url: None,
        };

        let object_name = format!("{}.png", record.id);
        match blob::upload_file(self.uploader.as_ref(), &local, &object_name).await {
            Ok(url) => match self.store.set_good_coin_image(&record.id, &url).await {
                Ok(()) => {
                    tracing::info!(record_id = %record.id, image = %url, "updated goodcoins row with image");
                    record.image_url = Some(url);
                }
                Err(e) => {
                    tracing::error!(record_id = %record.id, "failed to attach image url: {e}");
                }
            },
            Err(e) => {
                tracing::warn!(coin_uuid = %record.coin_uuid, "coin upload failed: {e}");
            }
        }

        Ok(record)
    }
}
