//! Image Partitioner: download a bundle image and slice it into the fixed
//! 2 x 4 coin grid.

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::paths;
use crate::types::{CoinSlot, PixelRect, SlotId};

pub const IMAGE_WIDTH: u32 = 512;
pub const IMAGE_HEIGHT: u32 = 512;
pub const GRID_COLS: u32 = 2;
pub const GRID_ROWS: u32 = 4;
pub const BOX_WIDTH: u32 = IMAGE_WIDTH / GRID_COLS;
pub const BOX_HEIGHT: u32 = IMAGE_HEIGHT / GRID_ROWS;

// ---------------------------------------------------------------------------
// Grid geometry
// ---------------------------------------------------------------------------

/// Rectangle of `slot` in the canonical image, row-major from the top left.
pub fn slot_rect(slot: SlotId) -> PixelRect {
    let i = slot.index() as u32;
    let row = i / GRID_COLS;
    let col = i % GRID_COLS;
    PixelRect {
        x: col * BOX_WIDTH,
        y: row * BOX_HEIGHT,
        width: BOX_WIDTH,
        height: BOX_HEIGHT,
    }
}

pub fn grid() -> Vec<(SlotId, PixelRect)> {
    SlotId::all().map(|s| (s, slot_rect(s))).collect()
}

// ---------------------------------------------------------------------------
// Partitioner
// ---------------------------------------------------------------------------

pub struct Partitioner {
    client: reqwest::Client,
    static_dir: PathBuf,
}

impl Partitioner {
    /// Build a partitioner whose downloads are bounded by `download_timeout`.
    pub fn new(
        static_dir: impl Into<PathBuf>,
        download_timeout: Duration,
    ) -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(download_timeout)
            .build()?;
        Ok(Self::with_client(client, static_dir))
    }

    pub fn with_client(client: reqwest::Client, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            static_dir: static_dir.into(),
        }
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    /// Download `image_url`, normalize it and write all eight crops under
    /// `<static_dir>/coins/<bundle_id>/`.
    ///
    /// Returns the slots in row-major order. Any single crop failure fails the
    /// whole call.
    pub async fn partition(&self, bundle_id: &str, image_url: &str) -> Result<Vec<CoinSlot>> {
        let bytes = self.fetch(image_url).await?;

        let static_dir = self.static_dir.clone();
        let bundle_id = bundle_id.to_string();
        let url = image_url.to_string();
        tokio::task::spawn_blocking(move || {
            let img = decode_canonical(&bytes, &url)?;
            write_slots(&img, &static_dir, &bundle_id)
        })
        .await
        .map_err(|e| PipelineError::Partition {
            slot: "*".into(),
            reason: format!("task join error: {e}"),
        })?
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_err = |reason: String| PipelineError::Fetch {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_err(e.to_string()))?;
        let bytes = resp.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Decode and normalize to the canonical size in RGBA.
pub fn decode_canonical(bytes: &[u8], url: &str) -> Result<RgbaImage> {
    let img = image::load_from_memory(bytes).map_err(|e| PipelineError::Fetch {
        url: url.to_string(),
        reason: format!("not a decodable image: {e}"),
    })?;

    if img.width() == IMAGE_WIDTH && img.height() == IMAGE_HEIGHT {
        Ok(img.to_rgba8())
    } else {
        tracing::debug!(
            width = img.width(),
            height = img.height(),
            "resizing bundle image to canonical size"
        );
        Ok(img
            .resize_exact(IMAGE_WIDTH, IMAGE_HEIGHT, FilterType::Triangle)
            .to_rgba8())
    }
}

/// Crop every slot out of a canonical image and save it as PNG.
pub fn write_slots(img: &RgbaImage, static_dir: &Path, bundle_id: &str) -> Result<Vec<CoinSlot>> {
    let dir = paths::bundle_dir(static_dir, bundle_id);
    std::fs::create_dir_all(&dir).map_err(|e| PipelineError::Partition {
        slot: "*".into(),
        reason: format!("cannot create {}: {e}", dir.display()),
    })?;

    let mut slots = Vec::with_capacity(crate::types::SLOT_COUNT);
    for (slot, rect) in grid() {
        let path = paths::coin_path(static_dir, bundle_id, slot);
        let crop = imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image();
        crop.save_with_format(&path, ImageFormat::Png)
            .map_err(|e| PipelineError::Partition {
                slot: slot.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(bundle_id, slot_id = %slot, path = %path.display(), "saved coin crop");

        slots.push(CoinSlot {
            slot_id: slot,
            rect,
            path,
            url: paths::coin_url(bundle_id, slot),
        });
    }
    Ok(slots)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
