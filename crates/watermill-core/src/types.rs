use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

use crate::error::{PipelineError, Result};
use crate::paths;

// ---------------------------------------------------------------------------
// BundleTask
// ---------------------------------------------------------------------------

/// One unit of work popped from the bundle queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleTask {
    pub bundle_id: String,
    pub image_url: String,
}

#[derive(Deserialize)]
struct RawTask {
    #[serde(default)]
    bundle_id: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

impl BundleTask {
    pub fn new(bundle_id: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            image_url: image_url.into(),
        }
    }

    /// Decode a raw queue payload.
    ///
    /// Both fields must be present and non-empty, and `bundle_id` must be usable
    /// as a single directory name.
    pub fn decode(raw: &str) -> Result<Self> {
        let parsed: RawTask = serde_json::from_str(raw)
            .map_err(|e| PipelineError::QueueDecode(format!("invalid JSON: {e}")))?;

        let bundle_id = parsed
            .bundle_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| PipelineError::QueueDecode("missing bundle_id".into()))?;
        let image_url = parsed
            .image_url
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| PipelineError::QueueDecode("missing image_url".into()))?;

        paths::validate_bundle_id(&bundle_id)?;

        Ok(Self {
            bundle_id,
            image_url,
        })
    }
}

// ---------------------------------------------------------------------------
// SlotId
// ---------------------------------------------------------------------------

/// Number of grid positions in every bundle image.
pub const SLOT_COUNT: usize = 8;

/// One of the eight fixed grid positions, displayed as `"01"`..`"08"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(u8);

impl SlotId {
    pub fn new(n: u8) -> Option<Self> {
        (1..=SLOT_COUNT as u8).contains(&n).then_some(Self(n))
    }

    /// Parse `"01"`..`"08"`. Unpadded digits (`"3"`) are accepted too since
    /// the classifier does not always echo the padding back.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse::<u8>().ok().and_then(Self::new)
    }

    /// All slots in row-major order.
    pub fn all() -> impl Iterator<Item = SlotId> {
        (1..=SLOT_COUNT as u8).map(SlotId)
    }

    /// Zero-based position in row-major order.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn file_name(self) -> String {
        format!("{self}.png")
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Serialize for SlotId {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        SlotId::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid slot id '{raw}'")))
    }
}

// ---------------------------------------------------------------------------
// CoinSlot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn overlaps(&self, other: &PixelRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// A cropped sub-image persisted during partitioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinSlot {
    pub slot_id: SlotId,
    pub rect: PixelRect,
    /// Where the crop was written on disk.
    pub path: PathBuf,
    /// Viewer-facing URL of the crop.
    pub url: String,
}

// ---------------------------------------------------------------------------
// CoinMetadata
// ---------------------------------------------------------------------------

/// Descriptive metadata for one slot, as sent to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinMetadata {
    #[serde(rename = "id")]
    pub slot_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub description: String,
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Yes,
    No,
}

impl Verdict {
    /// Anything other than a (case-insensitive) "yes" is a no.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("yes") {
            Verdict::Yes
        } else {
            Verdict::No
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Yes => "yes",
            Verdict::No => "no",
        }
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(Verdict::from_label(&raw))
    }
}

/// The classifier's verdict for one slot.
///
/// Fields beyond `id` and `decision` (a reason, a confidence) are kept in
/// `extra` and forwarded to the viewer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "id", deserialize_with = "string_or_number")]
    pub slot_id: String,
    #[serde(rename = "decision")]
    pub verdict: Verdict,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Decision {
    pub fn new(slot_id: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            slot_id: slot_id.into(),
            verdict,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_yes(&self) -> bool {
        self.verdict == Verdict::Yes
    }
}

/// Ids and slot numbers arrive as text or integers depending on who wrote
/// them (a PostgREST column type, a model that drops the quotes).
pub(crate) fn string_or_number<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// GoodCoinRecord
// ---------------------------------------------------------------------------

/// A persisted row for a positively classified slot.
///
/// Created without an image URL; the URL is attached by a second update once
/// the crop has been uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodCoinRecord {
    pub id: String,
    pub coin_uuid: String,
    pub image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
