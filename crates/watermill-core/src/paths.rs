use crate::error::{PipelineError, Result, UploadError};
use crate::types::SlotId;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

/// Subdirectory of the static dir that holds per-bundle coin crops.
pub const COINS_DIR: &str = "coins";

/// URL prefix the static dir is mounted under.
pub const STATIC_URL_PREFIX: &str = "/static";

pub const INDEX_HTML: &str = "index.html";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn coins_dir(static_dir: &Path) -> PathBuf {
    static_dir.join(COINS_DIR)
}

pub fn bundle_dir(static_dir: &Path, bundle_id: &str) -> PathBuf {
    coins_dir(static_dir).join(bundle_id)
}

pub fn coin_path(static_dir: &Path, bundle_id: &str, slot: SlotId) -> PathBuf {
    bundle_dir(static_dir, bundle_id).join(slot.file_name())
}

/// Viewer-facing URL for a crop, e.g. `/static/coins/b1/01.png`.
pub fn coin_url(bundle_id: &str, slot: SlotId) -> String {
    format!(
        "{STATIC_URL_PREFIX}/{COINS_DIR}/{bundle_id}/{}",
        slot.file_name()
    )
}

pub fn index_html(static_dir: &Path) -> PathBuf {
    static_dir.join(INDEX_HTML)
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static SEGMENT_RE: OnceLock<Regex> = OnceLock::new();

fn segment_re() -> &'static Regex {
    SEGMENT_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("static regex"))
}

static OBJECT_RE: OnceLock<Regex> = OnceLock::new();

fn object_re() -> &'static Regex {
    OBJECT_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_\-][A-Za-z0-9_\-.]*$").expect("static regex")
    })
}

/// A bundle id becomes a directory name, so it must be a single safe segment.
pub fn validate_bundle_id(bundle_id: &str) -> Result<()> {
    if bundle_id.is_empty() || bundle_id.len() > 128 || !segment_re().is_match(bundle_id) {
        return Err(PipelineError::QueueDecode(format!(
            "invalid bundle_id '{bundle_id}'"
        )));
    }
    Ok(())
}

/// Blob object names are a single segment and may carry an extension.
pub fn validate_object_name(name: &str) -> std::result::Result<(), UploadError> {
    if name.is_empty() || name.len() > 255 || name.contains("..") || !object_re().is_match(name) {
        return Err(UploadError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_bundle_ids() {
        for id in ["b1", "bundle_2024-01", "3f2a9c1e-0d5b-4c7e-9f00-1a2b3c4d5e6f"] {
            validate_bundle_id(id).unwrap_or_else(|_| panic!("expected valid: {id}"));
        }
    }

    #[test]
    fn invalid_bundle_ids() {
        for id in ["", "..", "a/b", "has spaces", "b1.png", "x\\y"] {
            assert!(validate_bundle_id(id).is_err(), "expected invalid: {id}");
        }
    }

    #[test]
    fn object_names() {
        for name in ["12.png", "shot_01.jpeg", "lens-capture"] {
            validate_object_name(name).unwrap_or_else(|_| panic!("expected valid: {name}"));
        }
        for name in ["", "../x.png", "a/b.png", ".hidden", "a..b"] {
            assert!(validate_object_name(name).is_err(), "expected invalid: {name}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/srv/frontend");
        let slot = SlotId::new(1).unwrap();
        assert_eq!(
            coin_path(root, "b1", slot),
            PathBuf::from("/srv/frontend/coins/b1/01.png")
        );
        assert_eq!(coin_url("b1", slot), "/static/coins/b1/01.png");
        assert_eq!(index_html(root), PathBuf::from("/srv/frontend/index.html"));
    }
}
