use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use watermill_core::blob::{self, BlobUploader};
use watermill_core::error::UploadError;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScreenshotBody {
    #[serde(default)]
    pub base64: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// `{success, cloudflareUrl}` on success, `{success: false, message}` otherwise.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(rename = "cloudflareUrl", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadResponse {
    fn ok(url: String) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                url: Some(url),
                message: None,
            }),
        )
    }

    fn failed(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                success: false,
                url: None,
                message: Some(message.into()),
            }),
        )
    }
}

/// POST /upload_screenshot
pub async fn upload_screenshot(
    State(app): State<AppState>,
    body: Result<Json<ScreenshotBody>, JsonRejection>,
) -> (StatusCode, Json<UploadResponse>) {
    relay(app.screenshots.as_ref(), "screenshots", body).await
}

/// POST /upload_screenshot_lens: same contract, lens namespace.
pub async fn upload_screenshot_lens(
    State(app): State<AppState>,
    body: Result<Json<ScreenshotBody>, JsonRejection>,
) -> (StatusCode, Json<UploadResponse>) {
    relay(app.lens.as_ref(), "lens", body).await
}

async fn relay(
    uploader: &dyn BlobUploader,
    namespace: &str,
    body: Result<Json<ScreenshotBody>, JsonRejection>,
) -> (StatusCode, Json<UploadResponse>) {
    let Ok(Json(body)) = body else {
        return UploadResponse::failed(StatusCode::BAD_REQUEST, "Missing base64 or filename");
    };
    let (Some(encoded), Some(filename)) = (body.base64, body.filename) else {
        return UploadResponse::failed(StatusCode::BAD_REQUEST, "Missing base64 or filename");
    };

    let bytes = match decode_image(&encoded) {
        Ok(bytes) => bytes,
        Err(e) => {
            return UploadResponse::failed(StatusCode::BAD_REQUEST, format!("invalid base64: {e}"))
        }
    };

    let content_type = blob::content_type_for(&filename);
    match uploader.upload(&filename, bytes, content_type).await {
        Ok(url) => {
            tracing::info!(namespace, filename = %filename, url = %url, "screenshot uploaded");
            UploadResponse::ok(url)
        }
        Err(e) => {
            let status = match &e {
                UploadError::InvalidName(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::error!(namespace, filename = %filename, "screenshot upload failed: {e}");
            UploadResponse::failed(status, e.to_string())
        }
    }
}

/// Decode standard base64, tolerating a `data:<mime>;base64,` prefix.
fn decode_image(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let data = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    STANDARD.decode(data.trim())
}
