//! Object storage uploads for coin crops and screenshots.

use async_trait::async_trait;
use std::path::Path;

use crate::config::BlobConfig;
use crate::error::UploadError;
use crate::paths;

#[async_trait]
pub trait BlobUploader: Send + Sync {
    /// Store `bytes` under `name` and return the public URL.
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, UploadError>;
}

/// Read a local file and upload it.
pub async fn upload_file(
    uploader: &dyn BlobUploader,
    path: &Path,
    name: &str,
) -> Result<String, UploadError> {
    let bytes = tokio::fs::read(path).await?;
    uploader.upload(name, bytes, content_type_for(name)).await
}

pub fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// HttpBlobUploader
// ---------------------------------------------------------------------------

/// `PUT <endpoint>/<prefix>/<name>` with a bearer token; the object is then
/// served from `<public_base>/<prefix>/<name>`.
pub struct HttpBlobUploader {
    client: reqwest::Client,
    endpoint: String,
    public_base: String,
    token: String,
    prefix: String,
}

impl HttpBlobUploader {
    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        public_base: &str,
        token: impl Into<String>,
        prefix: &str,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
            token: token.into(),
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn coins(client: reqwest::Client, cfg: &BlobConfig) -> Self {
        Self::new(client, &cfg.endpoint, cfg.public_base(), &cfg.token, &cfg.coins_prefix)
    }

    pub fn screenshots(client: reqwest::Client, cfg: &BlobConfig) -> Self {
        Self::new(
            client,
            &cfg.endpoint,
            cfg.public_base(),
            &cfg.token,
            &cfg.screenshots_prefix,
        )
    }

    pub fn lens(client: reqwest::Client, cfg: &BlobConfig) -> Self {
        Self::new(client, &cfg.endpoint, cfg.public_base(), &cfg.token, &cfg.lens_prefix)
    }

    fn object_path(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.prefix)
        }
    }
}

#[async_trait]
impl BlobUploader for HttpBlobUploader {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, UploadError> {
        paths::validate_object_name(name)?;
        let object = self.object_path(name);

        let mut req = self
            .client
            .put(format!("{}/{object}", self.endpoint))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let url = format!("{}/{object}", self.public_base);
        tracing::info!(object = %object, url = %url, "uploaded blob");
        Ok(url)
    }
}
