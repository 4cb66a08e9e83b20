use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "watermill.yaml";

const REDACTED: &str = "***";

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_queue_key")]
    pub key: String,
}

fn default_redis_url() -> String {
    "redis://localhost:6380/0".to_string()
}

fn default_queue_key() -> String {
    "bundle_queue".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            key: default_queue_key(),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// PostgREST (Supabase) connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub key: String,
}

// ---------------------------------------------------------------------------
// DeciderConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeciderConfig {
    #[serde(default = "default_decider_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_decider_model")]
    pub model: String,
    #[serde(default = "default_decider_timeout")]
    pub timeout_secs: u64,
}

fn default_decider_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_decider_model() -> String {
    "gpt-4o".to_string()
}

fn default_decider_timeout() -> u64 {
    120
}

impl Default for DeciderConfig {
    fn default() -> Self {
        Self {
            base_url: default_decider_base_url(),
            api_key: String::new(),
            model: default_decider_model(),
            timeout_secs: default_decider_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// BlobConfig
// ---------------------------------------------------------------------------

/// Object storage target. Each uploader writes under its own prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub token: String,
    /// Base of the public URLs handed back after upload. Falls back to
    /// `endpoint` when empty.
    #[serde(default)]
    pub public_base_url: String,
    #[serde(default = "default_coins_prefix")]
    pub coins_prefix: String,
    #[serde(default = "default_screenshots_prefix")]
    pub screenshots_prefix: String,
    #[serde(default = "default_lens_prefix")]
    pub lens_prefix: String,
}

fn default_coins_prefix() -> String {
    "coins".to_string()
}

fn default_screenshots_prefix() -> String {
    "screenshots".to_string()
}

fn default_lens_prefix() -> String {
    "lens".to_string()
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            public_base_url: String::new(),
            coins_prefix: default_coins_prefix(),
            screenshots_prefix: default_screenshots_prefix(),
            lens_prefix: default_lens_prefix(),
        }
    }
}

impl BlobConfig {
    pub fn public_base(&self) -> &str {
        if self.public_base_url.is_empty() {
            &self.endpoint
        } else {
            &self.public_base_url
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_fade_delay")]
    pub fade_delay_ms: u64,
    /// Directory served under `/static`; coin crops land in `<static_dir>/coins`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_download_timeout() -> u64 {
    10
}

fn default_fade_delay() -> u64 {
    1000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("frontend")
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            download_timeout_secs: default_download_timeout(),
            fade_delay_ms: default_fade_delay(),
            static_dir: default_static_dir(),
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn fade_delay(&self) -> Duration {
        Duration::from_millis(self.fade_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub decider: DeciderConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load from `path` if given, else from `./watermill.yaml` when present,
    /// else start from defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(CONFIG_FILE).is_file() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    /// Override fields from environment-style lookups.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("REDIS_URL") {
            self.queue.redis_url = v;
        }
        if let Some(v) = get("BUNDLE_QUEUE") {
            self.queue.key = v;
        }
        if let Some(v) = get("SUPABASE_URL") {
            self.store.url = v;
        }
        if let Some(v) = get("SUPABASE_KEY") {
            self.store.key = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.decider.api_key = v;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.decider.base_url = v;
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.decider.model = v;
        }
        if let Some(v) = get("BLOB_ENDPOINT") {
            self.blob.endpoint = v;
        }
        if let Some(v) = get("BLOB_TOKEN") {
            self.blob.token = v;
        }
        if let Some(v) = get("BLOB_PUBLIC_URL") {
            self.blob.public_base_url = v;
        }
        if let Some(v) = get("WATERMILL_STATIC_DIR") {
            self.pipeline.static_dir = PathBuf::from(v);
        }
        if let Some(v) = get("WATERMILL_PORT") {
            self.server.port = v.parse().map_err(|_| ConfigError::Invalid {
                key: "WATERMILL_PORT",
                reason: format!("'{v}' is not a port number"),
            })?;
        }
        Ok(())
    }

    /// Check the settings the worker cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.url.is_empty() {
            return Err(ConfigError::Missing("store.url (SUPABASE_URL)"));
        }
        if self.store.key.is_empty() {
            return Err(ConfigError::Missing("store.key (SUPABASE_KEY)"));
        }
        if self.decider.api_key.is_empty() {
            return Err(ConfigError::Missing("decider.api_key (OPENAI_API_KEY)"));
        }
        self.validate_uploads()?;
        if self.pipeline.download_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "pipeline.download_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Check the settings the upload routes need. This is all a server
    /// without the worker requires.
    pub fn validate_uploads(&self) -> Result<(), ConfigError> {
        if self.blob.endpoint.is_empty() {
            return Err(ConfigError::Missing("blob.endpoint (BLOB_ENDPOINT)"));
        }
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut c = self.clone();
        for secret in [
            &mut c.store.key,
            &mut c.decider.api_key,
            &mut c.blob.token,
        ] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        c
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete() -> Config {
        let mut c = Config::default();
        c.store.url = "https://db.example".into();
        c.store.key = "service-key".into();
        c.decider.api_key = "sk-test".into();
        c.blob.endpoint = "https://blob.example".into();
        c
    }

    #[test]
    fn defaults_match_worker_expectations() {
        let c = Config::default();
        assert_eq!(c.queue.key, "bundle_queue");
        assert_eq!(c.queue.redis_url, "redis://localhost:6380/0");
        assert_eq!(c.pipeline.poll_interval(), Duration::from_secs(5));
        assert_eq!(c.pipeline.download_timeout(), Duration::from_secs(10));
        assert_eq!(c.pipeline.fade_delay(), Duration::from_secs(1));
        assert_eq!(c.server.port, 5000);
        assert_eq!(c.blob.coins_prefix, "coins");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let c = Config::from_yaml("queue:\n  key: other_queue\nserver:\n  port: 8080\n").unwrap();
        assert_eq!(c.queue.key, "other_queue");
        assert_eq!(c.queue.redis_url, "redis://localhost:6380/0");
        assert_eq!(c.server.port, 8080);
        assert_eq!(c.pipeline.poll_interval_secs, 5);
    }

    #[test]
    fn empty_yaml_is_default() {
        let c = Config::from_yaml("").unwrap();
        assert_eq!(c.server.host, "0.0.0.0");
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("SUPABASE_URL", "https://env.db"),
            ("REDIS_URL", "redis://queue:6379/1"),
            ("WATERMILL_PORT", "7000"),
            ("OPENAI_MODEL", ""),
        ]
        .into_iter()
        .collect();
        let mut c = Config::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(c.store.url, "https://env.db");
        assert_eq!(c.queue.redis_url, "redis://queue:6379/1");
        assert_eq!(c.server.port, 7000);
        // Empty values do not clobber defaults.
        assert_eq!(c.decider.model, "gpt-4o");
    }

    #[test]
    fn invalid_port_in_env_is_rejected() {
        let mut c = Config::default();
        let err = c
            .apply_env(|k| (k == "WATERMILL_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn validate_requires_store_and_keys() {
        assert!(matches!(
            Config::default().validate(),
            Err(ConfigError::Missing(_))
        ));
        complete().validate().unwrap();

        let mut c = complete();
        c.blob.endpoint.clear();
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("BLOB_ENDPOINT"));
    }

    #[test]
    fn upload_validation_needs_only_blob_endpoint() {
        let err = Config::default().validate_uploads().unwrap_err();
        assert!(err.to_string().contains("BLOB_ENDPOINT"));

        let mut c = Config::default();
        c.blob.endpoint = "https://blob.example".into();
        c.validate_uploads().unwrap();
        assert!(c.validate().is_err());
    }

    #[test]
    fn redacted_masks_secrets() {
        let r = complete().redacted();
        assert_eq!(r.store.key, "***");
        assert_eq!(r.decider.api_key, "***");
        assert_eq!(r.store.url, "https://db.example");
        // Unset secrets stay empty so it is obvious they are missing.
        assert_eq!(r.blob.token, "");
    }

    #[test]
    fn public_base_falls_back_to_endpoint() {
        let mut b = BlobConfig::default();
        b.endpoint = "https://blob.example".into();
        assert_eq!(b.public_base(), "https://blob.example");
        b.public_base_url = "https://cdn.example".into();
        assert_eq!(b.public_base(), "https://cdn.example");
    }
}
