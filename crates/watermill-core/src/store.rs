//! Relational store access: coin metadata reads and `goodcoins` writes.
//!
//! The production store is Supabase, reached through its PostgREST API.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::error::{PipelineError, Result, StoreError};
use crate::types::{string_or_number, CoinMetadata};

const COINS_TABLE: &str = "coins";
const GOODCOINS_TABLE: &str = "goodcoins";

#[async_trait]
pub trait CoinStore: Send + Sync {
    /// All metadata rows for a bundle, in store order.
    async fn coin_metadata(&self, bundle_id: &str)
        -> std::result::Result<Vec<CoinMetadata>, StoreError>;

    /// Internal reference (`coins.id`) of one slot, if the row exists.
    async fn coin_reference(
        &self,
        bundle_id: &str,
        slot_id: &str,
    ) -> std::result::Result<Option<String>, StoreError>;

    /// Insert a `goodcoins` row without an image. Returns the new row id, or
    /// `None` when the store accepted the request but returned no row.
    async fn insert_good_coin(&self, coin_uuid: &str)
        -> std::result::Result<Option<String>, StoreError>;

    /// Attach the uploaded image URL to an existing `goodcoins` row.
    async fn set_good_coin_image(
        &self,
        record_id: &str,
        image_url: &str,
    ) -> std::result::Result<(), StoreError>;
}

/// Metadata Join: fetch a bundle's metadata sorted by slot id.
///
/// A store failure aborts the bundle since the decision request needs the
/// complete list.
pub async fn fetch_metadata(store: &dyn CoinStore, bundle_id: &str) -> Result<Vec<CoinMetadata>> {
    let mut rows = store
        .coin_metadata(bundle_id)
        .await
        .map_err(PipelineError::Metadata)?;
    rows.sort_by(|a, b| a.slot_id.cmp(&b.slot_id));
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Row shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CoinRow {
    #[serde(deserialize_with = "string_or_number")]
    coin_id: String,
    #[serde(default)]
    metadata_name: Option<String>,
    #[serde(default)]
    metadata_symbol: Option<String>,
    #[serde(default)]
    metadata_description: Option<String>,
}

impl From<CoinRow> for CoinMetadata {
    fn from(row: CoinRow) -> Self {
        CoinMetadata {
            slot_id: row.coin_id,
            name: row.metadata_name.unwrap_or_default(),
            symbol: row.metadata_symbol.unwrap_or_default(),
            description: row.metadata_description.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
}

// ---------------------------------------------------------------------------
// PostgrestStore
// ---------------------------------------------------------------------------

pub struct PostgrestStore {
    client: reqwest::Client,
    rest_url: String,
    key: String,
}

impl PostgrestStore {
    pub fn new(url: &str, key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url, key)
    }

    pub fn with_client(client: reqwest::Client, url: &str, key: impl Into<String>) -> Self {
        Self {
            client,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            key: key.into(),
        }
    }

    /// Cheap read used at startup; an unreachable store is fatal there.
    pub async fn health_check(&self) -> std::result::Result<(), StoreError> {
        let resp = self
            .request(Method::GET, COINS_TABLE)
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        let _: Vec<serde_json::Value> = read_json(resp).await?;
        Ok(())
    }

    fn request(&self, method: Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{table}", self.rest_url))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }
}

async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> std::result::Result<T, StoreError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| StoreError::Decode(format!("{e}: {body}")))
}

#[async_trait]
impl CoinStore for PostgrestStore {
    async fn coin_metadata(
        &self,
        bundle_id: &str,
    ) -> std::result::Result<Vec<CoinMetadata>, StoreError> {
        let resp = self
            .request(Method::GET, COINS_TABLE)
            .query(&[("select", "*".to_string()), ("bundle_id", format!("eq.{bundle_id}"))])
            .send()
            .await?;
        let rows: Vec<CoinRow> = read_json(resp).await?;
        Ok(rows.into_iter().map(CoinMetadata::from).collect())
    }

    async fn coin_reference(
        &self,
        bundle_id: &str,
        slot_id: &str,
    ) -> std::result::Result<Option<String>, StoreError> {
        let resp = self
            .request(Method::GET, COINS_TABLE)
            .query(&[
                ("select", "id".to_string()),
                ("bundle_id", format!("eq.{bundle_id}")),
                ("coin_id", format!("eq.{slot_id}")),
            ])
            .send()
            .await?;
        let rows: Vec<IdRow> = read_json(resp).await?;
        Ok(rows.into_iter().next().map(|r| r.id))
    }

    async fn insert_good_coin(
        &self,
        coin_uuid: &str,
    ) -> std::result::Result<Option<String>, StoreError> {
        let resp = self
            .request(Method::POST, GOODCOINS_TABLE)
            .header("Prefer", "return=representation")
            .json(&json!({ "coin_uuid": coin_uuid }))
            .send()
            .await?;
        let rows: Vec<IdRow> = read_json(resp).await?;
        Ok(rows.into_iter().next().map(|r| r.id))
    }

    async fn set_good_coin_image(
        &self,
        record_id: &str,
        image_url: &str,
    ) -> std::result::Result<(), StoreError> {
        let resp = self
            .request(Method::PATCH, GOODCOINS_TABLE)
            .query(&[("id", format!("eq.{record_id}"))])
            .json(&json!({ "cloudflareimage": image_url }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
