use async_trait::async_trait;

use crate::types::{CoinMetadata, Decision};

/// External classifier. One call per bundle, one verdict per slot.
///
/// Any failure (transport, unusable reply, empty list) ends the bundle; the
/// pipeline does not retry.
#[async_trait]
pub trait DecisionClient: Send + Sync {
    async fn classify(
        &self,
        bundle_id: &str,
        image_url: &str,
        metadata: &[CoinMetadata],
    ) -> Result<Vec<Decision>, Box<dyn std::error::Error + Send + Sync>>;
}
