use async_trait::async_trait;
use std::time::Duration;

use watermill_core::config::DeciderConfig;
use watermill_core::decision::DecisionClient;
use watermill_core::types::{CoinMetadata, Decision};

use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, ContentPart, DecisionReply, ImageUrl, ResponseFormat,
};
use crate::{DeciderError, Result};

const SYSTEM_PROMPT: &str = "\
You review bundles of eight newly listed coins. The image shows a 2x4 grid of \
coin logos, numbered 01 to 08 left to right, top to bottom. For each coin you \
also get its name, symbol and description.

Answer \"yes\" for a coin that looks original and worth a closer look, \"no\" \
for anything that looks copied, low effort or offensive.

Reply with a JSON object only, in the form \
{\"decisions\":[{\"id\":\"01\",\"decision\":\"yes\",\"reason\":\"...\"}]}, \
with exactly one entry per coin id you were given.";

/// [`DecisionClient`] backed by `POST <base_url>/chat/completions`.
#[derive(Clone)]
pub struct OpenAiDecider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiDecider {
    pub fn new(config: &DeciderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &DeciderConfig) -> Self {
        Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn build_request(&self, image_url: &str, metadata: &[CoinMetadata]) -> Result<ChatRequest> {
        let coins = serde_json::to_string_pretty(metadata)?;
        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(vec![
                    ContentPart::Text {
                        text: format!("Coin metadata:\n{coins}"),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_url.to_string(),
                        },
                    },
                ]),
            ],
            response_format: ResponseFormat::json_object(),
            temperature: Some(0.0),
        })
    }

    /// Send one request for the whole bundle and parse the verdict list.
    pub async fn decide(
        &self,
        bundle_id: &str,
        image_url: &str,
        metadata: &[CoinMetadata],
    ) -> Result<Vec<Decision>> {
        let request = self.build_request(image_url, metadata)?;
        tracing::debug!(bundle_id, model = %self.model, coins = metadata.len(), "requesting decisions");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeciderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = resp.json().await?;
        let content = reply.content().ok_or(DeciderError::EmptyReply)?;
        parse_decisions(content)
    }
}

/// Parse the model's reply content. Markdown code fences around the JSON
/// are tolerated.
pub fn parse_decisions(content: &str) -> Result<Vec<Decision>> {
    let body = strip_fences(content);
    let reply: DecisionReply =
        serde_json::from_str(body).map_err(|source| DeciderError::Parse {
            content: content.to_string(),
            source,
        })?;
    if reply.decisions.is_empty() {
        return Err(DeciderError::NoDecisions);
    }
    Ok(reply.decisions)
}

fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl DecisionClient for OpenAiDecider {
    async fn classify(
        &self,
        bundle_id: &str,
        image_url: &str,
        metadata: &[CoinMetadata],
    ) -> std::result::Result<Vec<Decision>, Box<dyn std::error::Error + Send + Sync>> {
        self.decide(bundle_id, image_url, metadata)
            .await
            .map_err(|e| {
                tracing::warn!(bundle_id, "classification failed: {e}");
                Box::<dyn std::error::Error + Send + Sync>::from(e)
            })
    }
}
