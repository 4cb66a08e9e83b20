//! `watermill-decider`: classifies a bundle through an OpenAI-compatible
//! chat-completions endpoint.
//!
//! # Architecture
//!
//! ```text
//! (bundle_id, image_url, [CoinMetadata])
//!     │
//!     ▼
//! ChatRequest     ← system prompt + user message (metadata JSON, image part)
//!     │              response_format = json_object
//!     ▼
//! OpenAiDecider   ← POST <base_url>/chat/completions, bearer auth
//!     │
//!     ▼
//! DecisionReply   ← {"decisions":[{"id":"01","decision":"yes", …}]}
//!     │
//!     ▼
//! Vec<Decision>   ← handed back to the pipeline through `DecisionClient`
//! ```
//!
//! Every failure (HTTP status, unparseable content, empty list) comes back
//! as a [`DeciderError`]. The pipeline treats that as the end of the bundle.

pub mod client;
pub mod error;
pub mod types;


pub use client::OpenAiDecider;
pub use error::DeciderError;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, DeciderError>;
