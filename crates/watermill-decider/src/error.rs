use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeciderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("reply has no message content")]
    EmptyReply,

    #[error("failed to parse classifier reply: {source}\n  content: {content}")]
    Parse {
        content: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("classifier returned no decisions")]
    NoDecisions,

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}
