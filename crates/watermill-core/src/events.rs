//! Live event channel for connected viewers.
//!
//! Every event is broadcast to all current subscribers with no acknowledgement.
//! A send with nobody listening is not an error: the feed is best-effort and
//! publishing never aborts the pipeline.

use serde_json::json;
use tokio::sync::broadcast;

use crate::types::Decision;

/// Buffered events per subscriber before slow viewers start lagging.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    ClearCanvas {
        bundle_id: String,
    },
    AddCoin {
        bundle_id: String,
        id: String,
        url: String,
    },
    OverlayMarks(Vec<Decision>),
    FadeOut,
    StartInvestigation {
        image_url: String,
    },
    StopInvestigation,
    DisqualifiedCoin {
        coin_id: String,
    },
}

impl LiveEvent {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::ClearCanvas { .. } => "clear_canvas",
            LiveEvent::AddCoin { .. } => "add_coin",
            LiveEvent::OverlayMarks(_) => "overlay_marks",
            LiveEvent::FadeOut => "fade_out",
            LiveEvent::StartInvestigation { .. } => "start_investigation",
            LiveEvent::StopInvestigation => "stop_investigation",
            LiveEvent::DisqualifiedCoin { .. } => "disqualified_coin",
        }
    }

    /// JSON payload on the wire.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            LiveEvent::ClearCanvas { bundle_id } => json!({ "bundle_id": bundle_id }),
            LiveEvent::AddCoin { bundle_id, id, url } => {
                json!({ "bundle_id": bundle_id, "id": id, "url": url })
            }
            LiveEvent::OverlayMarks(decisions) => json!(decisions),
            LiveEvent::FadeOut | LiveEvent::StopInvestigation => json!({}),
            LiveEvent::StartInvestigation { image_url } => json!({ "image_url": image_url }),
            LiveEvent::DisqualifiedCoin { coin_id } => json!({ "coin_id": coin_id }),
        }
    }
}

/// Fan-out publisher shared by the orchestrator loop and the HTTP handlers.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<LiveEvent>,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: LiveEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(n) => tracing::debug!(event = name, viewers = n, "published live event"),
            Err(_) => tracing::debug!(event = name, "no viewers connected; event dropped"),
        }
    }

    pub fn clear(&self, bundle_id: &str) {
        self.publish(LiveEvent::ClearCanvas {
            bundle_id: bundle_id.to_string(),
        });
    }

    pub fn add_slot(&self, bundle_id: &str, slot_id: &str, url: &str) {
        self.publish(LiveEvent::AddCoin {
            bundle_id: bundle_id.to_string(),
            id: slot_id.to_string(),
            url: url.to_string(),
        });
    }

    pub fn overlay(&self, decisions: &[Decision]) {
        self.publish(LiveEvent::OverlayMarks(decisions.to_vec()));
    }

    pub fn fade_out(&self) {
        self.publish(LiveEvent::FadeOut);
    }

    pub fn start_investigation(&self, image_url: &str) {
        self.publish(LiveEvent::StartInvestigation {
            image_url: image_url.to_string(),
        });
    }

    pub fn stop_investigation(&self) {
        self.publish(LiveEvent::StopInvestigation);
    }

    pub fn disqualified(&self, coin_id: &str) {
        self.publish(LiveEvent::DisqualifiedCoin {
            coin_id: coin_id.to_string(),
        });
    }
}
