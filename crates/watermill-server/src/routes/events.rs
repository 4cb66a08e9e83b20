use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/events: SSE stream of live feed events. The SSE event name is
/// the feed event name; the data is its JSON payload.
pub async fn sse_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let rx = app.publisher.subscribe();
    tracing::debug!("viewer connected");
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(event) => Some(Ok::<Event, Infallible>(
            Event::default()
                .event(event.name())
                .data(event.payload().to_string()),
        )),
        Err(e) => {
            tracing::warn!("viewer lagging: {e}");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
