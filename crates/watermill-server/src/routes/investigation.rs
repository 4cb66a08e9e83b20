use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartBody {
    #[serde(default)]
    pub image_url: Option<String>,
}

/// POST /start_investigation: show a coin image in the middle of the feed.
pub async fn start_investigation(
    State(app): State<AppState>,
    Json(body): Json<StartBody>,
) -> Result<Json<Value>, AppError> {
    let image_url = body
        .image_url
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("no image_url provided"))?;
    app.publisher.start_investigation(&image_url);
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// POST /stop_investigation: hide the investigation overlay.
pub async fn stop_investigation(State(app): State<AppState>) -> Json<Value> {
    app.publisher.stop_investigation();
    Json(serde_json::json!({ "status": "ok" }))
}
