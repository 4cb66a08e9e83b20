use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DisqualifyBody {
    #[serde(default)]
    pub coin_id: Option<Value>,
}

/// Accept string or numeric coin ids; anything else counts as missing.
fn coin_id_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// POST /disqualify_coin: tell viewers a coin was disqualified.
pub async fn disqualify_coin(
    State(app): State<AppState>,
    Json(body): Json<DisqualifyBody>,
) -> Result<Json<Value>, AppError> {
    let coin_id =
        coin_id_text(body.coin_id).ok_or_else(|| AppError::bad_request("missing coin_id"))?;
    tracing::info!(coin_id = %coin_id, "coin disqualified");
    app.publisher.disqualified(&coin_id);
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
