use axum::extract::State;
use axum::Json;

use watermill_core::pipeline::PipelineStatus;

use crate::state::AppState;

/// GET /api/status: snapshot of what the pipeline loop is doing.
pub async fn get_status(State(app): State<AppState>) -> Json<PipelineStatus> {
    Json(app.status.borrow().clone())
}
