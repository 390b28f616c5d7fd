use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "status": "ok",
        "surveys": state.survey_service.list().len(),
        "active_sessions": state.session_service.len(),
    });
    (StatusCode::OK, Json(body))
}
