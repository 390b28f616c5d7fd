use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};
use validator::Validate;

use crate::dto::classify_dto::{ClassifySpeechRequest, ClassifySpeechResponse};
use crate::AppState;

#[axum::debug_handler]
pub async fn classify_speech(
    State(state): State<AppState>,
    Json(req): Json<ClassifySpeechRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let features = req.features();
    let result = state.classifier_service.classify(&req.list, features)?;
    Ok(Json(ClassifySpeechResponse {
        list: req.list,
        label: result.label,
        reason: result.reason,
        features,
    })
    .into_response())
}
