use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::session_dto::{
    ActionRequest, ActionResponse, CreateSessionRequest, ResetSessionRequest, ResultResponse,
    SummaryResponse,
};
use crate::services::ai_service::SummaryOutcome;
use crate::services::session_service::{Action, SummaryRequest};
use crate::AppState;

#[axum::debug_handler]
pub async fn list_surveys(State(state): State<AppState>) -> crate::error::Result<Response> {
    let surveys = state.survey_service.list();
    Ok(Json(json!({ "surveys": surveys })).into_response())
}

#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let view = state.session_service.create(&req.survey_id, req.seed)?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let view = state.session_service.view(id)?;
    Ok(Json(view).into_response())
}

#[axum::debug_handler]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<Response> {
    state.session_service.remove(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn apply_action(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ActionRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let action = Action::try_from(req)?;
    let (result, session) = state.session_service.apply(id, action)?;
    Ok(Json(ActionResponse { result, session }).into_response())
}

#[axum::debug_handler]
pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ResetSessionRequest>>,
) -> crate::error::Result<Response> {
    let seed = body.and_then(|Json(req)| req.seed);
    let view = state.session_service.reset(id, seed)?;
    Ok(Json(view).into_response())
}

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let (survey_id, outcome) = state.session_service.outcome(id)?;
    Ok(Json(ResultResponse {
        session_id: id,
        survey_id,
        outcome,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn create_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<Response> {
    // built under the store lock, sent after it is released
    let request = state.session_service.summary_request(id)?;
    let kind = request.kind();

    let (mistakes, summary) = match request {
        SummaryRequest::WeakAreas(mistakes) => {
            tracing::info!("Session {}: {} mistake(s) to analyze", id, mistakes.len());
            let summary = state.ai_service.summarize_mistakes(&mistakes).await;
            (Some(mistakes), summary)
        }
        SummaryRequest::Guidance(guidance) => {
            (None, state.ai_service.summarize_guidance(guidance).await)
        }
    };

    if let SummaryOutcome::Unavailable { diagnostic } = &summary {
        tracing::warn!("Session {} summary unavailable: {}", id, diagnostic);
    }

    Ok(Json(SummaryResponse {
        session_id: id,
        kind,
        mistakes,
        summary,
    })
    .into_response())
}
