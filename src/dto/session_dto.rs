use crate::error::{Error, Result};
use crate::services::ai_service::SummaryOutcome;
use crate::services::decision_service::{Mistake, Outcome};
use crate::services::session_service::{Action, ActionResult};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 64))]
    pub survey_id: String,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetSessionRequest {
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Select,
    Next,
    Toggle,
    FinishStage,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ActionRequest {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[validate(length(max = 500))]
    pub choice: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub item_id: Option<String>,
    pub selected: Option<bool>,
}

impl TryFrom<ActionRequest> for Action {
    type Error = Error;

    fn try_from(req: ActionRequest) -> Result<Self> {
        match req.kind {
            ActionKind::Select => {
                let choice = req
                    .choice
                    .ok_or_else(|| Error::BadRequest("select requires a choice".to_string()))?;
                Ok(Action::Select { choice })
            }
            ActionKind::Next => Ok(Action::Next { choice: req.choice }),
            ActionKind::Toggle => {
                let item_id = req
                    .item_id
                    .ok_or_else(|| Error::BadRequest("toggle requires item_id".to_string()))?;
                let selected = req
                    .selected
                    .ok_or_else(|| Error::BadRequest("toggle requires selected".to_string()))?;
                Ok(Action::Toggle { item_id, selected })
            }
            ActionKind::FinishStage => Ok(Action::FinishStage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItemView {
    pub id: String,
    pub prompt: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageView {
    Linear {
        index: usize,
        title: String,
        position: usize,
        total: usize,
        item: Option<ItemView>,
        selected: Option<String>,
    },
    Checklist {
        index: usize,
        title: String,
        items: Vec<ChecklistItemView>,
        selected_count: usize,
        min_selected: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: uuid::Uuid,
    pub survey_id: String,
    pub survey_title: String,
    pub seed: u64,
    pub status: SessionStatus,
    pub stage_count: usize,
    pub stage: Option<StageView>,
    pub answered: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub result: ActionResult,
    pub session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultResponse {
    pub session_id: uuid::Uuid,
    pub survey_id: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    WeakAreas,
    Guidance,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub session_id: uuid::Uuid,
    pub kind: SummaryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mistakes: Option<Vec<Mistake>>,
    pub summary: SummaryOutcome,
}
