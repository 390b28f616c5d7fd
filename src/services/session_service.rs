use crate::config::Config;
use crate::dto::session_dto::{
    ChecklistItemView, ItemView, SessionStatus, SessionView, StageView, SummaryKind,
};
use crate::error::{Error, Result};
use crate::models::response_log::ResponseLog;
use crate::models::scoreboard::ScoreBoard;
use crate::models::survey::{Stage, Survey};
use crate::services::ai_service::GuidanceRequest;
use crate::services::decision_service::{CodeDecision, DecisionService, Mistake, Outcome};
use crate::services::sampler_service::SamplerService;
use crate::services::scoring_service::{
    AnswerOutcome, ChecklistProgress, LinearProgress, ToggleOutcome,
};
use crate::services::survey_service::{score_ceilings, SurveyService};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

/// Typed user action forwarded by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Select { choice: String },
    Next { choice: Option<String> },
    Toggle { item_id: String, selected: bool },
    FinishStage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ActionResult {
    Selected {
        choice: String,
    },
    Recorded {
        item_id: String,
        delta: i64,
    },
    AnswerRequired {
        message: String,
    },
    Toggled(ToggleOutcome),
    SelectionRequired {
        required: usize,
        selected: usize,
        message: String,
    },
    StageFinished {
        next_stage: Option<usize>,
    },
}

#[derive(Debug, Clone, Serialize)]
enum StageProgress {
    Linear(LinearProgress),
    Checklist(ChecklistProgress),
}

impl StageProgress {
    fn presented(&self) -> Vec<usize> {
        match self {
            StageProgress::Linear(p) => p.order().to_vec(),
            StageProgress::Checklist(p) => p.order().to_vec(),
        }
    }
}

/// What a summary call should send to the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryRequest {
    WeakAreas(Vec<Mistake>),
    Guidance(Option<GuidanceRequest>),
}

impl SummaryRequest {
    pub fn kind(&self) -> SummaryKind {
        match self {
            SummaryRequest::WeakAreas(_) => SummaryKind::WeakAreas,
            SummaryRequest::Guidance(_) => SummaryKind::Guidance,
        }
    }
}

/// One respondent's isolated state: sampled stages, score board and log.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    survey: Arc<Survey>,
    seed: u64,
    stage_index: usize,
    stages: Vec<StageProgress>,
    board: ScoreBoard,
    log: ResponseLog,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    pub fn start(id: Uuid, survey: Arc<Survey>, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let stages = survey
            .stages
            .iter()
            .map(|stage| match stage {
                Stage::Linear(s) => {
                    let mut order =
                        SamplerService::sample(&s.items, &survey.categories, s.sample, &mut rng);
                    if s.shuffle {
                        SamplerService::shuffle(&mut order, &mut rng);
                    }
                    StageProgress::Linear(LinearProgress::new(order))
                }
                Stage::Checklist(s) => {
                    let mut order =
                        SamplerService::sample(&s.items, &survey.categories, s.sample, &mut rng);
                    if s.shuffle {
                        SamplerService::shuffle(&mut order, &mut rng);
                    }
                    StageProgress::Checklist(ChecklistProgress::new(order, s.items.len()))
                }
            })
            .collect();
        let now = Utc::now();

        let mut session = Self {
            id,
            board: ScoreBoard::new(&survey.categories),
            survey,
            seed,
            stage_index: 0,
            stages,
            log: ResponseLog::new(),
            created_at: now,
            updated_at: now,
        };
        session.skip_empty_stages();
        session
    }

    /// Replaces every piece of state in one assignment, keeping only the id
    /// and creation time.
    pub fn reset(&mut self, seed: u64) {
        let created_at = self.created_at;
        *self = Self::start(self.id, self.survey.clone(), seed);
        self.created_at = created_at;
    }

    pub fn survey(&self) -> &Survey {
        &self.survey
    }

    pub fn board(&self) -> &ScoreBoard {
        &self.board
    }

    pub fn log(&self) -> &ResponseLog {
        &self.log
    }

    pub fn is_complete(&self) -> bool {
        self.stage_index >= self.stages.len()
    }

    // a linear stage whose sample came out empty has nothing to answer
    fn skip_empty_stages(&mut self) {
        while let Some(StageProgress::Linear(p)) = self.stages.get(self.stage_index) {
            if !p.is_complete() {
                break;
            }
            self.stage_index += 1;
        }
    }

    fn finish_stage(&mut self) -> ActionResult {
        self.stage_index += 1;
        self.skip_empty_stages();
        ActionResult::StageFinished {
            next_stage: (!self.is_complete()).then_some(self.stage_index),
        }
    }

    pub fn apply(&mut self, action: Action) -> Result<ActionResult> {
        if self.is_complete() {
            return Err(Error::Conflict("session is already complete".to_string()));
        }
        let index = self.stage_index;
        let survey = self.survey.clone();
        let stage = &survey.stages[index];

        let result = match (stage, &mut self.stages[index], action) {
            (Stage::Linear(s), StageProgress::Linear(p), Action::Select { choice }) => {
                p.select(s, &choice)?;
                ActionResult::Selected { choice }
            }
            (Stage::Linear(s), StageProgress::Linear(p), Action::Next { choice }) => {
                match p.advance(index, s, choice.as_deref(), &mut self.board, &mut self.log)? {
                    AnswerOutcome::AnswerRequired => ActionResult::AnswerRequired {
                        message: "Please select an answer before proceeding.".to_string(),
                    },
                    AnswerOutcome::Recorded {
                        item_id,
                        delta,
                        stage_complete,
                    } => {
                        if stage_complete {
                            self.finish_stage();
                        }
                        ActionResult::Recorded { item_id, delta }
                    }
                }
            }
            (Stage::Linear(_), StageProgress::Linear(_), Action::FinishStage) => {
                return Err(Error::Conflict(
                    "a linear stage finishes after its last answer".to_string(),
                ))
            }
            (Stage::Checklist(s), StageProgress::Checklist(p), Action::Toggle { item_id, selected }) => {
                ActionResult::Toggled(p.set(s, &item_id, selected, &mut self.board)?)
            }
            (Stage::Checklist(s), StageProgress::Checklist(p), Action::FinishStage) => {
                let count = p.selected_count();
                if count < s.min_selected {
                    tracing::warn!(
                        "Session {} tried to leave stage {} with {} of {} selections",
                        self.id,
                        index,
                        count,
                        s.min_selected
                    );
                    ActionResult::SelectionRequired {
                        required: s.min_selected,
                        selected: count,
                        message: format!(
                            "Please select at least {} item(s) before continuing.",
                            s.min_selected
                        ),
                    }
                } else {
                    self.finish_stage()
                }
            }
            (stage, _, action) => {
                return Err(Error::BadRequest(format!(
                    "{:?} is not valid in stage '{}'",
                    action,
                    stage.title()
                )))
            }
        };

        self.updated_at = Utc::now();
        Ok(result)
    }

    pub fn outcome(&self) -> Result<Outcome> {
        if !self.is_complete() {
            return Err(Error::Conflict("session is not complete yet".to_string()));
        }
        let presented: Vec<Vec<usize>> = self.stages.iter().map(|s| s.presented()).collect();
        let ceilings = score_ceilings(&self.survey, &presented);
        Ok(DecisionService::outcome(&self.survey, &self.board, &ceilings))
    }

    pub fn summary_request(&self) -> Result<SummaryRequest> {
        let outcome = self.outcome()?;
        if self.survey.is_knowledge_quiz() {
            return Ok(SummaryRequest::WeakAreas(DecisionService::extract_mistakes(
                &self.survey,
                &self.log,
            )));
        }

        let request = match &outcome.decision {
            CodeDecision::Undetermined => None,
            CodeDecision::Determined { code } => Some(GuidanceRequest {
                survey_title: self.survey.title.clone(),
                code: code.clone(),
                endorsed: DecisionService::endorsed_prompts(&self.survey, &self.log),
                selections: self.selected_prompts(),
                careers: outcome.recommendations.careers.clone(),
                fields: outcome.recommendations.fields.clone(),
            }),
        };
        Ok(SummaryRequest::Guidance(request))
    }

    fn selected_prompts(&self) -> Vec<String> {
        self.survey
            .stages
            .iter()
            .zip(&self.stages)
            .filter_map(|pair| match pair {
                (Stage::Checklist(s), StageProgress::Checklist(p)) => Some(
                    p.selected_items()
                        .into_iter()
                        .map(|idx| s.items[idx].prompt.clone())
                        .collect::<Vec<_>>(),
                ),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn view(&self) -> SessionView {
        let stage = self
            .survey
            .stages
            .get(self.stage_index)
            .zip(self.stages.get(self.stage_index))
            .map(|pair| match pair {
                (Stage::Linear(s), StageProgress::Linear(p)) => StageView::Linear {
                    index: self.stage_index,
                    title: s.title.clone(),
                    position: p.position(),
                    total: p.order().len(),
                    item: p.current().map(|idx| {
                        let item = &s.items[idx];
                        ItemView {
                            id: item.id.clone(),
                            prompt: item.prompt.clone(),
                            options: s.scale.options(&item.options),
                        }
                    }),
                    selected: p.selected().map(str::to_string),
                },
                (Stage::Checklist(s), StageProgress::Checklist(p)) => StageView::Checklist {
                    index: self.stage_index,
                    title: s.title.clone(),
                    items: p
                        .order()
                        .iter()
                        .map(|idx| ChecklistItemView {
                            id: s.items[*idx].id.clone(),
                            prompt: s.items[*idx].prompt.clone(),
                            selected: p.is_selected(*idx),
                        })
                        .collect(),
                    selected_count: p.selected_count(),
                    min_selected: s.min_selected,
                },
                // stages are built from the survey in the same order
                (stage, _) => StageView::Checklist {
                    index: self.stage_index,
                    title: stage.title().to_string(),
                    items: Vec::new(),
                    selected_count: 0,
                    min_selected: 0,
                },
            });

        SessionView {
            id: self.id,
            survey_id: self.survey.id.clone(),
            survey_title: self.survey.title.clone(),
            seed: self.seed,
            status: if self.is_complete() {
                SessionStatus::Complete
            } else {
                SessionStatus::InProgress
            },
            stage_count: self.stages.len(),
            stage,
            answered: self.log.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Bounds on the in-memory store.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Sessions not updated for longer than this are dropped.
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl SessionLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            idle_ttl: Duration::from_secs(config.session_ttl_secs),
            max_sessions: config.max_sessions,
        }
    }

    fn is_idle(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(session.updated_at)
            .to_std()
            .map(|idle| idle > self.idle_ttl)
            .unwrap_or(false)
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(3600),
            max_sessions: 10_000,
        }
    }
}

/// In-memory session store. Each session is its own instance; the lock is
/// never held across an await.
#[derive(Clone)]
pub struct SessionService {
    surveys: Arc<SurveyService>,
    limits: SessionLimits,
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl SessionService {
    pub fn new(surveys: Arc<SurveyService>, limits: SessionLimits) -> Self {
        Self {
            surveys,
            limits,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Session>>> {
        self.sessions
            .lock()
            .map_err(|_| Error::Internal("session store lock poisoned".to_string()))
    }

    fn with_session<T>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let mut sessions = self.lock()?;
        let idle = match sessions.get(&id) {
            Some(session) => self.limits.is_idle(session, Utc::now()),
            None => return Err(Error::NotFound(format!("session {}", id))),
        };
        if idle {
            sessions.remove(&id);
            tracing::info!("Session {} expired", id);
            return Err(Error::NotFound(format!("session {}", id)));
        }
        match sessions.get_mut(&id) {
            Some(session) => f(session),
            None => Err(Error::NotFound(format!("session {}", id))),
        }
    }

    /// Drops idle sessions, then the least recently updated ones until one
    /// more fits under `max_sessions`.
    fn evict(&self, sessions: &mut HashMap<Uuid, Session>, now: DateTime<Utc>) -> usize {
        let before = sessions.len();
        sessions.retain(|_, s| !self.limits.is_idle(s, now));

        if sessions.len() >= self.limits.max_sessions {
            let mut by_age: Vec<(DateTime<Utc>, Uuid)> =
                sessions.values().map(|s| (s.updated_at, s.id)).collect();
            by_age.sort_unstable();
            let excess = sessions.len() + 1 - self.limits.max_sessions.max(1);
            for (_, id) in by_age.into_iter().take(excess) {
                sessions.remove(&id);
            }
        }
        before - sessions.len()
    }

    /// Removes sessions idle at `now`. Returns how many were dropped.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, s| !self.limits.is_idle(s, now));
        Ok(before - sessions.len())
    }

    pub fn create(&self, survey_id: &str, seed: Option<u64>) -> Result<SessionView> {
        let survey = self.surveys.get(survey_id)?;
        let seed = seed.unwrap_or_else(rand::random);
        let session = Session::start(Uuid::new_v4(), survey, seed);
        let view = session.view();

        let mut sessions = self.lock()?;
        let evicted = self.evict(&mut sessions, Utc::now());
        if evicted > 0 {
            tracing::info!("Evicted {} idle or excess session(s)", evicted);
        }
        tracing::info!("Session {} started for survey {}", session.id, survey_id);
        sessions.insert(session.id, session);
        Ok(view)
    }

    pub fn view(&self, id: Uuid) -> Result<SessionView> {
        self.with_session(id, |s| Ok(s.view()))
    }

    pub fn apply(&self, id: Uuid, action: Action) -> Result<(ActionResult, SessionView)> {
        self.with_session(id, |s| {
            let result = s.apply(action)?;
            if s.is_complete() {
                tracing::info!("Session {} completed", id);
            }
            Ok((result, s.view()))
        })
    }

    pub fn reset(&self, id: Uuid, seed: Option<u64>) -> Result<SessionView> {
        self.with_session(id, |s| {
            s.reset(seed.unwrap_or_else(rand::random));
            tracing::info!("Session {} reset", id);
            Ok(s.view())
        })
    }

    pub fn remove(&self, id: Uuid) -> Result<()> {
        match self.lock()?.remove(&id) {
            Some(_) => {
                tracing::info!("Session {} discarded", id);
                Ok(())
            }
            None => Err(Error::NotFound(format!("session {}", id))),
        }
    }

    pub fn outcome(&self, id: Uuid) -> Result<(String, Outcome)> {
        self.with_session(id, |s| Ok((s.survey().id.clone(), s.outcome()?)))
    }

    pub fn summary_request(&self, id: Uuid) -> Result<SummaryRequest> {
        self.with_session(id, |s| s.summary_request())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SessionService {
        service_with(SessionLimits::default())
    }

    fn service_with(limits: SessionLimits) -> SessionService {
        SessionService::new(Arc::new(SurveyService::with_builtins().unwrap()), limits)
    }

    fn answer_all(service: &SessionService, id: Uuid, choice: &str) {
        loop {
            let view = service.view(id).unwrap();
            match view.stage {
                Some(StageView::Linear { .. }) => {
                    service
                        .apply(
                            id,
                            Action::Next {
                                choice: Some(choice.to_string()),
                            },
                        )
                        .unwrap();
                }
                _ => break,
            }
        }
    }

    #[test]
    fn quick_survey_runs_to_a_code() {
        let service = service();
        let view = service.create("riasec-quick", Some(1)).unwrap();
        assert_eq!(view.status, SessionStatus::InProgress);

        answer_all(&service, view.id, "Yes");
        let (_, outcome) = service.outcome(view.id).unwrap();
        // all tied: configured order decides
        assert_eq!(outcome.decision.code(), Some("RIA"));
        assert_eq!(outcome.recommendations.careers[0], "Engineer");
        assert_eq!(outcome.best_categories.len(), 6);
    }

    #[test]
    fn all_no_answers_are_undetermined() {
        let service = service();
        let view = service.create("riasec-quick", Some(2)).unwrap();
        answer_all(&service, view.id, "No");

        let (_, outcome) = service.outcome(view.id).unwrap();
        assert_eq!(outcome.decision, CodeDecision::Undetermined);
        assert!(outcome.best_categories.is_empty());
        assert!(outcome.distribution.is_none());
        assert_eq!(
            service.summary_request(view.id).unwrap(),
            SummaryRequest::Guidance(None)
        );
    }

    #[test]
    fn missing_answer_does_not_advance() {
        let service = service();
        let view = service.create("riasec-quick", Some(3)).unwrap();
        let (result, after) = service
            .apply(view.id, Action::Next { choice: None })
            .unwrap();
        assert!(matches!(result, ActionResult::AnswerRequired { .. }));
        assert_eq!(after.answered, 0);
    }

    #[test]
    fn checklist_requires_minimum_selection() {
        let service = service();
        let view = service.create("riasec-staged", Some(4)).unwrap();
        answer_all(&service, view.id, "Agree");

        let (result, after) = service.apply(view.id, Action::FinishStage).unwrap();
        assert!(matches!(
            result,
            ActionResult::SelectionRequired { required: 1, .. }
        ));
        let first = match after.stage {
            Some(StageView::Checklist { items, .. }) => {
                assert_eq!(items.len(), 12);
                items[0].id.clone()
            }
            other => panic!("unexpected stage: {:?}", other),
        };

        service
            .apply(
                view.id,
                Action::Toggle {
                    item_id: first,
                    selected: true,
                },
            )
            .unwrap();
        let (result, _) = service.apply(view.id, Action::FinishStage).unwrap();
        assert_eq!(result, ActionResult::StageFinished { next_stage: Some(2) });
    }

    #[test]
    fn reset_clears_everything_together() {
        let service = service();
        let view = service.create("riasec-staged", Some(5)).unwrap();
        service
            .apply(
                view.id,
                Action::Next {
                    choice: Some("Strongly agree".to_string()),
                },
            )
            .unwrap();

        let reset = service.reset(view.id, Some(6)).unwrap();
        assert_eq!(reset.id, view.id);
        assert_eq!(reset.seed, 6);
        assert_eq!(reset.answered, 0);
        service
            .with_session(view.id, |s| {
                assert!(s.board().is_flat(0));
                assert!(s.log().is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn sessions_do_not_share_state() {
        let service = service();
        let a = service.create("riasec-quick", Some(7)).unwrap();
        let b = service.create("riasec-quick", Some(7)).unwrap();
        service
            .apply(
                a.id,
                Action::Next {
                    choice: Some("Yes".to_string()),
                },
            )
            .unwrap();
        assert_eq!(service.view(a.id).unwrap().answered, 1);
        assert_eq!(service.view(b.id).unwrap().answered, 0);
        assert_eq!(service.len(), 2);
    }

    #[test]
    fn quiz_summary_forwards_only_mistakes() {
        let service = service();
        let view = service.create("ai-literacy", Some(8)).unwrap();
        // always pick the first option; 4 of the 11 items list the answer first
        while let Some(StageView::Linear {
            item: Some(item), ..
        }) = service.view(view.id).unwrap().stage
        {
            service
                .apply(
                    view.id,
                    Action::Next {
                        choice: Some(item.options[0].clone()),
                    },
                )
                .unwrap();
        }

        match service.summary_request(view.id).unwrap() {
            SummaryRequest::WeakAreas(mistakes) => {
                assert_eq!(mistakes.len(), 7);
                assert!(mistakes.iter().all(|m| m.correct_answer != m.selected_answer));
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn wrong_action_for_stage_is_rejected() {
        let service = service();
        let view = service.create("riasec-quick", Some(9)).unwrap();
        let err = service
            .apply(
                view.id,
                Action::Toggle {
                    item_id: "q01".to_string(),
                    selected: true,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn result_waits_for_completion() {
        let service = service();
        let view = service.create("riasec-quick", Some(10)).unwrap();
        assert!(matches!(service.outcome(view.id), Err(Error::Conflict(_))));
        service.remove(view.id).unwrap();
        assert!(matches!(service.view(view.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn idle_sessions_are_dropped() {
        let service = service_with(SessionLimits {
            idle_ttl: Duration::from_secs(60),
            max_sessions: 100,
        });
        let first = service.create("riasec-quick", Some(11)).unwrap();
        service.create("riasec-quick", Some(12)).unwrap();

        assert_eq!(service.evict_idle(Utc::now()).unwrap(), 0);
        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(service.evict_idle(later).unwrap(), 2);
        assert!(service.is_empty());
        assert!(matches!(service.view(first.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn expired_session_is_not_found() {
        let service = service_with(SessionLimits {
            idle_ttl: Duration::ZERO,
            max_sessions: 100,
        });
        let view = service.create("riasec-quick", Some(13)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(service.view(view.id), Err(Error::NotFound(_))));
        assert!(service.is_empty());
    }

    #[test]
    fn create_evicts_stale_and_oldest_sessions() {
        let service = service_with(SessionLimits {
            idle_ttl: Duration::from_secs(3600),
            max_sessions: 2,
        });
        let oldest = service.create("riasec-quick", Some(14)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let middle = service.create("riasec-quick", Some(15)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let newest = service.create("riasec-quick", Some(16)).unwrap();

        assert_eq!(service.len(), 2);
        assert!(matches!(service.view(oldest.id), Err(Error::NotFound(_))));
        assert!(service.view(middle.id).is_ok());
        assert!(service.view(newest.id).is_ok());
    }
}
