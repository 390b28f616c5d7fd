use crate::error::{Error, Result};
use crate::models::response_log::{LogEntry, ResponseLog};
use crate::models::scoreboard::ScoreBoard;
use crate::models::survey::{ChecklistStage, LinearStage};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnswerOutcome {
    Recorded {
        item_id: String,
        delta: i64,
        stage_complete: bool,
    },
    AnswerRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub item_id: String,
    pub selected: bool,
    pub changed: bool,
    pub delta: i64,
}

/// Forward-only cursor over the presented items of a linear stage.
#[derive(Debug, Clone, Serialize)]
pub struct LinearProgress {
    order: Vec<usize>,
    position: usize,
    selected: Option<String>,
}

impl LinearProgress {
    pub fn new(order: Vec<usize>) -> Self {
        Self {
            order,
            position: 0,
            selected: None,
        }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.position >= self.order.len()
    }

    /// Pool index of the item currently awaiting an answer.
    pub fn current(&self) -> Option<usize> {
        self.order.get(self.position).copied()
    }

    /// Stores a transient selection for the current item without scoring it.
    pub fn select(&mut self, stage: &LinearStage, choice: &str) -> Result<()> {
        let idx = self
            .current()
            .ok_or_else(|| Error::Conflict("stage has no pending item".to_string()))?;
        let item = &stage.items[idx];
        if stage.scale.interpret(choice, &item.options).is_none() {
            return Err(Error::BadRequest(format!(
                "'{}' is not an option for item '{}'",
                choice, item.id
            )));
        }
        self.selected = Some(choice.to_string());
        Ok(())
    }

    /// Commits `choice` (or the transient selection) for the current item and
    /// advances by one. With nothing chosen, nothing changes.
    pub fn advance(
        &mut self,
        stage_index: usize,
        stage: &LinearStage,
        choice: Option<&str>,
        board: &mut ScoreBoard,
        log: &mut ResponseLog,
    ) -> Result<AnswerOutcome> {
        let idx = self
            .current()
            .ok_or_else(|| Error::Conflict("stage has no pending item".to_string()))?;
        let item = &stage.items[idx];

        let chosen = match choice.or(self.selected.as_deref()) {
            Some(c) if !c.trim().is_empty() => c.to_string(),
            _ => {
                tracing::warn!("Answer required for item {}", item.id);
                return Ok(AnswerOutcome::AnswerRequired);
            }
        };

        let response = stage
            .scale
            .interpret(&chosen, &item.options)
            .ok_or_else(|| {
                Error::BadRequest(format!(
                    "'{}' is not an option for item '{}'",
                    chosen, item.id
                ))
            })?;
        let delta = stage
            .scale
            .delta(&response, item.correct_answer.as_deref());

        board.apply(item.category, delta)?;
        log.push(LogEntry {
            stage: stage_index,
            item_id: item.id.clone(),
            category: item.category,
            response,
            delta,
            answered_at: Utc::now(),
        });
        self.position += 1;
        self.selected = None;

        Ok(AnswerOutcome::Recorded {
            item_id: item.id.clone(),
            delta,
            stage_complete: self.is_complete(),
        })
    }
}

/// Selection state of the presented items of a checklist stage.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistProgress {
    order: Vec<usize>,
    selected: Vec<bool>,
}

impl ChecklistProgress {
    pub fn new(order: Vec<usize>, pool_size: usize) -> Self {
        Self {
            order,
            selected: vec![false; pool_size],
        }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn is_selected(&self, pool_index: usize) -> bool {
        self.selected.get(pool_index).copied().unwrap_or(false)
    }

    pub fn selected_count(&self) -> usize {
        self.order.iter().filter(|i| self.is_selected(**i)).count()
    }

    /// Pool indices of selected items, in presentation order.
    pub fn selected_items(&self) -> Vec<usize> {
        self.order
            .iter()
            .copied()
            .filter(|i| self.is_selected(*i))
            .collect()
    }

    /// Sets an item's selection state. Only a real transition touches the
    /// board, so the item's net contribution is always
    /// `selected * unit_weight` per mapped category.
    pub fn set(
        &mut self,
        stage: &ChecklistStage,
        item_id: &str,
        selected: bool,
        board: &mut ScoreBoard,
    ) -> Result<ToggleOutcome> {
        let idx = self
            .order
            .iter()
            .copied()
            .find(|i| stage.items[*i].id == item_id)
            .ok_or_else(|| {
                Error::BadRequest(format!("item '{}' is not presented in this stage", item_id))
            })?;
        let item = &stage.items[idx];

        if self.selected[idx] == selected {
            return Ok(ToggleOutcome {
                item_id: item.id.clone(),
                selected,
                changed: false,
                delta: 0,
            });
        }

        let delta = if selected {
            stage.unit_weight
        } else {
            -stage.unit_weight
        };
        for category in &item.categories {
            board.apply(*category, delta)?;
        }
        self.selected[idx] = selected;

        Ok(ToggleOutcome {
            item_id: item.id.clone(),
            selected,
            changed: true,
            delta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::survey::{Stage, Survey};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;

    fn survey() -> Survey {
        let doc = json!({
            "id": "scoring",
            "title": "Scoring",
            "categories": [
                {"key": "realistic", "name": "Realistic"},
                {"key": "artistic", "name": "Artistic"},
                {"key": "social", "name": "Social"}
            ],
            "stages": [
                {
                    "type": "linear",
                    "title": "Questions",
                    "scale": {"kind": "likert", "levels": [
                        {"label": "Disagree", "weight": 0},
                        {"label": "Not sure", "weight": 1},
                        {"label": "Agree", "weight": 2}
                    ]},
                    "items": [
                        {"id": "q1", "prompt": "Tools?", "category": "realistic"},
                        {"id": "q2", "prompt": "Paint?", "category": "artistic"}
                    ]
                },
                {
                    "type": "checklist",
                    "title": "Subjects",
                    "unit_weight": 2,
                    "items": [
                        {"id": "art", "prompt": "Art", "categories": ["artistic"]},
                        {"id": "drama", "prompt": "Drama", "categories": ["artistic", "social"]}
                    ]
                }
            ]
        });
        Survey::from_json(&doc.to_string()).unwrap()
    }

    fn linear(survey: &Survey) -> &LinearStage {
        match &survey.stages[0] {
            Stage::Linear(s) => s,
            Stage::Checklist(_) => unreachable!(),
        }
    }

    fn checklist(survey: &Survey) -> &ChecklistStage {
        match &survey.stages[1] {
            Stage::Checklist(s) => s,
            Stage::Linear(_) => unreachable!(),
        }
    }

    #[test]
    fn missing_answer_leaves_state_untouched() {
        let survey = survey();
        let stage = linear(&survey);
        let mut board = ScoreBoard::new(&survey.categories);
        let mut log = ResponseLog::new();
        let mut progress = LinearProgress::new(vec![0, 1]);

        let outcome = progress
            .advance(0, stage, None, &mut board, &mut log)
            .unwrap();
        assert_eq!(outcome, AnswerOutcome::AnswerRequired);
        assert_eq!(progress.position(), 0);
        assert!(log.is_empty());
        assert!(board.is_flat(0));

        let outcome = progress
            .advance(0, stage, Some("Agree"), &mut board, &mut log)
            .unwrap();
        assert!(matches!(outcome, AnswerOutcome::Recorded { delta: 2, .. }));
        assert_eq!(progress.position(), 1);
    }

    #[test]
    fn transient_selection_is_committed_then_cleared() {
        let survey = survey();
        let stage = linear(&survey);
        let mut board = ScoreBoard::new(&survey.categories);
        let mut log = ResponseLog::new();
        let mut progress = LinearProgress::new(vec![1, 0]);

        progress.select(stage, "Not sure").unwrap();
        assert_eq!(progress.selected(), Some("Not sure"));
        progress
            .advance(0, stage, None, &mut board, &mut log)
            .unwrap();
        assert_eq!(progress.selected(), None);
        assert_eq!(log.entries()[0].item_id, "q2");

        let artistic = survey.categories.resolve("artistic").unwrap();
        assert_eq!(board.get(artistic), 1);
    }

    #[test]
    fn unknown_option_is_rejected_without_advancing() {
        let survey = survey();
        let stage = linear(&survey);
        let mut board = ScoreBoard::new(&survey.categories);
        let mut log = ResponseLog::new();
        let mut progress = LinearProgress::new(vec![0, 1]);

        let err = progress
            .advance(0, stage, Some("Maybe"), &mut board, &mut log)
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert_eq!(progress.position(), 0);
        assert!(log.is_empty());
    }

    #[test]
    fn linear_stage_cannot_be_reanswered() {
        let survey = survey();
        let stage = linear(&survey);
        let mut board = ScoreBoard::new(&survey.categories);
        let mut log = ResponseLog::new();
        let mut progress = LinearProgress::new(vec![0]);

        let outcome = progress
            .advance(0, stage, Some("Agree"), &mut board, &mut log)
            .unwrap();
        assert!(matches!(
            outcome,
            AnswerOutcome::Recorded {
                stage_complete: true,
                ..
            }
        ));
        assert!(matches!(
            progress.advance(0, stage, Some("Agree"), &mut board, &mut log),
            Err(Error::Conflict(_))
        ));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn toggle_contribution_tracks_current_state() {
        let survey = survey();
        let stage = checklist(&survey);
        let artistic = survey.categories.resolve("artistic").unwrap();
        let social = survey.categories.resolve("social").unwrap();

        for seed in 0..50u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut board = ScoreBoard::new(&survey.categories);
            let mut progress = ChecklistProgress::new(vec![0, 1], stage.items.len());

            let steps = rng.gen_range(0..30);
            let mut state = false;
            for _ in 0..steps {
                state = rng.gen_bool(0.5);
                progress.set(stage, "drama", state, &mut board).unwrap();
            }

            let expected = if state { stage.unit_weight } else { 0 };
            assert_eq!(board.get(artistic), expected, "seed {}", seed);
            assert_eq!(board.get(social), expected, "seed {}", seed);
        }
    }

    #[test]
    fn repeated_toggle_is_a_no_op() {
        let survey = survey();
        let stage = checklist(&survey);
        let mut board = ScoreBoard::new(&survey.categories);
        let mut progress = ChecklistProgress::new(vec![0, 1], stage.items.len());

        let first = progress.set(stage, "art", true, &mut board).unwrap();
        let second = progress.set(stage, "art", true, &mut board).unwrap();
        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(second.delta, 0);
        assert_eq!(progress.selected_count(), 1);
        assert_eq!(board.positive_total(), 2);
    }

    #[test]
    fn toggle_outside_presented_items_is_rejected() {
        let survey = survey();
        let stage = checklist(&survey);
        let mut board = ScoreBoard::new(&survey.categories);
        let mut progress = ChecklistProgress::new(vec![0], stage.items.len());

        assert!(matches!(
            progress.set(stage, "drama", true, &mut board),
            Err(Error::BadRequest(_))
        ));
        assert!(board.is_flat(0));
    }
}
