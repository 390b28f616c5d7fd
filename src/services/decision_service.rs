use crate::models::category::{CategoryId, CategorySet};
use crate::models::response::Response;
use crate::models::response_log::ResponseLog;
use crate::models::scoreboard::ScoreBoard;
use crate::models::survey::{Stage, Survey};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CodeDecision {
    Determined { code: String },
    Undetermined,
}

impl CodeDecision {
    pub fn code(&self) -> Option<&str> {
        match self {
            CodeDecision::Determined { code } => Some(code),
            CodeDecision::Undetermined => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedCategory {
    pub key: String,
    pub name: String,
    pub label: String,
    pub initial: char,
    pub total: i64,
    pub max_possible: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Share {
    pub key: String,
    pub name: String,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecommendationMatch {
    /// Entries listed under the exact code.
    pub careers: Vec<String>,
    /// Union of the fields listed for the code's categories.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub ranking: Vec<RankedCategory>,
    pub decision: CodeDecision,
    pub distribution: Option<Vec<Share>>,
    pub best_categories: Vec<String>,
    pub best_score: Option<i64>,
    pub recommendations: RecommendationMatch,
}

/// One incorrectly answered knowledge item, as forwarded to the summarizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mistake {
    pub prompt: String,
    pub category: String,
    pub selected_answer: String,
    pub correct_answer: String,
}

pub struct DecisionService;

impl DecisionService {
    /// Categories by total, descending. Equal totals keep the configured
    /// tie-break order.
    pub fn rank(board: &ScoreBoard, categories: &CategorySet) -> Vec<CategoryId> {
        let mut order: Vec<CategoryId> = categories.tie_break_order().to_vec();
        // stable sort over the tie-break order
        order.sort_by(|a, b| board.get(*b).cmp(&board.get(*a)));
        order
    }

    /// Initials of the top `length` categories, or `Undetermined` when no
    /// total rises above `floor`.
    pub fn derive_code(
        board: &ScoreBoard,
        categories: &CategorySet,
        length: usize,
        floor: i64,
    ) -> CodeDecision {
        if board.is_flat(floor) {
            return CodeDecision::Undetermined;
        }
        let code = Self::rank(board, categories)
            .into_iter()
            .take(length)
            .filter_map(|id| categories.get(id).map(|c| c.initial))
            .collect();
        CodeDecision::Determined { code }
    }

    pub fn distribution(board: &ScoreBoard, categories: &CategorySet) -> Option<Vec<Share>> {
        let total = board.positive_total();
        if total <= 0 {
            return None;
        }
        Some(
            categories
                .iter()
                .map(|c| {
                    let score = board.get(c.id).max(0);
                    Share {
                        key: c.key.clone(),
                        name: c.name.clone(),
                        percent: score as f64 / total as f64 * 100.0,
                    }
                })
                .collect(),
        )
    }

    pub fn outcome(survey: &Survey, board: &ScoreBoard, ceilings: &[i64]) -> Outcome {
        let categories = &survey.categories;
        let order = Self::rank(board, categories);
        let ranking = order
            .iter()
            .filter_map(|id| categories.get(*id))
            .map(|c| RankedCategory {
                key: c.key.clone(),
                name: c.name.clone(),
                label: c.label.clone(),
                initial: c.initial,
                total: board.get(c.id),
                max_possible: ceilings.get(c.id.index()).copied().unwrap_or(0),
            })
            .collect();

        let decision =
            Self::derive_code(board, categories, survey.code_length, survey.no_signal_floor);

        let (best_categories, best_score, recommendations) = match &decision {
            CodeDecision::Undetermined => (Vec::new(), None, RecommendationMatch::default()),
            CodeDecision::Determined { code } => {
                let top = order.first().map(|id| board.get(*id)).unwrap_or(0);
                let best = order
                    .iter()
                    .filter(|id| board.get(**id) == top)
                    .filter_map(|id| categories.get(*id).map(|c| c.name.clone()))
                    .collect();
                let leading: Vec<CategoryId> =
                    order.iter().copied().take(survey.code_length).collect();
                (best, Some(top), Self::recommend(survey, code, &leading))
            }
        };

        Outcome {
            ranking,
            decision,
            distribution: Self::distribution(board, categories),
            best_categories,
            best_score,
            recommendations,
        }
    }

    fn recommend(survey: &Survey, code: &str, leading: &[CategoryId]) -> RecommendationMatch {
        let careers = survey
            .recommendations
            .by_code
            .get(code)
            .cloned()
            .unwrap_or_default();
        let fields: BTreeSet<String> = leading
            .iter()
            .filter_map(|id| survey.recommendations.by_category.get(id))
            .flatten()
            .cloned()
            .collect();
        RecommendationMatch {
            careers,
            fields: fields.into_iter().collect(),
        }
    }

    /// Answered knowledge items whose choice differs from the canonical answer.
    /// Items without a canonical answer are never mistakes.
    pub fn extract_mistakes(survey: &Survey, log: &ResponseLog) -> Vec<Mistake> {
        log.iter()
            .filter_map(|entry| {
                let stage = match survey.stages.get(entry.stage)? {
                    Stage::Linear(stage) => stage,
                    Stage::Checklist(_) => return None,
                };
                let item = stage.item(&entry.item_id)?;
                let correct = item.correct_answer.as_ref()?;
                let selected = match &entry.response {
                    Response::Choice(choice) => choice,
                    _ => return None,
                };
                if selected == correct {
                    return None;
                }
                let category = survey
                    .categories
                    .get(item.category)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                Some(Mistake {
                    prompt: item.prompt.clone(),
                    category,
                    selected_answer: selected.clone(),
                    correct_answer: correct.clone(),
                })
            })
            .collect()
    }

    /// Prompts of linear items answered at an endorsing level.
    pub fn endorsed_prompts(survey: &Survey, log: &ResponseLog) -> Vec<String> {
        log.iter()
            .filter_map(|entry| match survey.stages.get(entry.stage)? {
                Stage::Linear(stage) => {
                    let item = stage.item(&entry.item_id)?;
                    stage
                        .scale
                        .endorses(&entry.response)
                        .then(|| item.prompt.clone())
                }
                Stage::Checklist(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::category::CategoryDef;
    use crate::models::response_log::LogEntry;
    use chrono::Utc;
    use serde_json::json;

    fn abc() -> CategorySet {
        let defs: Vec<CategoryDef> = ["A", "B", "C"]
            .iter()
            .map(|k| CategoryDef {
                key: k.to_string(),
                name: k.to_string(),
                label: None,
                initial: None,
            })
            .collect();
        CategorySet::new(&defs, None).unwrap()
    }

    fn board(set: &CategorySet, totals: &[(&str, i64)]) -> ScoreBoard {
        let mut board = ScoreBoard::new(set);
        for (key, total) in totals {
            board.apply(set.resolve(key).unwrap(), *total).unwrap();
        }
        board
    }

    #[test]
    fn ties_follow_configured_order() {
        let set = abc();
        let board = board(&set, &[("A", 5), ("B", 5), ("C", 1)]);
        for _ in 0..100 {
            let keys: Vec<String> = DecisionService::rank(&board, &set)
                .into_iter()
                .map(|id| set.get(id).unwrap().key.clone())
                .collect();
            assert_eq!(keys, vec!["A", "B", "C"]);
        }

        let order = vec!["B".to_string(), "A".to_string(), "C".to_string()];
        let reordered = CategorySet::new(
            &["A", "B", "C"]
                .iter()
                .map(|k| CategoryDef {
                    key: k.to_string(),
                    name: k.to_string(),
                    label: None,
                    initial: None,
                })
                .collect::<Vec<_>>(),
            Some(order.as_slice()),
        )
        .unwrap();
        let board = self::board(&reordered, &[("A", 5), ("B", 5), ("C", 1)]);
        assert_eq!(
            DecisionService::derive_code(&board, &reordered, 3, 0),
            CodeDecision::Determined {
                code: "BAC".to_string()
            }
        );
    }

    #[test]
    fn all_zero_board_is_undetermined() {
        let set = CategorySet::riasec().unwrap();
        let board = ScoreBoard::new(&set);
        assert_eq!(
            DecisionService::derive_code(&board, &set, 3, 0),
            CodeDecision::Undetermined
        );
        assert!(DecisionService::distribution(&board, &set).is_none());
    }

    #[test]
    fn floor_raises_the_no_signal_bar() {
        let set = abc();
        let board = board(&set, &[("A", 2), ("B", 1)]);
        assert_eq!(
            DecisionService::derive_code(&board, &set, 2, 2),
            CodeDecision::Undetermined
        );
        assert_eq!(
            DecisionService::derive_code(&board, &set, 2, 1),
            CodeDecision::Determined {
                code: "AB".to_string()
            }
        );
    }

    #[test]
    fn code_shrinks_with_fewer_categories() {
        let set = abc();
        let board = board(&set, &[("C", 1)]);
        assert_eq!(
            DecisionService::derive_code(&board, &set, 5, 0),
            CodeDecision::Determined {
                code: "CAB".to_string()
            }
        );
    }

    #[test]
    fn distribution_sums_to_hundred() {
        let set = abc();
        let board = board(&set, &[("A", 3), ("B", 1)]);
        let shares = DecisionService::distribution(&board, &set).unwrap();
        let sum: f64 = shares.iter().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert!((shares[0].percent - 75.0).abs() < 1e-9);
        assert_eq!(shares[2].percent, 0.0);
    }

    fn quiz() -> Survey {
        let items: Vec<serde_json::Value> = (0..10)
            .map(|i| {
                json!({
                    "id": format!("k{}", i),
                    "prompt": format!("Question {}", i),
                    "category": if i % 2 == 0 { "ml" } else { "ethics" },
                    "options": ["right", "wrong"],
                    "correct_answer": "right"
                })
            })
            .collect();
        let doc = json!({
            "id": "quiz",
            "title": "Quiz",
            "code_length": 1,
            "categories": [
                {"key": "ml", "name": "Machine learning"},
                {"key": "ethics", "name": "Ethics"}
            ],
            "stages": [{
                "type": "linear",
                "title": "Knowledge",
                "scale": {"kind": "choice"},
                "items": items
            }]
        });
        Survey::from_json(&doc.to_string()).unwrap()
    }

    #[test]
    fn only_incorrect_answers_are_forwarded() {
        let survey = quiz();
        let stage = match &survey.stages[0] {
            Stage::Linear(s) => s,
            Stage::Checklist(_) => unreachable!(),
        };
        let mut log = ResponseLog::new();
        for (i, item) in stage.items.iter().enumerate() {
            let choice = if [2, 5, 7].contains(&i) { "wrong" } else { "right" };
            log.push(LogEntry {
                stage: 0,
                item_id: item.id.clone(),
                category: item.category,
                response: Response::Choice(choice.to_string()),
                delta: 0,
                answered_at: Utc::now(),
            });
        }

        let mistakes = DecisionService::extract_mistakes(&survey, &log);
        assert_eq!(log.len(), 10);
        assert_eq!(mistakes.len(), 3);
        assert!(mistakes.iter().all(|m| m.selected_answer == "wrong"));
        assert!(mistakes.iter().all(|m| m.correct_answer == "right"));
        let prompts: Vec<&str> = mistakes.iter().map(|m| m.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["Question 2", "Question 5", "Question 7"]);
    }

    #[test]
    fn outcome_lists_tied_leaders_and_recommendations() {
        let doc = json!({
            "id": "rec",
            "title": "Rec",
            "code_length": 2,
            "categories": [
                {"key": "realistic", "name": "Realistic"},
                {"key": "investigative", "name": "Investigative"},
                {"key": "social", "name": "Social"}
            ],
            "stages": [{
                "type": "checklist",
                "title": "Subjects",
                "items": [{"id": "x", "prompt": "X", "categories": ["social"]}]
            }],
            "recommendations": {
                "by_code": {"RI": ["Engineer"]},
                "by_category": {
                    "realistic": ["Mechanics", "Agriculture"],
                    "investigative": ["Physics", "Mechanics"]
                }
            }
        });
        let survey = Survey::from_json(&doc.to_string()).unwrap();
        let board = board(&survey.categories, &[("realistic", 4), ("investigative", 4)]);
        let outcome = DecisionService::outcome(&survey, &board, &[8, 8, 1]);

        assert_eq!(outcome.decision.code(), Some("RI"));
        assert_eq!(outcome.best_categories, vec!["Realistic", "Investigative"]);
        assert_eq!(outcome.best_score, Some(4));
        assert_eq!(outcome.recommendations.careers, vec!["Engineer"]);
        assert_eq!(
            outcome.recommendations.fields,
            vec!["Agriculture", "Mechanics", "Physics"]
        );
        assert_eq!(outcome.ranking[0].max_possible, 8);
    }
}
