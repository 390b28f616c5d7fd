use crate::error::{Error, Result};
use crate::models::category::{CategoryDef, CategoryId, CategorySet};
use crate::models::question::{ChecklistItem, ChecklistItemDef, Question, QuestionDef, Sampled};
use crate::models::response::{ResponseScale, WeightLevel, WeightTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

fn default_code_length() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_unit_weight() -> i64 {
    1
}

/// Survey document as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct SurveyDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub categories: Vec<CategoryDef>,
    #[serde(default)]
    pub tie_break: Option<Vec<String>>,
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default)]
    pub no_signal_floor: i64,
    pub stages: Vec<StageDef>,
    #[serde(default)]
    pub recommendations: RecommendationDef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageDef {
    Linear(LinearStageDef),
    Checklist(ChecklistStageDef),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearStageDef {
    pub title: String,
    pub scale: ScaleDef,
    #[serde(default)]
    pub per_category: Option<usize>,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    pub items: Vec<QuestionDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScaleDef {
    Likert { levels: Vec<WeightLevel> },
    YesNo { yes: String, no: String },
    Choice,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChecklistStageDef {
    pub title: String,
    #[serde(default)]
    pub per_category: Option<usize>,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default = "default_unit_weight")]
    pub unit_weight: i64,
    #[serde(default)]
    pub min_selected: usize,
    pub items: Vec<ChecklistItemDef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationDef {
    #[serde(default)]
    pub by_code: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub by_category: BTreeMap<String, Vec<String>>,
}

/// How many items a stage draws from its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "k", rename_all = "snake_case")]
pub enum SampleSize {
    All,
    PerCategory(usize),
    Overall(usize),
}

impl SampleSize {
    fn from_def(per_category: Option<usize>, total: Option<usize>, title: &str) -> Result<Self> {
        match (per_category, total) {
            (None, None) => Ok(SampleSize::All),
            (Some(k), None) => Ok(SampleSize::PerCategory(k)),
            (None, Some(k)) => Ok(SampleSize::Overall(k)),
            (Some(_), Some(_)) => Err(Error::Configuration(format!(
                "stage '{}' sets both per_category and total",
                title
            ))),
        }
    }

    /// Items every session presents from `pool`; sampling never varies the count.
    pub fn presented<T: Sampled>(&self, pool: &[T], categories: &CategorySet) -> usize {
        match *self {
            SampleSize::All => pool.len(),
            SampleSize::Overall(k) => k.min(pool.len()),
            SampleSize::PerCategory(k) => categories
                .iter()
                .map(|c| pool.iter().filter(|item| item.group() == c.id).count().min(k))
                .sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinearStage {
    pub title: String,
    pub scale: ResponseScale,
    pub sample: SampleSize,
    pub shuffle: bool,
    pub items: Vec<Question>,
}

impl LinearStage {
    pub fn item(&self, id: &str) -> Option<&Question> {
        self.items.iter().find(|q| q.id == id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistStage {
    pub title: String,
    pub sample: SampleSize,
    pub shuffle: bool,
    pub unit_weight: i64,
    pub min_selected: usize,
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    Linear(LinearStage),
    Checklist(ChecklistStage),
}

impl Stage {
    pub fn title(&self) -> &str {
        match self {
            Stage::Linear(s) => &s.title,
            Stage::Checklist(s) => &s.title,
        }
    }

    pub fn pool_size(&self) -> usize {
        match self {
            Stage::Linear(s) => s.items.len(),
            Stage::Checklist(s) => s.items.len(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Recommendations {
    pub by_code: BTreeMap<String, Vec<String>>,
    pub by_category: BTreeMap<CategoryId, Vec<String>>,
}

/// A validated survey. Every category reference has been resolved against
/// `categories`, so nothing downstream can hit an unknown key.
#[derive(Debug, Clone, Serialize)]
pub struct Survey {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub categories: CategorySet,
    pub code_length: usize,
    pub no_signal_floor: i64,
    pub stages: Vec<Stage>,
    pub recommendations: Recommendations,
}

impl Survey {
    pub fn from_json(raw: &str) -> Result<Self> {
        let def: SurveyDefinition = serde_json::from_str(raw)?;
        Self::try_from(def)
    }

    /// True when some item carries a canonical answer.
    pub fn is_knowledge_quiz(&self) -> bool {
        self.stages.iter().any(|stage| match stage {
            Stage::Linear(s) => s.items.iter().any(|q| q.correct_answer.is_some()),
            Stage::Checklist(_) => false,
        })
    }
}

impl TryFrom<SurveyDefinition> for Survey {
    type Error = Error;

    fn try_from(def: SurveyDefinition) -> Result<Self> {
        if def.id.trim().is_empty() {
            return Err(Error::Configuration("survey id is empty".to_string()));
        }
        if def.code_length == 0 {
            return Err(Error::Configuration(format!(
                "survey '{}': code_length must be at least 1",
                def.id
            )));
        }
        if def.stages.is_empty() {
            return Err(Error::Configuration(format!(
                "survey '{}' has no stages",
                def.id
            )));
        }

        let categories = CategorySet::new(&def.categories, def.tie_break.as_deref())?;
        let mut seen_ids = HashSet::new();
        let mut stages = Vec::with_capacity(def.stages.len());
        for stage in def.stages {
            let stage = match stage {
                StageDef::Linear(s) => Stage::Linear(build_linear(s, &categories, &mut seen_ids)?),
                StageDef::Checklist(s) => {
                    Stage::Checklist(build_checklist(s, &categories, &mut seen_ids)?)
                }
            };
            stages.push(stage);
        }

        let recommendations = build_recommendations(def.recommendations, &categories)?;

        Ok(Self {
            id: def.id,
            title: def.title,
            description: def.description,
            categories,
            code_length: def.code_length,
            no_signal_floor: def.no_signal_floor,
            stages,
            recommendations,
        })
    }
}

fn check_item_id(id: &str, seen: &mut HashSet<String>) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Configuration("item id is empty".to_string()));
    }
    if !seen.insert(id.to_string()) {
        return Err(Error::Configuration(format!(
            "item id '{}' is used more than once",
            id
        )));
    }
    Ok(())
}

fn build_linear(
    def: LinearStageDef,
    categories: &CategorySet,
    seen: &mut HashSet<String>,
) -> Result<LinearStage> {
    let sample = SampleSize::from_def(def.per_category, def.total, &def.title)?;
    let scale = match def.scale {
        ScaleDef::Likert { levels } => ResponseScale::Likert {
            table: WeightTable::new(levels)?,
        },
        ScaleDef::YesNo { yes, no } => ResponseScale::YesNo {
            table: WeightTable::yes_no(&yes, &no)?,
        },
        ScaleDef::Choice => ResponseScale::Choice,
    };

    let mut items = Vec::with_capacity(def.items.len());
    for item in def.items {
        check_item_id(&item.id, seen)?;
        let category = categories.resolve(&item.category).map_err(|_| {
            Error::Configuration(format!(
                "item '{}' references unknown category '{}'",
                item.id, item.category
            ))
        })?;
        match scale {
            ResponseScale::Choice => {
                if item.options.len() < 2 {
                    return Err(Error::Configuration(format!(
                        "choice item '{}' needs at least two options",
                        item.id
                    )));
                }
                if let Some(answer) = &item.correct_answer {
                    if !item.options.contains(answer) {
                        return Err(Error::Configuration(format!(
                            "correct answer of item '{}' is not one of its options",
                            item.id
                        )));
                    }
                }
            }
            _ => {
                if !item.options.is_empty() || item.correct_answer.is_some() {
                    return Err(Error::Configuration(format!(
                        "item '{}' carries options but its stage uses a fixed scale",
                        item.id
                    )));
                }
            }
        }
        items.push(Question {
            id: item.id,
            prompt: item.prompt,
            category,
            options: item.options,
            correct_answer: item.correct_answer,
        });
    }

    Ok(LinearStage {
        title: def.title,
        scale,
        sample,
        shuffle: def.shuffle,
        items,
    })
}

fn build_checklist(
    def: ChecklistStageDef,
    categories: &CategorySet,
    seen: &mut HashSet<String>,
) -> Result<ChecklistStage> {
    let sample = SampleSize::from_def(def.per_category, def.total, &def.title)?;
    if def.unit_weight <= 0 {
        return Err(Error::Configuration(format!(
            "stage '{}': unit_weight must be positive",
            def.title
        )));
    }

    let mut items = Vec::with_capacity(def.items.len());
    for item in def.items {
        check_item_id(&item.id, seen)?;
        if item.categories.is_empty() {
            return Err(Error::Configuration(format!(
                "checklist item '{}' maps to no category",
                item.id
            )));
        }
        let mut mapped = Vec::with_capacity(item.categories.len());
        for key in &item.categories {
            let id = categories.resolve(key).map_err(|_| {
                Error::Configuration(format!(
                    "checklist item '{}' references unknown category '{}'",
                    item.id, key
                ))
            })?;
            if mapped.contains(&id) {
                return Err(Error::Configuration(format!(
                    "checklist item '{}' lists category '{}' twice",
                    item.id, key
                )));
            }
            mapped.push(id);
        }
        items.push(ChecklistItem {
            id: item.id,
            prompt: item.prompt,
            categories: mapped,
        });
    }

    let presented = sample.presented(&items, categories);
    if def.min_selected > presented {
        return Err(Error::Configuration(format!(
            "stage '{}' requires {} selections but presents {} items",
            def.title, def.min_selected, presented
        )));
    }

    Ok(ChecklistStage {
        title: def.title,
        sample,
        shuffle: def.shuffle,
        unit_weight: def.unit_weight,
        min_selected: def.min_selected,
        items,
    })
}

fn build_recommendations(
    def: RecommendationDef,
    categories: &CategorySet,
) -> Result<Recommendations> {
    let initials: HashSet<char> = categories.iter().map(|c| c.initial).collect();
    for code in def.by_code.keys() {
        if code.is_empty() || !code.chars().all(|ch| initials.contains(&ch)) {
            return Err(Error::Configuration(format!(
                "recommendation code '{}' uses letters outside the category initials",
                code
            )));
        }
    }

    let mut by_category = BTreeMap::new();
    for (key, fields) in def.by_category {
        let id = categories.resolve(&key).map_err(|_| {
            Error::Configuration(format!(
                "recommendations reference unknown category '{}'",
                key
            ))
        })?;
        by_category.insert(id, fields);
    }

    Ok(Recommendations {
        by_code: def.by_code,
        by_category,
    })
}
