use crate::models::category::CategoryId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDef {
    pub id: String,
    pub prompt: String,
    pub category: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItemDef {
    pub id: String,
    pub prompt: String,
    pub categories: Vec<String>,
}

/// One item of a linear stage, already bound to its owning category.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub category: CategoryId,
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
}

/// One checkbox of a checklist stage. Selecting it credits every listed
/// category with the stage's unit weight.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistItem {
    pub id: String,
    pub prompt: String,
    pub categories: Vec<CategoryId>,
}

/// Grouping used by the sampler: the category an item is drawn under.
pub trait Sampled {
    fn item_id(&self) -> &str;
    fn group(&self) -> CategoryId;
}

impl Sampled for Question {
    fn item_id(&self) -> &str {
        &self.id
    }

    fn group(&self) -> CategoryId {
        self.category
    }
}

impl Sampled for ChecklistItem {
    fn item_id(&self) -> &str {
        &self.id
    }

    // validated non-empty at load
    fn group(&self) -> CategoryId {
        self.categories[0]
    }
}
