use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Index of a category inside the `CategorySet` that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CategoryId(u16);

impl CategoryId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDef {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub initial: Option<char>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub key: String,
    pub name: String,
    pub label: String,
    pub initial: char,
}

/// Closed, ordered set of categories for one survey. The tie-break order is
/// the declaration order unless an explicit permutation was configured.
#[derive(Debug, Clone, Serialize)]
pub struct CategorySet {
    categories: Vec<Category>,
    tie_break: Vec<CategoryId>,
}

impl CategorySet {
    pub fn new(defs: &[CategoryDef], tie_break: Option<&[String]>) -> Result<Self> {
        if defs.is_empty() {
            return Err(Error::Configuration(
                "at least one category is required".to_string(),
            ));
        }
        if defs.len() > u16::MAX as usize {
            return Err(Error::Configuration("too many categories".to_string()));
        }

        let mut keys = HashSet::new();
        let mut initials = HashSet::new();
        let mut categories = Vec::with_capacity(defs.len());

        for (idx, def) in defs.iter().enumerate() {
            let key = def.key.trim();
            if key.is_empty() {
                return Err(Error::Configuration(format!(
                    "category #{} has an empty key",
                    idx + 1
                )));
            }
            if !keys.insert(key.to_string()) {
                return Err(Error::Configuration(format!(
                    "duplicate category key '{}'",
                    key
                )));
            }

            let initial = match def.initial {
                Some(c) => c,
                None => def
                    .name
                    .trim()
                    .chars()
                    .next()
                    .ok_or_else(|| {
                        Error::Configuration(format!("category '{}' has an empty name", key))
                    })?,
            };
            let initial = initial.to_uppercase().next().unwrap_or(initial);
            if !initials.insert(initial) {
                return Err(Error::Configuration(format!(
                    "category '{}' repeats code initial '{}'",
                    key, initial
                )));
            }

            categories.push(Category {
                id: CategoryId(idx as u16),
                key: key.to_string(),
                name: def.name.trim().to_string(),
                label: def
                    .label
                    .clone()
                    .unwrap_or_else(|| def.name.trim().to_string()),
                initial,
            });
        }

        let mut set = Self {
            tie_break: categories.iter().map(|c| c.id).collect(),
            categories,
        };

        if let Some(order) = tie_break {
            set.tie_break = set.resolve_permutation(order)?;
        }

        Ok(set)
    }

    fn resolve_permutation(&self, order: &[String]) -> Result<Vec<CategoryId>> {
        if order.len() != self.categories.len() {
            return Err(Error::Configuration(format!(
                "tie_break lists {} categories, expected {}",
                order.len(),
                self.categories.len()
            )));
        }
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(order.len());
        for key in order {
            let id = self
                .resolve(key)
                .map_err(|_| Error::Configuration(format!("tie_break references unknown category '{}'", key)))?;
            if !seen.insert(id) {
                return Err(Error::Configuration(format!(
                    "tie_break repeats category '{}'",
                    key
                )));
            }
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn resolve(&self, key: &str) -> Result<CategoryId> {
        let key = key.trim();
        self.categories
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.id)
            .ok_or_else(|| Error::UnknownCategory(key.to_string()))
    }

    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn tie_break_order(&self) -> &[CategoryId] {
        &self.tie_break
    }

    /// Position of `id` in the tie-break order; lower wins ties.
    pub fn tie_rank(&self, id: CategoryId) -> usize {
        self.tie_break
            .iter()
            .position(|c| *c == id)
            .unwrap_or(usize::MAX)
    }

    pub fn riasec() -> Result<Self> {
        let defs: Vec<CategoryDef> = RIASEC
            .iter()
            .map(|name| CategoryDef {
                key: name.to_string(),
                name: name.to_string(),
                label: None,
                initial: None,
            })
            .collect();
        Self::new(&defs, None)
    }
}

pub const RIASEC: &[&str] = &[
    "Realistic",
    "Investigative",
    "Artistic",
    "Social",
    "Enterprising",
    "Conventional",
];
