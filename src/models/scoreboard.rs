use crate::error::{Error, Result};
use crate::models::category::{CategoryId, CategorySet};
use serde::Serialize;

/// Running total per category. Every category of the set has an entry from
/// construction on, so a missing key cannot be confused with a zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreBoard {
    totals: Vec<i64>,
}

impl ScoreBoard {
    pub fn new(categories: &CategorySet) -> Self {
        Self {
            totals: vec![0; categories.len()],
        }
    }

    pub fn apply(&mut self, category: CategoryId, delta: i64) -> Result<()> {
        let slot = self
            .totals
            .get_mut(category.index())
            .ok_or_else(|| Error::UnknownCategory(format!("#{}", category.index())))?;
        *slot += delta;
        Ok(())
    }

    pub fn get(&self, category: CategoryId) -> i64 {
        self.totals.get(category.index()).copied().unwrap_or(0)
    }

    pub fn totals(&self) -> &[i64] {
        &self.totals
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn positive_total(&self) -> i64 {
        self.totals.iter().filter(|t| **t > 0).sum()
    }

    /// True when no category rises above `floor`.
    pub fn is_flat(&self, floor: i64) -> bool {
        self.totals.iter().all(|t| *t <= floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_starts_at_zero() {
        let set = CategorySet::riasec().unwrap();
        let board = ScoreBoard::new(&set);
        assert_eq!(board.len(), 6);
        assert!(board.totals().iter().all(|t| *t == 0));
        assert!(board.is_flat(0));
    }

    #[test]
    fn apply_adjusts_one_category() {
        let set = CategorySet::riasec().unwrap();
        let mut board = ScoreBoard::new(&set);
        let social = set.resolve("Social").unwrap();
        board.apply(social, 2).unwrap();
        board.apply(social, -1).unwrap();
        assert_eq!(board.get(social), 1);
        assert_eq!(board.positive_total(), 1);
        assert!(!board.is_flat(0));
    }
}
