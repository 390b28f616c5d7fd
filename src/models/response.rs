use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightLevel {
    pub label: String,
    pub weight: i32,
}

/// Ordinal levels in ascending agreement order, each mapped to an integer
/// weight. Weights are strictly increasing along the levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightTable {
    levels: Vec<WeightLevel>,
}

impl WeightTable {
    pub fn new(levels: Vec<WeightLevel>) -> Result<Self> {
        if levels.len() < 2 {
            return Err(Error::Configuration(
                "a weight table needs at least two levels".to_string(),
            ));
        }
        for (idx, level) in levels.iter().enumerate() {
            if level.label.trim().is_empty() {
                return Err(Error::Configuration(format!(
                    "weight level #{} has an empty label",
                    idx + 1
                )));
            }
            if levels[..idx].iter().any(|l| l.label == level.label) {
                return Err(Error::Configuration(format!(
                    "weight level '{}' is listed twice",
                    level.label
                )));
            }
        }
        for pair in levels.windows(2) {
            if pair[1].weight <= pair[0].weight {
                return Err(Error::Configuration(format!(
                    "weights must increase with agreement: '{}' ({}) is not above '{}' ({})",
                    pair[1].label, pair[1].weight, pair[0].label, pair[0].weight
                )));
            }
        }
        Ok(Self { levels })
    }

    /// Five-point agreement scale weighted 0..=4.
    pub fn likert_default() -> Self {
        let levels = [
            "Strongly disagree",
            "Disagree",
            "Not sure",
            "Agree",
            "Strongly agree",
        ]
        .iter()
        .enumerate()
        .map(|(weight, label)| WeightLevel {
            label: label.to_string(),
            weight: weight as i32,
        })
        .collect();
        Self { levels }
    }

    /// Binary table: `yes` scores +1, `no` scores +0.
    pub fn yes_no(yes: &str, no: &str) -> Result<Self> {
        Self::new(vec![
            WeightLevel {
                label: no.to_string(),
                weight: 0,
            },
            WeightLevel {
                label: yes.to_string(),
                weight: 1,
            },
        ])
    }

    pub fn levels(&self) -> &[WeightLevel] {
        &self.levels
    }

    pub fn labels(&self) -> Vec<String> {
        self.levels.iter().map(|l| l.label.clone()).collect()
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.levels.iter().position(|l| l.label == label)
    }

    pub fn weight_of(&self, label: &str) -> Option<i32> {
        self.position(label).map(|idx| self.levels[idx].weight)
    }

    /// The two highest levels endorse an item; a two-level table only its top.
    pub fn endorses(&self, label: &str) -> bool {
        let top = self.levels.len().saturating_sub(1);
        let from = if self.levels.len() >= 3 { top - 1 } else { top };
        self.position(label).map(|idx| idx >= from).unwrap_or(false)
    }

    fn top_label(&self) -> &str {
        &self.levels[self.levels.len() - 1].label
    }

    fn bottom_label(&self) -> &str {
        &self.levels[0].label
    }
}

/// How a linear stage interprets the respondent's chosen option.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseScale {
    Likert { table: WeightTable },
    YesNo { table: WeightTable },
    Choice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Response {
    Choice(String),
    Boolean(bool),
    Ordinal(String),
}

impl ResponseScale {
    pub fn options(&self, item_options: &[String]) -> Vec<String> {
        match self {
            ResponseScale::Likert { table } => table.labels(),
            ResponseScale::YesNo { table } => {
                vec![table.top_label().to_string(), table.bottom_label().to_string()]
            }
            ResponseScale::Choice => item_options.to_vec(),
        }
    }

    /// Parses a chosen option string into a typed response. `None` means the
    /// option is not offered by this scale for that item.
    pub fn interpret(&self, choice: &str, item_options: &[String]) -> Option<Response> {
        match self {
            ResponseScale::Likert { table } => table
                .position(choice)
                .map(|_| Response::Ordinal(choice.to_string())),
            ResponseScale::YesNo { table } => {
                if choice == table.top_label() {
                    Some(Response::Boolean(true))
                } else if choice == table.bottom_label() {
                    Some(Response::Boolean(false))
                } else {
                    None
                }
            }
            ResponseScale::Choice => item_options
                .iter()
                .any(|o| o == choice)
                .then(|| Response::Choice(choice.to_string())),
        }
    }

    /// Score delta for a response. Knowledge items score +1 when the chosen
    /// option equals the canonical answer.
    pub fn delta(&self, response: &Response, correct_answer: Option<&str>) -> i64 {
        match (self, response) {
            (ResponseScale::Likert { table }, Response::Ordinal(label)) => {
                table.weight_of(label).unwrap_or(0) as i64
            }
            (ResponseScale::YesNo { table }, Response::Boolean(yes)) => {
                let label = if *yes {
                    table.top_label()
                } else {
                    table.bottom_label()
                };
                table.weight_of(label).unwrap_or(0) as i64
            }
            (ResponseScale::Choice, Response::Choice(option)) => match correct_answer {
                Some(correct) if correct == option => 1,
                _ => 0,
            },
            _ => 0,
        }
    }

    /// Highest delta a single item can contribute.
    pub fn max_delta(&self, correct_answer: Option<&str>) -> i64 {
        match self {
            ResponseScale::Likert { table } | ResponseScale::YesNo { table } => {
                table.levels.last().map(|l| l.weight as i64).unwrap_or(0)
            }
            ResponseScale::Choice => i64::from(correct_answer.is_some()),
        }
    }

    pub fn endorses(&self, response: &Response) -> bool {
        match (self, response) {
            (ResponseScale::Likert { table }, Response::Ordinal(label)) => table.endorses(label),
            (ResponseScale::YesNo { .. }, Response::Boolean(yes)) => *yes,
            _ => false,
        }
    }
}
