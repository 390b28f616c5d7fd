use crate::error::{Error, Result};
use crate::models::category::CategorySet;
use crate::models::features::{Intensity, NumericFeature, SpeechFeatures};
use serde::{Deserialize, Serialize};

pub const UNCERTAIN: &str = "Uncertain";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds(self, actual: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => actual < bound,
            Comparison::Le => actual <= bound,
            Comparison::Gt => actual > bound,
            Comparison::Ge => actual >= bound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Guard {
    Numeric {
        feature: NumericFeature,
        op: Comparison,
        value: f64,
    },
    Intensity {
        intensity: Intensity,
    },
}

impl Guard {
    fn holds(&self, features: &SpeechFeatures) -> bool {
        match self {
            Guard::Numeric { feature, op, value } => op.holds(features.value(*feature), *value),
            Guard::Intensity { intensity } => features.intensity == *intensity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub label: String,
    pub reason: String,
    pub guards: Vec<Guard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub reason: String,
}

/// Ordered rules; the first rule whose guards all hold decides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionList {
    pub id: String,
    pub rules: Vec<Rule>,
    pub fallback: Classification,
}

impl DecisionList {
    /// Expects sanitized features: a NaN guard value never holds.
    pub fn classify(&self, features: &SpeechFeatures) -> Classification {
        self.rules
            .iter()
            .find(|rule| rule.guards.iter().all(|g| g.holds(features)))
            .map(|rule| Classification {
                label: rule.label.clone(),
                reason: rule.reason.clone(),
            })
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Every rule label must name a category of `categories`.
    pub fn check_labels(&self, categories: &CategorySet) -> Result<()> {
        for rule in &self.rules {
            if !categories.iter().any(|c| c.name == rule.label || c.key == rule.label) {
                return Err(Error::Configuration(format!(
                    "decision list '{}' labels a rule '{}' outside the category set",
                    self.id, rule.label
                )));
            }
            if rule.guards.is_empty() {
                return Err(Error::Configuration(format!(
                    "rule '{}' of decision list '{}' has no guards",
                    rule.label, self.id
                )));
            }
        }
        Ok(())
    }

    /// Builtin RIASEC speech-profile rules.
    pub fn speech_v1() -> Self {
        use Comparison::*;
        use NumericFeature::*;

        fn num(feature: NumericFeature, op: Comparison, value: f64) -> Guard {
            Guard::Numeric { feature, op, value }
        }
        fn rule(label: &str, reason: &str, guards: Vec<Guard>) -> Rule {
            Rule {
                label: label.to_string(),
                reason: reason.to_string(),
                guards,
            }
        }

        Self {
            id: "speech-v1".to_string(),
            rules: vec![
                rule(
                    "Investigative",
                    "Pitch is in the medium range, and pause duration is short.",
                    vec![num(Pitch, Ge, 150.0), num(Pitch, Le, 300.0), num(PauseDuration, Le, 0.8)],
                ),
                rule(
                    "Realistic",
                    "Pitch is low, speech rate is moderate, and intensity is steady.",
                    vec![
                        num(Pitch, Lt, 200.0),
                        num(Rate, Ge, 2.0),
                        num(Rate, Le, 4.0),
                        Guard::Intensity {
                            intensity: Intensity::Steady,
                        },
                    ],
                ),
                rule(
                    "Artistic",
                    "Prosody variation is high, and intensity is dynamic.",
                    vec![
                        num(ProsodyVariation, Gt, 20.0),
                        Guard::Intensity {
                            intensity: Intensity::Dynamic,
                        },
                    ],
                ),
                rule(
                    "Social",
                    "Pitch is medium to high, and speech rate is fast.",
                    vec![num(Pitch, Ge, 200.0), num(Pitch, Le, 350.0), num(Rate, Ge, 3.0)],
                ),
                rule(
                    "Enterprising",
                    "Pitch is high, speech rate is very fast, and intensity is strong.",
                    vec![
                        num(Pitch, Ge, 250.0),
                        num(Rate, Gt, 4.0),
                        Guard::Intensity {
                            intensity: Intensity::Strong,
                        },
                    ],
                ),
                rule(
                    "Conventional",
                    "Pitch is low, speech rate is slow, and prosody variation is minimal.",
                    vec![num(Pitch, Le, 200.0), num(Rate, Le, 4.0), num(ProsodyVariation, Le, 10.0)],
                ),
            ],
            fallback: Classification {
                label: UNCERTAIN.to_string(),
                reason: "Features do not strongly match any category.".to_string(),
            },
        }
    }
}

pub struct ClassifierService {
    lists: Vec<DecisionList>,
}

impl ClassifierService {
    pub fn new(lists: Vec<DecisionList>) -> Self {
        Self { lists }
    }

    pub fn with_builtins() -> Self {
        Self::new(vec![DecisionList::speech_v1()])
    }

    /// Checks every list's rule labels against `categories`.
    pub fn check_labels(&self, categories: &CategorySet) -> Result<()> {
        self.lists.iter().try_for_each(|list| list.check_labels(categories))
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.lists.iter().map(|l| l.id.clone()).collect()
    }

    pub fn classify(&self, list_id: &str, features: SpeechFeatures) -> Result<Classification> {
        let list = self
            .lists
            .iter()
            .find(|l| l.id == list_id)
            .ok_or_else(|| Error::NotFound(format!("decision list '{}'", list_id)))?;
        let result = list.classify(&features.sanitized());
        tracing::info!("Classified speech with {}: {}", list_id, result.label);
        Ok(result)
    }
}
