use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::survey::{Stage, Survey};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const BUILTIN_SURVEYS: &[(&str, &str)] = &[
    ("riasec_quick.json", include_str!("../../data/riasec_quick.json")),
    ("riasec_staged.json", include_str!("../../data/riasec_staged.json")),
    ("ai_literacy.json", include_str!("../../data/ai_literacy.json")),
];

#[derive(Debug, Clone, Serialize)]
pub struct SurveySummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub stages: Vec<String>,
    pub code_length: usize,
    pub knowledge_quiz: bool,
}

/// Validated surveys keyed by id. Immutable once the server is running.
#[derive(Debug, Default)]
pub struct SurveyService {
    surveys: BTreeMap<String, Arc<Survey>>,
}

impl SurveyService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Result<Self> {
        let mut service = Self::new();
        for (name, raw) in BUILTIN_SURVEYS {
            let survey = Survey::from_json(raw).map_err(|e| {
                Error::Configuration(format!("builtin survey {} is invalid: {}", name, e))
            })?;
            service.register(survey)?;
        }
        Ok(service)
    }

    /// Builtins plus every `*.json` document under `SURVEY_DIR`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut service = Self::with_builtins()?;
        if let Some(dir) = &config.survey_dir {
            let loaded = service.load_dir(dir)?;
            tracing::info!("Loaded {} survey(s) from {}", loaded, dir.display());
        }
        Ok(service)
    }

    pub fn register(&mut self, survey: Survey) -> Result<()> {
        if self.surveys.contains_key(&survey.id) {
            return Err(Error::Configuration(format!(
                "survey id '{}' is registered twice",
                survey.id
            )));
        }
        tracing::info!(
            "Registered survey {} ({} stage(s), {} categories)",
            survey.id,
            survey.stages.len(),
            survey.categories.len()
        );
        self.surveys.insert(survey.id.clone(), Arc::new(survey));
        Ok(())
    }

    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        paths.sort();

        for path in &paths {
            let raw = std::fs::read_to_string(path)?;
            let survey = Survey::from_json(&raw).map_err(|e| {
                Error::Configuration(format!("{}: {}", path.display(), e))
            })?;
            self.register(survey)?;
        }
        Ok(paths.len())
    }

    pub fn get(&self, id: &str) -> Result<Arc<Survey>> {
        self.surveys
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("survey '{}'", id)))
    }

    pub fn list(&self) -> Vec<SurveySummary> {
        self.surveys
            .values()
            .map(|s| SurveySummary {
                id: s.id.clone(),
                title: s.title.clone(),
                description: s.description.clone(),
                categories: s.categories.iter().map(|c| c.name.clone()).collect(),
                stages: s.stages.iter().map(|st| st.title().to_string()).collect(),
                code_length: s.code_length,
                knowledge_quiz: s.is_knowledge_quiz(),
            })
            .collect()
    }
}

/// Largest total each category can reach from the given presented items.
pub fn score_ceilings(survey: &Survey, presented: &[Vec<usize>]) -> Vec<i64> {
    let mut ceilings = vec![0i64; survey.categories.len()];
    for (stage, order) in survey.stages.iter().zip(presented) {
        match stage {
            Stage::Linear(s) => {
                for idx in order {
                    let item = &s.items[*idx];
                    ceilings[item.category.index()] +=
                        s.scale.max_delta(item.correct_answer.as_deref());
                }
            }
            Stage::Checklist(s) => {
                for idx in order {
                    for category in &s.items[*idx].categories {
                        ceilings[category.index()] += s.unit_weight;
                    }
                }
            }
        }
    }
    ceilings
}
