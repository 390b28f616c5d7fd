pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use crate::config::Config;
use crate::models::category::CategorySet;
use crate::services::{
    ai_service::AIService, classifier_service::ClassifierService,
    session_service::{SessionLimits, SessionService}, survey_service::SurveyService,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub survey_service: Arc<SurveyService>,
    pub session_service: SessionService,
    pub classifier_service: Arc<ClassifierService>,
    pub ai_service: AIService,
}

impl AppState {
    pub fn new(config: &Config) -> error::Result<Self> {
        let survey_service = Arc::new(SurveyService::from_config(config)?);
        let session_service =
            SessionService::new(survey_service.clone(), SessionLimits::from_config(config));
        let classifier_service = ClassifierService::with_builtins();
        classifier_service.check_labels(&CategorySet::riasec()?)?;
        let classifier_service = Arc::new(classifier_service);
        let ai_service = AIService::from_config(config);

        Ok(Self {
            survey_service,
            session_service,
            classifier_service,
            ai_service,
        })
    }

    /// Same state with a different summarizer.
    pub fn with_ai_service(mut self, ai_service: AIService) -> Self {
        self.ai_service = ai_service;
        self
    }
}
