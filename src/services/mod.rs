pub mod ai_service;
pub mod classifier_service;
pub mod decision_service;
pub mod sampler_service;
pub mod scoring_service;
pub mod session_service;
pub mod survey_service;
