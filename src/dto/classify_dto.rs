use crate::models::features::{Intensity, SpeechFeatures};
use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_list() -> String {
    "speech-v1".to_string()
}

/// Feature vector from the extraction collaborator. Absent numeric features
/// fall back to the 0.0 sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClassifySpeechRequest {
    #[serde(default = "default_list")]
    #[validate(length(min = 1, max = 64))]
    pub list: String,
    pub pitch: Option<f64>,
    pub rate: Option<f64>,
    pub intensity: Intensity,
    pub prosody_variation: Option<f64>,
    pub pause_duration: Option<f64>,
}

impl ClassifySpeechRequest {
    pub fn features(&self) -> SpeechFeatures {
        SpeechFeatures {
            pitch: self.pitch.unwrap_or(0.0),
            rate: self.rate.unwrap_or(0.0),
            intensity: self.intensity,
            prosody_variation: self.prosody_variation.unwrap_or(0.0),
            pause_duration: self.pause_duration.unwrap_or(0.0),
        }
        .sanitized()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifySpeechResponse {
    pub list: String,
    pub label: String,
    pub reason: String,
    pub features: SpeechFeatures,
}
