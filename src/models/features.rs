use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Steady,
    Dynamic,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericFeature {
    Pitch,
    Rate,
    ProsodyVariation,
    PauseDuration,
}

/// Five-element vector supplied by the feature-extraction collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechFeatures {
    /// Mean fundamental frequency, Hz.
    pub pitch: f64,
    /// Voiced segments per second.
    pub rate: f64,
    pub intensity: Intensity,
    /// Standard deviation of pitch, Hz.
    pub prosody_variation: f64,
    /// Mean silence between voiced segments, seconds.
    pub pause_duration: f64,
}

impl SpeechFeatures {
    pub fn value(&self, feature: NumericFeature) -> f64 {
        match feature {
            NumericFeature::Pitch => self.pitch,
            NumericFeature::Rate => self.rate,
            NumericFeature::ProsodyVariation => self.prosody_variation,
            NumericFeature::PauseDuration => self.pause_duration,
        }
    }

    /// Replaces non-finite numeric features with 0.0.
    pub fn sanitized(self) -> Self {
        fn clean(v: f64) -> f64 {
            if v.is_finite() {
                v
            } else {
                0.0
            }
        }
        Self {
            pitch: clean(self.pitch),
            rate: clean(self.rate),
            intensity: self.intensity,
            prosody_variation: clean(self.prosody_variation),
            pause_duration: clean(self.pause_duration),
        }
    }
}
