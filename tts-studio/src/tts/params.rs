//! Typed generation parameters for the multilingual model.

use crate::error::ParamError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Languages accepted by Chatterbox Multilingual (ISO 639-1).
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "ar", "da", "de", "el", "en", "es", "fi", "fr", "he", "hi", "it", "ja", "ko", "ms", "nl", "no",
    "pl", "pt", "ru", "sv", "sw", "tr", "zh",
];

pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.05..=5.0;
pub const CFG_WEIGHT_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const EXAGGERATION_RANGE: RangeInclusive<f32> = 0.25..=2.0;
pub const REPETITION_PENALTY_RANGE: RangeInclusive<f32> = 1.0..=3.0;
pub const MIN_P_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const TOP_P_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// Parameters for one generation, shared by every chunk of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Language code, e.g. "it"
    pub language_id: String,
    /// Randomness; lower is more consistent
    pub temperature: f32,
    /// Prompt fidelity / pacing; lower is faster
    pub cfg_weight: f32,
    /// Expressiveness
    pub exaggeration: f32,
    pub repetition_penalty: f32,
    pub min_p: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            language_id: "it".to_string(),
            temperature: 0.8,
            cfg_weight: 0.5,
            exaggeration: 0.8,
            repetition_penalty: 2.0,
            min_p: 0.05,
            top_p: 1.0,
        }
    }
}

fn check(name: &'static str, value: f32, range: &RangeInclusive<f32>) -> Result<(), ParamError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ParamError::OutOfRange {
            name,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

fn clamp(value: f32, range: &RangeInclusive<f32>) -> f32 {
    value.clamp(*range.start(), *range.end())
}

/// Check a language code against [`SUPPORTED_LANGUAGES`].
pub fn validate_language(language_id: &str) -> Result<(), ParamError> {
    if SUPPORTED_LANGUAGES.contains(&language_id) {
        Ok(())
    } else {
        Err(ParamError::UnsupportedLanguage(language_id.to_string()))
    }
}

impl GenerationParams {
    /// Reject out-of-range values and unknown languages.
    pub fn validate(&self) -> Result<(), ParamError> {
        validate_language(&self.language_id)?;
        check("temperature", self.temperature, &TEMPERATURE_RANGE)?;
        check("cfg_weight", self.cfg_weight, &CFG_WEIGHT_RANGE)?;
        check("exaggeration", self.exaggeration, &EXAGGERATION_RANGE)?;
        check("repetition_penalty", self.repetition_penalty, &REPETITION_PENALTY_RANGE)?;
        check("min_p", self.min_p, &MIN_P_RANGE)?;
        check("top_p", self.top_p, &TOP_P_RANGE)?;
        Ok(())
    }

    pub fn with_language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = language_id.into();
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = clamp(temperature, &TEMPERATURE_RANGE);
        self
    }

    /// Set the CFG/pacing weight.
    pub fn with_cfg_weight(mut self, cfg_weight: f32) -> Self {
        self.cfg_weight = clamp(cfg_weight, &CFG_WEIGHT_RANGE);
        self
    }

    /// Set the exaggeration level.
    pub fn with_exaggeration(mut self, exaggeration: f32) -> Self {
        self.exaggeration = clamp(exaggeration, &EXAGGERATION_RANGE);
        self
    }

    pub fn with_repetition_penalty(mut self, repetition_penalty: f32) -> Self {
        self.repetition_penalty = clamp(repetition_penalty, &REPETITION_PENALTY_RANGE);
        self
    }

    pub fn with_min_p(mut self, min_p: f32) -> Self {
        self.min_p = clamp(min_p, &MIN_P_RANGE);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = clamp(top_p, &TOP_P_RANGE);
        self
    }
}
