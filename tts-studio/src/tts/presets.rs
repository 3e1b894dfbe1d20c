//! Named parameter presets.

use super::GenerationParams;
use crate::error::ParamError;

/// Sampling values of one preset. The language stays whatever the caller
/// configured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub temperature: f32,
    pub cfg_weight: f32,
    pub exaggeration: f32,
    pub repetition_penalty: f32,
    pub min_p: f32,
    pub top_p: f32,
}

pub const DEFAULT_PRESET: &str = "Neutral (Default)";

const fn preset(
    name: &'static str,
    temperature: f32,
    cfg_weight: f32,
    exaggeration: f32,
    repetition_penalty: f32,
    min_p: f32,
    top_p: f32,
) -> Preset {
    Preset {
        name,
        temperature,
        cfg_weight,
        exaggeration,
        repetition_penalty,
        min_p,
        top_p,
    }
}

pub const PRESETS: &[Preset] = &[
    preset("Neutral (Default)", 0.8, 0.5, 0.5, 1.2, 0.05, 1.0),
    preset("Expressive", 1.0, 0.6, 0.8, 1.1, 0.08, 0.95),
    preset("Very Expressive (Theatrical)", 1.2, 0.5, 1.0, 1.0, 0.10, 0.90),
    preset("Stable (Monotone)", 0.5, 0.7, 0.3, 1.5, 0.02, 1.0),
    preset("News Anchor", 0.6, 0.7, 0.4, 1.4, 0.03, 0.98),
    preset("Audiobook", 0.7, 0.6, 0.6, 1.3, 0.05, 0.98),
    preset("Audiobook (Dramatic)", 0.9, 0.55, 0.75, 1.2, 0.06, 0.95),
    preset("Podcast", 0.9, 0.5, 0.7, 1.2, 0.06, 0.95),
    preset("Conversational", 0.85, 0.5, 0.65, 1.1, 0.05, 0.95),
    preset("Documentary", 0.65, 0.65, 0.5, 1.35, 0.04, 0.98),
    preset("Advertisement", 0.95, 0.55, 0.85, 1.15, 0.07, 0.92),
    preset("Meditation/Calm", 0.4, 0.75, 0.25, 1.6, 0.02, 1.0),
    preset("Tutorial/Educational", 0.7, 0.6, 0.55, 1.3, 0.04, 0.97),
    preset("Sports Commentary", 1.1, 0.5, 0.9, 1.0, 0.08, 0.90),
    preset("Character Voice", 1.0, 0.45, 0.95, 1.1, 0.09, 0.88),
];

impl Preset {
    /// Apply the preset on top of `base`, keeping its language.
    pub fn apply(&self, base: &GenerationParams) -> GenerationParams {
        GenerationParams {
            language_id: base.language_id.clone(),
            temperature: self.temperature,
            cfg_weight: self.cfg_weight,
            exaggeration: self.exaggeration,
            repetition_penalty: self.repetition_penalty,
            min_p: self.min_p,
            top_p: self.top_p,
        }
    }
}

/// Case-insensitive lookup.
pub fn find_preset(name: &str) -> Result<&'static Preset, ParamError> {
    let wanted = name.trim();
    PRESETS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| ParamError::UnknownPreset(name.to_string()))
}

pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|p| p.name).collect()
}
