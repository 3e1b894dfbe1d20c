//! Speech model trait, the shared model handle, and generation parameters.

pub mod chatterbox;
#[cfg(test)]
pub mod mock;
pub mod params;
pub mod presets;

pub use params::GenerationParams;
pub use presets::{find_preset, preset_names, DEFAULT_PRESET, PRESETS};

use crate::audio::Waveform;
use crate::error::SynthesisError;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A text-to-speech model. Every engine implements this.
#[async_trait]
pub trait SpeechModel: Send + Sync {
    /// Synthesize `text` in the voice of `reference_audio`.
    async fn synthesize(
        &self,
        text: &str,
        reference_audio: &Path,
        params: &GenerationParams,
    ) -> Result<Waveform, SynthesisError>;

    /// Output sample rate.
    fn sample_rate(&self) -> u32;

    /// Device being used (mps, cuda, cpu).
    fn device(&self) -> &str;
}

/// Shared, owned access to the loaded model.
///
/// Cloning is cheap. All clones share one gate, so at most one synthesis
/// call runs at a time however many callers hold a handle.
#[derive(Clone)]
pub struct ModelHandle {
    model: Arc<dyn SpeechModel>,
    gate: Arc<Mutex<()>>,
}

impl ModelHandle {
    pub fn new(model: Arc<dyn SpeechModel>) -> Self {
        Self {
            model,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Run one synthesis call, waiting for any call already in flight.
    pub async fn synthesize(
        &self,
        text: &str,
        reference_audio: &Path,
        params: &GenerationParams,
    ) -> Result<Waveform, SynthesisError> {
        let _permit = self.gate.lock().await;
        debug!("Synthesizing {} chars", text.chars().count());
        let wave = self.model.synthesize(text, reference_audio, params).await?;
        if wave.is_empty() {
            return Err(SynthesisError::EmptyOutput);
        }
        Ok(wave)
    }

    pub fn sample_rate(&self) -> u32 {
        self.model.sample_rate()
    }

    pub fn device(&self) -> &str {
        self.model.device()
    }
}

/// Load the Chatterbox Multilingual model.
///
/// # Arguments
/// * `device` - "mps", "cuda", "cpu", or None for auto-detect
/// * `site_packages` - Extra Python path holding the chatterbox install
pub fn create_backend(device: Option<&str>, site_packages: Option<&Path>) -> Result<ModelHandle> {
    let backend = chatterbox::ChatterboxBackend::load(device, site_packages)?;
    Ok(ModelHandle::new(Arc::new(backend)))
}
