//! Chatterbox Multilingual backend using PyO3 to embed Python.
//!
//! The model is loaded once and kept alive for the life of the process.
//! Each call runs on a blocking thread so the tokio runtime stays
//! responsive while the GIL is held.

use super::{GenerationParams, SpeechModel};
use crate::audio::Waveform;
use crate::error::SynthesisError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::Path;
use std::sync::{Arc, Once};

/// Initialize Python runtime once.
static PYTHON_INIT: Once = Once::new();

/// Devices the model can run on.
pub const DEVICES: &[&str] = &["mps", "cuda", "cpu"];

/// Normalize a user supplied device name. Unknown names yield `None`, which
/// means auto-detect.
pub fn normalize_device(device: &str) -> Option<&'static str> {
    let wanted = device.trim().to_ascii_lowercase();
    DEVICES.iter().copied().find(|d| *d == wanted)
}

struct LoadedModel {
    model: Py<PyAny>,
    device: String,
    sample_rate: u32,
}

/// Chatterbox Multilingual TTS using PyO3.
pub struct ChatterboxBackend {
    inner: Arc<LoadedModel>,
}

impl ChatterboxBackend {
    /// Load the model.
    ///
    /// # Arguments
    /// * `device` - "mps", "cuda", "cpu", or None for auto-detect
    /// * `site_packages` - Optional path added to `sys.path` first
    pub fn load(device: Option<&str>, site_packages: Option<&Path>) -> Result<Self> {
        let site_packages = site_packages.map(Path::to_path_buf);
        PYTHON_INIT.call_once(|| {
            pyo3::prepare_freethreaded_python();

            if let Some(site_packages) = site_packages.filter(|p| p.exists()) {
                let added = Python::with_gil(|py| -> PyResult<()> {
                    let sys = py.import("sys")?;
                    let path = sys.getattr("path")?;
                    path.call_method1("insert", (0, site_packages.to_string_lossy().as_ref()))?;
                    Ok(())
                });
                if let Err(e) = added {
                    warn!("Could not add {} to sys.path: {}", site_packages.display(), e);
                }
            }
        });

        let device = match device {
            Some(d) => match normalize_device(d) {
                Some(d) => d.to_string(),
                None => {
                    warn!("Unknown device '{}', auto-detecting", d);
                    Self::detect_device()?
                }
            },
            None => Self::detect_device()?,
        };

        info!("Loading Chatterbox Multilingual on {}...", device);

        let (model, sample_rate) = Python::with_gil(|py| -> Result<(Py<PyAny>, u32)> {
            // Enable MPS fallback
            let os = py.import("os")?;
            let environ = os.getattr("environ")?;
            environ.set_item("PYTORCH_ENABLE_MPS_FALLBACK", "1")?;

            let mtl_tts = py
                .import("chatterbox.mtl_tts")
                .context("Failed to import chatterbox.mtl_tts; is chatterbox-tts installed?")?;
            let class = mtl_tts.getattr("ChatterboxMultilingualTTS")?;

            let kwargs = PyDict::new(py);
            kwargs.set_item("device", &device)?;
            let model = class
                .call_method("from_pretrained", (), Some(&kwargs))
                .context("Failed to load Chatterbox Multilingual")?;

            let sample_rate: u32 = model.getattr("sr")?.extract()?;
            Ok((model.unbind(), sample_rate))
        })?;

        info!("Model loaded ({} Hz)", sample_rate);

        Ok(Self {
            inner: Arc::new(LoadedModel {
                model,
                device,
                sample_rate,
            }),
        })
    }

    /// Auto-detect the best available device.
    fn detect_device() -> Result<String> {
        Python::with_gil(|py| {
            let torch = py.import("torch").context("Failed to import torch")?;

            // Check MPS (Apple Silicon)
            let backends = torch.getattr("backends")?;
            let mps = backends.getattr("mps")?;
            if mps.call_method0("is_available")?.extract::<bool>()? {
                return Ok("mps".to_string());
            }

            let cuda = torch.getattr("cuda")?;
            if cuda.call_method0("is_available")?.extract::<bool>()? {
                return Ok("cuda".to_string());
            }

            Ok("cpu".to_string())
        })
    }
}

impl LoadedModel {
    fn generate_sync(
        &self,
        text: &str,
        reference_audio: &Path,
        params: &GenerationParams,
    ) -> PyResult<Vec<f32>> {
        Python::with_gil(|py| {
            let kwargs = PyDict::new(py);
            kwargs.set_item("language_id", &params.language_id)?;
            kwargs.set_item("audio_prompt_path", reference_audio.to_string_lossy().as_ref())?;
            kwargs.set_item("temperature", params.temperature)?;
            kwargs.set_item("cfg_weight", params.cfg_weight)?;
            kwargs.set_item("exaggeration", params.exaggeration)?;
            kwargs.set_item("repetition_penalty", params.repetition_penalty)?;
            kwargs.set_item("min_p", params.min_p)?;
            kwargs.set_item("top_p", params.top_p)?;

            let wav = self
                .model
                .bind(py)
                .call_method("generate", (text,), Some(&kwargs))?;

            // Tensor of shape (1, n) or (n,) -> flat list of floats
            let samples: Vec<f32> = wav
                .call_method0("detach")?
                .call_method0("cpu")?
                .call_method0("numpy")?
                .call_method1("reshape", (-1,))?
                .call_method1("astype", ("float32",))?
                .call_method0("tolist")?
                .extract()?;

            Ok(keep_after_cleanup(samples, self.cleanup_memory(py)))
        })
    }

    /// Cleanup GPU memory to mitigate leaks.
    fn cleanup_memory(&self, py: Python<'_>) -> PyResult<()> {
        let gc = py.import("gc")?;
        gc.call_method0("collect")?;

        if self.device == "mps" {
            let torch = py.import("torch")?;
            let mps = torch.getattr("mps")?;
            if mps.hasattr("empty_cache")? {
                mps.call_method0("empty_cache")?;
            }
        } else if self.device == "cuda" {
            let torch = py.import("torch")?;
            torch.getattr("cuda")?.call_method0("empty_cache")?;
        }

        Ok(())
    }
}

/// Generated audio outlives a failed cache cleanup.
fn keep_after_cleanup<E: std::fmt::Display>(samples: Vec<f32>, cleanup: Result<(), E>) -> Vec<f32> {
    if let Err(e) = cleanup {
        warn!("GPU memory cleanup failed: {}", e);
    }
    samples
}

#[async_trait]
impl SpeechModel for ChatterboxBackend {
    async fn synthesize(
        &self,
        text: &str,
        reference_audio: &Path,
        params: &GenerationParams,
    ) -> Result<Waveform, SynthesisError> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        let reference_audio = reference_audio.to_path_buf();
        let params = params.clone();

        // Run in a blocking task to not block the tokio runtime
        let samples = tokio::task::spawn_blocking(move || {
            inner.generate_sync(&text, &reference_audio, &params)
        })
        .await
        .map_err(|e| SynthesisError::Task(e.to_string()))?
        .map_err(|e| SynthesisError::Model(e.to_string()))?;

        debug!("Generated {} samples", samples.len());
        Ok(Waveform::new(samples, self.inner.sample_rate))
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    fn device(&self) -> &str {
        &self.inner.device
    }
}
