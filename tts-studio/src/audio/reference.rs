//! Reference audio preparation: one combined prompt file per voice.
//!
//! All files of a voice are decoded at the reference sample rate and
//! concatenated in name order. The result is cached next to the outputs and
//! reused while the voice directory is unchanged.

use super::wav::{read_wav, write_wav};
use super::{FfmpegTools, Waveform};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Reference sample rate expected by the model.
pub const REFERENCE_SAMPLE_RATE: u32 = 24_000;

/// Prepared reference audio for one voice.
#[derive(Debug, Clone)]
pub struct ReferenceAudio {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub from_cache: bool,
}

/// Location of the cached combined prompt for `voice`.
pub fn reference_path(output_dir: &Path, voice: &str) -> PathBuf {
    output_dir.join(format!("{}_combined_voice.wav", voice))
}

fn fingerprint_path(reference: &Path) -> PathBuf {
    reference.with_extension("sha256")
}

/// Hash of file names, sizes and modification times.
fn fingerprint(files: &[PathBuf], sample_rate: u32) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(sample_rate.to_le_bytes());
    for file in files {
        let meta = fs::metadata(file)
            .with_context(|| format!("Failed to stat {}", file.display()))?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        hasher.update(name.as_bytes());
        hasher.update([0]);
        hasher.update(meta.len().to_le_bytes());
        hasher.update(mtime.to_le_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn load_at_rate(
    file: &Path,
    sample_rate: u32,
    ffmpeg: &FfmpegTools,
    scratch_dir: &Path,
) -> Result<Waveform> {
    let is_wav = file
        .extension()
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    if is_wav {
        if let Ok(wave) = read_wav(file) {
            if wave.sample_rate == sample_rate {
                return Ok(wave);
            }
            debug!(
                "{} is {} Hz, resampling to {} Hz",
                file.display(),
                wave.sample_rate,
                sample_rate
            );
        }
    }

    if !ffmpeg.is_ffmpeg_available() {
        anyhow::bail!("ffmpeg is required to decode {}", file.display());
    }

    let scratch = tempfile::Builder::new()
        .prefix(".ref-")
        .suffix(".wav")
        .tempfile_in(scratch_dir)
        .context("Failed to create scratch file")?;
    ffmpeg.transcode_to_wav(file, scratch.path(), sample_rate)?;
    read_wav(scratch.path())
}

/// Build (or reuse) the combined reference file for `voice`.
///
/// `files` must be the voice's audio files in name order. Files that cannot
/// be decoded are skipped with a warning; if none load, this fails.
pub fn prepare_reference(
    voice: &str,
    files: &[PathBuf],
    output_dir: &Path,
    sample_rate: u32,
    ffmpeg: &FfmpegTools,
) -> Result<ReferenceAudio> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let path = reference_path(output_dir, voice);
    let sidecar = fingerprint_path(&path);
    let digest = fingerprint(files, sample_rate)?;

    if path.exists() {
        let cached = fs::read_to_string(&sidecar).unwrap_or_default();
        if cached.trim() == digest {
            if let Ok(duration_secs) = super::wav::wav_duration_secs(&path) {
                debug!("Reusing cached reference audio {}", path.display());
                return Ok(ReferenceAudio {
                    path,
                    duration_secs,
                    from_cache: true,
                });
            }
        }
    }

    info!("Preparing reference audio for '{}' from {} files", voice, files.len());

    let mut samples = Vec::new();
    for file in files {
        match load_at_rate(file, sample_rate, ffmpeg, output_dir) {
            Ok(wave) => {
                debug!("Loaded {} ({:.2}s)", file.display(), wave.duration_secs());
                samples.extend_from_slice(&wave.samples);
            }
            Err(e) => warn!("Skipping {}: {:#}", file.display(), e),
        }
    }

    if samples.is_empty() {
        anyhow::bail!("No reference audio could be loaded for voice '{}'", voice);
    }

    let combined = Waveform::new(samples, sample_rate);
    write_wav(&path, &combined)?;
    fs::write(&sidecar, &digest)
        .with_context(|| format!("Failed to write {}", sidecar.display()))?;

    info!(
        "Reference audio saved: {} ({:.2}s)",
        path.display(),
        combined.duration_secs()
    );

    Ok(ReferenceAudio {
        path,
        duration_secs: combined.duration_secs(),
        from_cache: false,
    })
}
