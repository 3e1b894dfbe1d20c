//! Voice library: one directory of reference audio per voice.

use super::{is_audio_file, is_plain_name, sanitize_filename, MAX_AUDIO_FILE_BYTES};
use crate::audio::wav::wav_duration_secs;
use crate::audio::FfmpegTools;
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a voice cannot be used.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Voice '{0}' not found")]
    NotFound(String),

    #[error("Invalid voice name '{0}'")]
    InvalidName(String),

    #[error("No audio files found for voice '{name}' in {}", dir.display())]
    NoAudio { name: String, dir: PathBuf },

    #[error("Failed to read voice directory {}: {message}", dir.display())]
    Io { dir: PathBuf, message: String },
}

/// A validated voice and its reference files in name order.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub name: String,
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct VoiceFile {
    pub name: String,
    pub size_bytes: u64,
    /// Unknown when the file could not be probed
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct VoiceDetails {
    pub name: String,
    pub files: Vec<VoiceFile>,
}

impl VoiceDetails {
    pub fn total_duration_secs(&self) -> f64 {
        self.files.iter().filter_map(|f| f.duration_secs).sum()
    }
}

/// Check an audio file before adding it to a voice.
pub fn validate_audio_file(path: &Path) -> Result<()> {
    if !is_audio_file(path) {
        anyhow::bail!(
            "Invalid audio format for {}. Allowed: {}",
            path.display(),
            super::AUDIO_EXTENSIONS.join(", ")
        );
    }
    let size = fs::metadata(path)
        .with_context(|| format!("Cannot read {}", path.display()))?
        .len();
    if size > MAX_AUDIO_FILE_BYTES {
        anyhow::bail!("Audio file too large (max 50MB): {}", path.display());
    }
    Ok(())
}

fn audio_files_in(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_audio_file(p))
        .collect();
    files.sort();
    Ok(files)
}

fn probe_duration(path: &Path, ffmpeg: &FfmpegTools) -> Option<f64> {
    if ffmpeg.is_ffprobe_available() {
        if let Ok(secs) = ffmpeg.duration_secs(path) {
            return Some(secs);
        }
    }
    wav_duration_secs(path).ok()
}

/// Voices stored under one root directory.
#[derive(Debug, Clone)]
pub struct VoiceLibrary {
    root: PathBuf,
}

impl VoiceLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Voice names, sorted. Hidden directories are ignored.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read {}", self.root.display()))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(String::from))
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Directory of an existing voice. Names must not leave the root.
    fn voice_dir(&self, name: &str) -> Result<PathBuf, VoiceError> {
        if !is_plain_name(name) || name.starts_with('.') {
            return Err(VoiceError::InvalidName(name.to_string()));
        }
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Err(VoiceError::NotFound(name.to_string()));
        }
        Ok(dir)
    }

    /// Look up a voice and make sure it has reference audio.
    pub fn resolve(&self, name: &str) -> Result<Voice, VoiceError> {
        let dir = self.voice_dir(name)?;

        let files = audio_files_in(&dir).map_err(|e| VoiceError::Io {
            dir: dir.clone(),
            message: e.to_string(),
        })?;
        if files.is_empty() {
            return Err(VoiceError::NoAudio {
                name: name.to_string(),
                dir,
            });
        }

        debug!("Voice '{}' has {} reference files", name, files.len());
        Ok(Voice {
            name: name.to_string(),
            dir,
            files,
        })
    }

    /// Per-file sizes and durations.
    pub fn details(&self, name: &str, ffmpeg: &FfmpegTools) -> Result<VoiceDetails> {
        let voice = self.resolve(name)?;
        let files = voice
            .files
            .iter()
            .map(|path| VoiceFile {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size_bytes: fs::metadata(path).map(|m| m.len()).unwrap_or(0),
                duration_secs: probe_duration(path, ffmpeg),
            })
            .collect();

        Ok(VoiceDetails {
            name: voice.name,
            files,
        })
    }

    /// Create a new voice from audio files. Fails if the voice exists.
    pub fn create(&self, name: &str, sources: &[PathBuf]) -> Result<Voice> {
        let name = sanitize_filename(name);
        if sources.is_empty() {
            anyhow::bail!("At least one audio file is required");
        }
        for source in sources {
            validate_audio_file(source)?;
        }

        let dir = self.root.join(&name);
        if dir.exists() {
            anyhow::bail!("Voice '{}' already exists", name);
        }
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        copy_into(&dir, sources)?;
        info!("Created voice '{}' with {} files", name, sources.len());
        Ok(self.resolve(&name)?)
    }

    /// Copy more audio files into an existing voice. Returns the number of
    /// files added.
    pub fn add_audio(&self, name: &str, sources: &[PathBuf]) -> Result<usize> {
        let dir = self.voice_dir(name)?;
        for source in sources {
            validate_audio_file(source)?;
        }
        copy_into(&dir, sources)?;
        info!("Added {} files to voice '{}'", sources.len(), name);
        Ok(sources.len())
    }

    /// Remove a voice and all its audio.
    pub fn delete(&self, name: &str) -> Result<()> {
        let dir = self.voice_dir(name)?;
        fs::remove_dir_all(&dir).with_context(|| format!("Failed to delete {}", dir.display()))?;
        info!("Deleted voice '{}'", name);
        Ok(())
    }
}

fn copy_into(dir: &Path, sources: &[PathBuf]) -> Result<()> {
    for source in sources {
        let file_name = source
            .file_name()
            .map(|n| sanitize_filename(&n.to_string_lossy()))
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", source.display()))?;
        let dest = dir.join(file_name);
        fs::copy(source, &dest)
            .with_context(|| format!("Failed to copy {} to {}", source.display(), dest.display()))?;
    }
    Ok(())
}
