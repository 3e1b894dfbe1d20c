//! tts-studio configuration management.

use crate::audio::encoder::DEFAULT_BITRATE;
use crate::audio::reference::REFERENCE_SAMPLE_RATE;
use crate::queue::DEFAULT_BACKLOG;
use crate::synth::ChunkFailurePolicy;
use crate::text::{SplitStrategy, DEFAULT_MAX_CHARS, LONG_TEXT_THRESHOLD};
use crate::tts::GenerationParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Base directory for libraries and outputs when none is configured.
fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("tts-studio"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_voices_dir() -> PathBuf {
    data_dir().join("voices")
}

fn default_texts_dir() -> PathBuf {
    data_dir().join("texts")
}

fn default_output_dir() -> PathBuf {
    data_dir().join("output")
}

fn default_sample_rate() -> u32 {
    REFERENCE_SAMPLE_RATE
}

fn default_bitrate() -> String {
    DEFAULT_BITRATE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_threshold() -> usize {
    LONG_TEXT_THRESHOLD
}

fn default_backlog() -> usize {
    DEFAULT_BACKLOG
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudioConfig {
    /// One subdirectory of reference audio per voice
    #[serde(default = "default_voices_dir")]
    pub voices_dir: PathBuf,

    /// Flat directory of .txt files
    #[serde(default = "default_texts_dir")]
    pub texts_dir: PathBuf,

    /// Root for wav/, mp3/, history and summaries
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Sample rate the reference audio is prepared at
    #[serde(default = "default_sample_rate")]
    pub reference_sample_rate: u32,

    #[serde(default = "default_bitrate")]
    pub mp3_bitrate: String,

    /// Delete chunk files after they are combined
    #[serde(default = "default_true")]
    pub cleanup_chunks: bool,

    /// Chunk size limit in characters
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Texts longer than this are chunked
    #[serde(default = "default_threshold")]
    pub long_text_threshold: usize,

    #[serde(default)]
    pub split_strategy: SplitStrategy,

    #[serde(default)]
    pub failure_policy: ChunkFailurePolicy,

    /// Requests allowed to wait for the model
    #[serde(default = "default_backlog")]
    pub queue_backlog: usize,

    /// Write a summary .txt next to each output
    #[serde(default = "default_true")]
    pub write_summary: bool,

    /// Explicit ffmpeg binary; otherwise looked up on PATH
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Device to use (mps, cuda, cpu). None means auto-detect.
    #[serde(default)]
    pub device: Option<String>,

    /// Extra Python path holding the chatterbox install
    #[serde(default)]
    pub python_site_packages: Option<PathBuf>,

    /// Default generation parameters
    #[serde(default)]
    pub params: GenerationParams,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            voices_dir: default_voices_dir(),
            texts_dir: default_texts_dir(),
            output_dir: default_output_dir(),
            reference_sample_rate: default_sample_rate(),
            mp3_bitrate: default_bitrate(),
            cleanup_chunks: true,
            max_chars: default_max_chars(),
            long_text_threshold: default_threshold(),
            split_strategy: SplitStrategy::default(),
            failure_policy: ChunkFailurePolicy::default(),
            queue_backlog: default_backlog(),
            write_summary: true,
            ffmpeg_path: None,
            device: None,
            python_site_packages: None,
            params: GenerationParams::default(),
        }
    }
}

impl StudioConfig {
    /// Get the config file path: {config_dir}/tts-studio/config.toml
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tts-studio")
            .join("config.toml")
    }

    /// Load config from the default location, returning defaults if the
    /// file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: StudioConfig =
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Reject settings that would make generation fail later.
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.max_chars == 0 {
            anyhow::bail!("max_chars must be at least 1");
        }
        if self.reference_sample_rate == 0 {
            anyhow::bail!("reference_sample_rate must be positive");
        }
        if self.queue_backlog == 0 {
            anyhow::bail!("queue_backlog must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = StudioConfig::default();
        assert_eq!(config.reference_sample_rate, 24_000);
        assert_eq!(config.mp3_bitrate, "192k");
        assert!(config.cleanup_chunks);
        assert_eq!(config.max_chars, 500);
        assert_eq!(config.long_text_threshold, 500);
        assert_eq!(config.split_strategy, SplitStrategy::Sentences);
        assert_eq!(config.failure_policy, ChunkFailurePolicy::Skip);
        assert_eq!(config.queue_backlog, 50);
        assert!(config.device.is_none());
        assert_eq!(config.params, GenerationParams::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        assert!(StudioConfig::config_path().ends_with("tts-studio/config.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
voices_dir = "/data/voices"
output_dir = "/data/out"
cleanup_chunks = false
split_strategy = "paragraphs"
failure_policy = "silence"
device = "mps"

[params]
language_id = "en"
exaggeration = 1.1
"#;
        let config: StudioConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.voices_dir, PathBuf::from("/data/voices"));
        assert_eq!(config.output_dir, PathBuf::from("/data/out"));
        assert!(!config.cleanup_chunks);
        assert_eq!(config.split_strategy, SplitStrategy::Paragraphs);
        assert_eq!(config.failure_policy, ChunkFailurePolicy::Silence);
        assert_eq!(config.device.as_deref(), Some("mps"));
        assert_eq!(config.params.language_id, "en");
        assert_eq!(config.params.exaggeration, 1.1);
        assert_eq!(config.params.temperature, 0.8);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: StudioConfig = toml::from_str("").unwrap();
        assert_eq!(config, StudioConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = StudioConfig::default();
        config.mp3_bitrate = "128k".to_string();
        config.params = config.params.with_language("de");
        config.save_to(&path).unwrap();

        assert_eq!(StudioConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_not_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = StudioConfig::default();
        config.params.language_id = "xx".to_string();
        assert!(config.save_to(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = StudioConfig::load_from(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config.max_chars, 500);
    }
}
