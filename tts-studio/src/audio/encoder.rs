//! Compressed output: WAV to MP3 through FFmpeg.

use super::FfmpegTools;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Default MP3 bitrate.
pub const DEFAULT_BITRATE: &str = "192k";

/// Outcome of the encode step. A skipped encode never fails a generation;
/// the WAV output stays valid.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeStatus {
    Encoded(PathBuf),
    Skipped(String),
}

impl EncodeStatus {
    pub fn path(&self) -> Option<&Path> {
        match self {
            EncodeStatus::Encoded(p) => Some(p),
            EncodeStatus::Skipped(_) => None,
        }
    }
}

/// MP3 encoder backed by the ffmpeg executable.
#[derive(Debug, Clone)]
pub struct Mp3Encoder {
    tools: FfmpegTools,
    bitrate: String,
}

impl Mp3Encoder {
    pub fn new(tools: FfmpegTools, bitrate: impl Into<String>) -> Self {
        Self {
            tools,
            bitrate: bitrate.into(),
        }
    }

    /// Encode `wav_path` to `mp3_path`.
    pub fn encode(&self, wav_path: &Path, mp3_path: &Path) -> EncodeStatus {
        if !self.tools.is_ffmpeg_available() {
            warn!("ffmpeg not installed - MP3 conversion skipped, the WAV file is ready to use");
            return EncodeStatus::Skipped("ffmpeg not installed".to_string());
        }

        if let Some(parent) = mp3_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Could not create {}: {}", parent.display(), e);
                return EncodeStatus::Skipped(e.to_string());
            }
        }

        match self.tools.encode_mp3(wav_path, mp3_path, &self.bitrate) {
            Ok(()) => {
                info!("MP3 file saved: {}", mp3_path.display());
                EncodeStatus::Encoded(mp3_path.to_path_buf())
            }
            Err(e) => {
                warn!("MP3 conversion failed, the WAV file is available: {:#}", e);
                EncodeStatus::Skipped(format!("{:#}", e))
            }
        }
    }
}
