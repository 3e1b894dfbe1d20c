//! Locating and running the FFmpeg tools.
//!
//! FFmpeg is optional: without it MP3 encoding is skipped and only WAV
//! reference audio at the target sample rate can be used.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Paths to the FFmpeg executables, if found.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTools {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
}

impl FfmpegTools {
    /// Find ffmpeg and ffprobe, preferring a configured ffmpeg path and
    /// falling back to `PATH`.
    pub fn locate(configured: Option<&Path>) -> Self {
        let ffmpeg = configured
            .filter(|p| p.exists())
            .map(Path::to_path_buf)
            .or_else(|| which::which("ffmpeg").ok());

        // Prefer the ffprobe shipped next to the chosen ffmpeg
        let ffprobe = ffmpeg
            .as_ref()
            .and_then(|p| p.parent())
            .map(|dir| dir.join(ffprobe_name()))
            .filter(|p| p.exists())
            .or_else(|| which::which("ffprobe").ok());

        debug!("ffmpeg: {:?}, ffprobe: {:?}", ffmpeg, ffprobe);
        Self { ffmpeg, ffprobe }
    }

    /// Tools with nothing available.
    #[cfg(test)]
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ffmpeg_path(&self) -> Option<&Path> {
        self.ffmpeg.as_deref()
    }

    /// Check if FFmpeg is available.
    pub fn is_ffmpeg_available(&self) -> bool {
        self.ffmpeg.is_some()
    }

    /// Check if FFprobe is available.
    pub fn is_ffprobe_available(&self) -> bool {
        self.ffprobe.is_some()
    }

    fn ffmpeg_command(&self) -> Result<Command> {
        let path = self
            .ffmpeg
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("ffmpeg not found"))?;
        Ok(Command::new(path))
    }

    /// Get duration of an audio file in seconds using ffprobe.
    pub fn duration_secs(&self, audio_path: &Path) -> Result<f64> {
        let ffprobe = self
            .ffprobe
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("ffprobe not found"))?;

        let output = Command::new(ffprobe)
            .args([
                "-v",
                "quiet",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(audio_path)
            .output()
            .context("Failed to run ffprobe")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffprobe failed: {}", stderr);
        }

        let duration_str = String::from_utf8_lossy(&output.stdout);
        duration_str
            .trim()
            .parse()
            .context("Failed to parse duration")
    }

    /// Decode any supported audio file to mono WAV at `sample_rate`.
    pub fn transcode_to_wav(&self, input: &Path, output: &Path, sample_rate: u32) -> Result<()> {
        let output_status = self
            .ffmpeg_command()?
            .args(["-y", "-v", "error", "-i"])
            .arg(input)
            .args(["-vn", "-ac", "1", "-ar"])
            .arg(sample_rate.to_string())
            .args(["-c:a", "pcm_f32le", "-f", "wav"])
            .arg(output)
            .output()
            .context("Failed to run ffmpeg")?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            anyhow::bail!("ffmpeg decode of {} failed: {}", input.display(), stderr.trim());
        }

        Ok(())
    }

    /// Encode a WAV file to MP3 with libmp3lame.
    pub fn encode_mp3(&self, input: &Path, output: &Path, bitrate: &str) -> Result<()> {
        let output_status = self
            .ffmpeg_command()?
            .arg("-i")
            .arg(input)
            .args(["-vn", "-acodec", "libmp3lame", "-b:a", bitrate, "-y"])
            .arg(output)
            .output()
            .context("Failed to run ffmpeg")?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            anyhow::bail!("ffmpeg MP3 encoding failed: {}", stderr.trim());
        }

        Ok(())
    }
}

fn ffprobe_name() -> &'static str {
    if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_does_not_panic() {
        // Result depends on the machine; only check consistency
        let tools = FfmpegTools::locate(None);
        assert_eq!(tools.is_ffmpeg_available(), tools.ffmpeg_path().is_some());
    }

    #[test]
    fn test_missing_configured_path_is_ignored() {
        let tools = FfmpegTools::locate(Some(Path::new("/definitely/not/here/ffmpeg")));
        if let Some(path) = tools.ffmpeg_path() {
            assert_ne!(path, Path::new("/definitely/not/here/ffmpeg"));
        }
    }

    #[test]
    fn test_none_reports_unavailable() {
        let tools = FfmpegTools::none();
        assert!(!tools.is_ffmpeg_available());
        assert!(!tools.is_ffprobe_available());
        let err = tools
            .encode_mp3(Path::new("a.wav"), Path::new("a.mp3"), "192k")
            .unwrap_err();
        assert!(err.to_string().contains("ffmpeg not found"));
        assert!(tools.duration_secs(Path::new("a.wav")).is_err());
    }
}
