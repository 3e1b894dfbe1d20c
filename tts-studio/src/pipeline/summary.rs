//! Plain-text generation summary written next to the outputs.

use super::{GenerationMode, GenerationReport};
use crate::tts::GenerationParams;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Render the summary text.
pub fn render(report: &GenerationReport, params: &GenerationParams) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "CHATTERBOX TTS - Generation Summary");
    let _ = writeln!(out, "{}\n", rule);

    let _ = writeln!(out, "Voice: {}", report.voice);
    let _ = writeln!(out, "Text: {}", report.text_source);
    let _ = writeln!(out, "Text length: {} characters", report.text_length);
    let _ = writeln!(out, "Processing mode: {}", report.mode);
    if report.mode == GenerationMode::Chunked {
        let _ = writeln!(out, "Number of chunks: {}", report.chunk_count);
        if !report.failed_chunks.is_empty() {
            let failed: Vec<String> = report.failed_chunks.iter().map(|i| i.to_string()).collect();
            let _ = writeln!(out, "Failed chunks: {}", failed.join(", "));
        }
    }

    let _ = writeln!(out, "\nGeneration Parameters:");
    let _ = writeln!(out, "  Language: {}", params.language_id);
    let _ = writeln!(out, "  Temperature: {}", params.temperature);
    let _ = writeln!(out, "  CFG Weight: {}", params.cfg_weight);
    let _ = writeln!(out, "  Exaggeration: {}", params.exaggeration);
    let _ = writeln!(out, "  Repetition Penalty: {}", params.repetition_penalty);
    let _ = writeln!(out, "  Min P: {}", params.min_p);
    let _ = writeln!(out, "  Top P: {}", params.top_p);

    let _ = writeln!(out, "\nGenerated Files:");
    let _ = writeln!(out, "  WAV: {}", file_name(&report.wav_path));
    if let Some(mp3) = &report.mp3_path {
        let _ = writeln!(out, "  MP3: {}", file_name(mp3));
    }

    out
}

/// Write the summary to `path`.
pub fn write_summary(path: &Path, report: &GenerationReport, params: &GenerationParams) -> Result<()> {
    fs::write(path, render(report, params))
        .with_context(|| format!("Failed to write summary {}", path.display()))
}
