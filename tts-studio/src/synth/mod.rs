//! Sequential per-chunk synthesis.
//!
//! Every chunk gets exactly one model call and one explicit outcome. A
//! failing chunk is logged and recorded, never retried, and the loop moves
//! on to the next one unless the policy says to abort.

use crate::audio::wav::write_wav;
use crate::audio::{Segment, Waveform};
use crate::error::SynthesisError;
use crate::text::TextChunk;
use crate::tts::{GenerationParams, ModelHandle};
use clap::ValueEnum;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Seconds per character used for silent placeholders when no chunk in
/// the run succeeded.
pub const FALLBACK_SECS_PER_CHAR: f64 = 0.065;

/// What to do with chunks whose synthesis failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChunkFailurePolicy {
    /// Leave the chunk out of the combined audio
    #[default]
    Skip,
    /// Put silence of the estimated length in its place
    Silence,
    /// Fail the whole generation
    Abort,
}

impl fmt::Display for ChunkFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkFailurePolicy::Skip => write!(f, "skip"),
            ChunkFailurePolicy::Silence => write!(f, "silence"),
            ChunkFailurePolicy::Abort => write!(f, "abort"),
        }
    }
}

/// Audio produced for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedChunk {
    pub segment: Segment,
    pub duration_secs: f64,
}

/// Outcome of one chunk.
#[derive(Debug)]
pub struct ChunkOutcome {
    /// 1-based chunk index
    pub index: usize,
    pub char_len: usize,
    pub result: Result<SynthesizedChunk, SynthesisError>,
}

impl ChunkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// The first failed chunk under [`ChunkFailurePolicy::Abort`].
#[derive(Debug)]
pub struct AbortedChunk {
    pub index: usize,
    pub error: SynthesisError,
}

/// Chunk file name: `{base}_chunkNNN.wav`.
pub fn chunk_filename(base: &str, index: usize) -> String {
    format!("{}_chunk{:03}.wav", base, index)
}

/// Where the chunk audio of a run goes.
#[derive(Debug, Clone)]
pub struct ChunkSink {
    pub dir: PathBuf,
    pub base: String,
}

impl ChunkSink {
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: base.into(),
        }
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.dir.join(chunk_filename(&self.base, index))
    }
}

fn save_chunk(path: &Path, wave: &Waveform) -> Result<SynthesizedChunk, SynthesisError> {
    write_wav(path, wave).map_err(|e| SynthesisError::Save {
        path: path.to_path_buf(),
        message: format!("{:#}", e),
    })?;
    Ok(SynthesizedChunk {
        segment: Segment::File(path.to_path_buf()),
        duration_secs: wave.duration_secs(),
    })
}

/// Synthesize `chunks` one after another.
///
/// `on_chunk` is called after every chunk with the outcome and the total
/// chunk count. With [`ChunkFailurePolicy::Abort`] the loop stops at the
/// first failure, so later chunks have no outcome.
pub async fn synthesize_chunks<F>(
    model: &ModelHandle,
    chunks: &[TextChunk],
    reference_audio: &Path,
    params: &GenerationParams,
    sink: &ChunkSink,
    policy: ChunkFailurePolicy,
    mut on_chunk: F,
) -> Vec<ChunkOutcome>
where
    F: FnMut(&ChunkOutcome, usize),
{
    let total = chunks.len();
    let mut outcomes = Vec::with_capacity(total);

    for chunk in chunks {
        let preview: String = chunk.content.chars().take(60).collect();
        info!(
            "[{}/{}] Generating chunk ({} chars): {}...",
            chunk.index,
            total,
            chunk.char_len(),
            preview
        );

        let result = match model.synthesize(&chunk.content, reference_audio, params).await {
            Ok(wave) => save_chunk(&sink.path_for(chunk.index), &wave),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            error!("Chunk {} failed: {}", chunk.index, e);
        }

        let outcome = ChunkOutcome {
            index: chunk.index,
            char_len: chunk.char_len(),
            result,
        };
        on_chunk(&outcome, total);

        let failed = !outcome.is_ok();
        outcomes.push(outcome);
        if failed && policy == ChunkFailurePolicy::Abort {
            warn!("Stopping after failed chunk {} of {}", chunk.index, total);
            break;
        }
    }

    outcomes
}

/// Successful segments, in order. Positions no longer match chunk indices.
pub fn successful_segments(outcomes: &[ChunkOutcome]) -> Vec<Segment> {
    outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(|c| c.segment.clone())
        .collect()
}

/// Indices of the chunks that failed.
pub fn failed_indices(outcomes: &[ChunkOutcome]) -> Vec<usize> {
    outcomes
        .iter()
        .filter(|o| !o.is_ok())
        .map(|o| o.index)
        .collect()
}

/// Speaking rate of the successful chunks, in seconds per character.
pub fn seconds_per_char(outcomes: &[ChunkOutcome]) -> f64 {
    let (secs, chars) = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok().map(|c| (c.duration_secs, o.char_len)))
        .fold((0.0, 0usize), |(s, n), (d, c)| (s + d, n + c));

    if chars == 0 {
        FALLBACK_SECS_PER_CHAR
    } else {
        secs / chars as f64
    }
}

/// Turn outcomes into the segments to combine.
pub fn apply_failure_policy(
    outcomes: Vec<ChunkOutcome>,
    policy: ChunkFailurePolicy,
    sample_rate: u32,
) -> Result<Vec<Segment>, AbortedChunk> {
    match policy {
        ChunkFailurePolicy::Skip => Ok(successful_segments(&outcomes)),
        ChunkFailurePolicy::Abort => {
            let mut segments = Vec::with_capacity(outcomes.len());
            for outcome in outcomes {
                match outcome.result {
                    Ok(chunk) => segments.push(chunk.segment),
                    Err(error) => {
                        return Err(AbortedChunk {
                            index: outcome.index,
                            error,
                        });
                    }
                }
            }
            Ok(segments)
        }
        ChunkFailurePolicy::Silence => {
            let rate = seconds_per_char(&outcomes);
            if outcomes.iter().all(|o| !o.is_ok()) {
                // Nothing to pad around
                return Ok(Vec::new());
            }
            Ok(outcomes
                .into_iter()
                .map(|o| match o.result {
                    Ok(chunk) => chunk.segment,
                    Err(_) => {
                        let secs = rate * o.char_len as f64;
                        info!("Chunk {} replaced by {:.1}s of silence", o.index, secs);
                        Segment::Memory(Waveform::silence(secs, sample_rate))
                    }
                })
                .collect())
        }
    }
}
