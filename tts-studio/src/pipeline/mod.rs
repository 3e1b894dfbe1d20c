//! Generation pipeline: inputs to finished WAV/MP3, one request at a time.
//!
//! Each run walks through validation, reference preparation, single-pass or
//! chunked synthesis, combining, encoding and history. Runs submitted
//! through [`Pipeline::submit`] share one [`JobQueue`].

pub mod output;
pub mod summary;

pub use output::{OutputLayout, OutputNames};

use crate::audio::reference::prepare_reference;
use crate::audio::wav::{wav_duration_secs, write_wav};
use crate::audio::{combine, Combined, EncodeStatus, FfmpegTools, Mp3Encoder, Segment};
use crate::config::StudioConfig;
use crate::error::{ParamError, QueueError, ReassemblyError, SynthesisError};
use crate::history::{HistoryStore, NewGeneration};
use crate::library::texts::text_basename;
use crate::library::{TextLibrary, VoiceLibrary};
use crate::queue::JobQueue;
use crate::synth::{
    apply_failure_policy, failed_indices, synthesize_chunks, ChunkFailurePolicy, ChunkSink,
};
use crate::text::{char_count, is_long_text, segment, SplitStrategy};
use crate::tts::{GenerationParams, ModelHandle};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Step of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queue,
    ValidateInputs,
    PrepareReferenceAudio,
    SinglePass,
    Chunked,
    Combine,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Queue => "queue",
            Stage::ValidateInputs => "validate inputs",
            Stage::PrepareReferenceAudio => "prepare reference audio",
            Stage::SinglePass => "single-pass synthesis",
            Stage::Chunked => "chunked synthesis",
            Stage::Combine => "combine",
        };
        write!(f, "{}", name)
    }
}

/// A failed generation run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Params(#[from] ParamError),

    #[error("Failed to prepare reference audio: {0}")]
    Reference(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(SynthesisError),

    #[error("Chunk {index} failed, generation aborted: {error}")]
    ChunkAborted { index: usize, error: SynthesisError },

    #[error("All {planned} chunks failed")]
    AllChunksFailed { planned: usize },

    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),
}

impl PipelineError {
    /// Step the run failed at.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Queue(_) => Stage::Queue,
            PipelineError::Validation(_) | PipelineError::Params(_) => Stage::ValidateInputs,
            PipelineError::Reference(_) => Stage::PrepareReferenceAudio,
            PipelineError::Synthesis(_) => Stage::SinglePass,
            PipelineError::ChunkAborted { .. } | PipelineError::AllChunksFailed { .. } => {
                Stage::Chunked
            }
            PipelineError::Reassembly(_) => Stage::Combine,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    SinglePass,
    Chunked,
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::SinglePass => write!(f, "single-pass"),
            GenerationMode::Chunked => write!(f, "chunked"),
        }
    }
}

/// Where the text of a request comes from.
#[derive(Debug, Clone)]
pub enum TextInput {
    /// A file in the text library
    Library(String),
    /// Text given directly, with a name for the output files
    Inline { name: String, content: String },
}

impl TextInput {
    pub fn source_name(&self) -> &str {
        match self {
            TextInput::Library(name) => name,
            TextInput::Inline { name, .. } => name,
        }
    }
}

/// One generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub voice: String,
    pub text: TextInput,
    pub params: GenerationParams,
    /// Overrides the configured split strategy
    pub strategy: Option<SplitStrategy>,
    /// Overrides the configured chunk cleanup
    pub cleanup_chunks: Option<bool>,
}

impl GenerationRequest {
    pub fn new(voice: impl Into<String>, text: TextInput, params: GenerationParams) -> Self {
        Self {
            voice: voice.into(),
            text,
            params,
            strategy: None,
            cleanup_chunks: None,
        }
    }
}

/// Progress of chunked synthesis, reported after each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub index: usize,
    pub total: usize,
    pub succeeded: bool,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub voice: String,
    pub text_source: String,
    pub text_length: usize,
    pub mode: GenerationMode,
    /// Chunks the text was split into (0 for single-pass)
    pub chunks_planned: usize,
    /// Chunks that produced audio (0 for single-pass)
    pub chunk_count: usize,
    pub failed_chunks: Vec<usize>,
    pub wav_path: PathBuf,
    pub mp3_path: Option<PathBuf>,
    pub encode: EncodeStatus,
    pub duration_secs: f64,
    pub reference_audio: PathBuf,
    pub history_id: Option<u64>,
}

/// Outcome of a batch: every text is attempted.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<GenerationReport>,
    pub failed: Vec<(String, PipelineError)>,
}

/// Settings that shape every run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub voices: VoiceLibrary,
    pub texts: TextLibrary,
    pub output: OutputLayout,
    pub ffmpeg: FfmpegTools,
    pub reference_sample_rate: u32,
    pub max_chars: usize,
    pub long_text_threshold: usize,
    pub split_strategy: SplitStrategy,
    pub failure_policy: ChunkFailurePolicy,
    pub cleanup_chunks: bool,
    pub write_summary: bool,
    pub mp3_bitrate: String,
    pub queue_backlog: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &StudioConfig, ffmpeg: FfmpegTools) -> Self {
        Self {
            voices: VoiceLibrary::new(&config.voices_dir),
            texts: TextLibrary::new(&config.texts_dir),
            output: OutputLayout::new(&config.output_dir),
            ffmpeg,
            reference_sample_rate: config.reference_sample_rate,
            max_chars: config.max_chars,
            long_text_threshold: config.long_text_threshold,
            split_strategy: config.split_strategy,
            failure_policy: config.failure_policy,
            cleanup_chunks: config.cleanup_chunks,
            write_summary: config.write_summary,
            mp3_bitrate: config.mp3_bitrate.clone(),
            queue_backlog: config.queue_backlog,
        }
    }
}

/// Drives generation runs against one loaded model.
pub struct Pipeline {
    model: ModelHandle,
    settings: PipelineSettings,
    encoder: Mp3Encoder,
    history: HistoryStore,
    queue: JobQueue,
}

struct ResolvedInput {
    reference_files: Vec<PathBuf>,
    text: String,
    source: String,
    basename: String,
}

impl Pipeline {
    pub fn new(model: ModelHandle, settings: PipelineSettings) -> Self {
        let encoder = Mp3Encoder::new(settings.ffmpeg.clone(), settings.mp3_bitrate.clone());
        let history = settings.output.history();
        let queue = JobQueue::new(settings.queue_backlog.max(1));
        Self {
            model,
            settings,
            encoder,
            history,
            queue,
        }
    }

    pub fn from_config(config: &StudioConfig, model: ModelHandle) -> Self {
        let ffmpeg = FfmpegTools::locate(config.ffmpeg_path.as_deref());
        Self::new(model, PipelineSettings::from_config(config, ffmpeg))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run `request` once all earlier submissions have finished.
    pub async fn submit<F>(
        &self,
        request: GenerationRequest,
        on_chunk: F,
    ) -> Result<GenerationReport, PipelineError>
    where
        F: FnMut(ChunkProgress),
    {
        self.queue.submit(self.run(request, on_chunk)).await?
    }

    /// Generate every text with one voice. Failures are collected and do
    /// not stop the batch.
    pub async fn run_batch<F>(
        &self,
        voice: &str,
        texts: Vec<TextInput>,
        params: &GenerationParams,
        mut on_chunk: F,
    ) -> BatchReport
    where
        F: FnMut(&str, ChunkProgress),
    {
        let mut report = BatchReport::default();
        let total = texts.len();

        for (i, text) in texts.into_iter().enumerate() {
            let source = text.source_name().to_string();
            info!("Batch [{}/{}]: {}", i + 1, total, source);

            let request = GenerationRequest::new(voice, text, params.clone());
            match self.submit(request, |p| on_chunk(&source, p)).await {
                Ok(done) => report.succeeded.push(done),
                Err(e) => {
                    warn!("Batch item {} failed at {}: {}", source, e.stage(), e);
                    report.failed.push((source, e));
                }
            }
        }

        report
    }

    fn resolve_input(&self, request: &GenerationRequest) -> Result<ResolvedInput, PipelineError> {
        request.params.validate()?;

        let voice = self
            .settings
            .voices
            .resolve(&request.voice)
            .map_err(|e| PipelineError::Validation(e.to_string()))?;

        let (text, source) = match &request.text {
            TextInput::Library(name) => {
                let text = self
                    .settings
                    .texts
                    .read(name)
                    .map_err(|e| PipelineError::Validation(format!("{:#}", e)))?;
                (text, name.clone())
            }
            TextInput::Inline { name, content } => {
                let text = content.trim();
                if text.is_empty() {
                    return Err(PipelineError::Validation("Text is empty".to_string()));
                }
                (text.to_string(), name.clone())
            }
        };

        Ok(ResolvedInput {
            reference_files: voice.files,
            basename: text_basename(&source),
            text,
            source,
        })
    }

    /// Run one request to completion.
    pub async fn run<F>(
        &self,
        request: GenerationRequest,
        mut on_chunk: F,
    ) -> Result<GenerationReport, PipelineError>
    where
        F: FnMut(ChunkProgress),
    {
        let input = self.resolve_input(&request)?;
        let settings = &self.settings;
        let params = &request.params;

        settings
            .output
            .ensure()
            .map_err(|e| PipelineError::Validation(format!("{:#}", e)))?;

        let reference = prepare_reference(
            &request.voice,
            &input.reference_files,
            settings.output.root(),
            settings.reference_sample_rate,
            &settings.ffmpeg,
        )
        .map_err(|e| PipelineError::Reference(format!("{:#}", e)))?;
        debug!(
            "Reference audio {} ({:.1}s, cached: {})",
            reference.path.display(),
            reference.duration_secs,
            reference.from_cache
        );

        let names = settings.output.names(&request.voice, &input.basename);
        let text_length = char_count(&input.text);
        let chunked = is_long_text(&input.text, settings.long_text_threshold);

        let (wav_path, duration_secs, chunks_planned, chunk_count, failed_chunks) = if chunked {
            self.run_chunked(&request, &input.text, &reference.path, &names, &mut on_chunk)
                .await?
        } else {
            info!("Generating single-pass audio ({} chars)", text_length);
            let wave = self
                .model
                .synthesize(&input.text, &reference.path, params)
                .await
                .map_err(PipelineError::Synthesis)?;

            let wav_path = settings.output.wav_path(&names, false);
            write_wav(&wav_path, &wave).map_err(|e| {
                PipelineError::Synthesis(SynthesisError::Save {
                    path: wav_path.clone(),
                    message: format!("{:#}", e),
                })
            })?;
            info!("Audio saved: {}", wav_path.display());
            (wav_path, wave.duration_secs(), 0, 0, Vec::new())
        };

        let mp3_target = settings.output.mp3_path(&names, chunked);
        let encode = self.encoder.encode(&wav_path, &mp3_target);
        let mp3_path = encode.path().map(Path::to_path_buf);

        let mut report = GenerationReport {
            voice: request.voice.clone(),
            text_source: input.source,
            text_length,
            mode: if chunked {
                GenerationMode::Chunked
            } else {
                GenerationMode::SinglePass
            },
            chunks_planned,
            chunk_count,
            failed_chunks,
            wav_path,
            mp3_path,
            encode,
            duration_secs,
            reference_audio: reference.path,
            history_id: None,
        };

        match self.history.add(NewGeneration {
            voice_name: report.voice.clone(),
            text_source: report.text_source.clone(),
            text_length,
            wav_path: report.wav_path.clone(),
            mp3_path: report.mp3_path.clone(),
            chunk_count: report.chunk_count,
            parameters: params.clone(),
        }) {
            Ok(record) => report.history_id = Some(record.id),
            Err(e) => warn!("Could not record generation history: {:#}", e),
        }

        if settings.write_summary {
            let path = settings.output.summary_path(&names);
            if let Err(e) = summary::write_summary(&path, &report, params) {
                warn!("{:#}", e);
            }
        }

        Ok(report)
    }

    async fn run_chunked<F>(
        &self,
        request: &GenerationRequest,
        text: &str,
        reference_audio: &Path,
        names: &OutputNames,
        on_chunk: &mut F,
    ) -> Result<(PathBuf, f64, usize, usize, Vec<usize>), PipelineError>
    where
        F: FnMut(ChunkProgress),
    {
        let settings = &self.settings;
        let strategy = request.strategy.unwrap_or(settings.split_strategy);
        let cleanup = request.cleanup_chunks.unwrap_or(settings.cleanup_chunks);

        let chunks = segment(text, settings.max_chars, strategy);
        let planned = chunks.len();
        info!(
            "Text split into {} chunks ({} strategy, max {} chars)",
            planned, strategy, settings.max_chars
        );

        let sink = ChunkSink::new(&settings.output.wav_dir, names.base.clone());
        let outcomes = synthesize_chunks(
            &self.model,
            &chunks,
            reference_audio,
            &request.params,
            &sink,
            settings.failure_policy,
            |outcome, total| {
                on_chunk(ChunkProgress {
                    index: outcome.index,
                    total,
                    succeeded: outcome.is_ok(),
                })
            },
        )
        .await;

        let failed = failed_indices(&outcomes);
        let synthesized = outcomes.len() - failed.len();
        if !failed.is_empty() {
            warn!("{} of {} chunks failed: {:?}", failed.len(), planned, failed);
        }

        let segments = apply_failure_policy(
            outcomes,
            settings.failure_policy,
            self.model.sample_rate(),
        )
        .map_err(|aborted| PipelineError::ChunkAborted {
            index: aborted.index,
            error: aborted.error,
        })?;

        if synthesized == 0 || segments.is_empty() {
            return Err(PipelineError::AllChunksFailed { planned });
        }

        let full_path = settings.output.wav_path(names, true);
        let (wav_path, duration_secs) =
            match combine(segments, &full_path, self.model.sample_rate(), cleanup)? {
                Combined::Written {
                    path,
                    duration_secs,
                    ..
                } => (path, duration_secs),
                Combined::Unchanged(Segment::File(path)) => {
                    let secs = duration_or_zero(&path);
                    (path, secs)
                }
                Combined::Unchanged(Segment::Memory(wave)) => {
                    write_wav(&full_path, &wave).map_err(|e| ReassemblyError::Write {
                        path: full_path.clone(),
                        message: format!("{:#}", e),
                    })?;
                    (full_path, wave.duration_secs())
                }
            };

        Ok((wav_path, duration_secs, planned, synthesized, failed))
    }
}

/// Duration of a finished WAV for reporting. An unreadable header only
/// costs the report its duration.
fn duration_or_zero(path: &Path) -> f64 {
    match wav_duration_secs(path) {
        Ok(secs) => secs,
        Err(e) => {
            warn!("Could not read duration of {}: {:#}", path.display(), e);
            0.0
        }
    }
}
