//! tts-studio - Voice-cloned speech generation with Chatterbox Multilingual

mod audio;
mod config;
mod error;
mod history;
mod library;
mod pipeline;
mod queue;
mod synth;
mod text;
mod tts;

use anyhow::{Context, Result};
use audio::{EncodeStatus, FfmpegTools};
use clap::{Parser, Subcommand};
use config::StudioConfig;
use indicatif::{ProgressBar, ProgressStyle};
use library::texts::read_text_file;
use library::{format_duration, format_file_size, TextLibrary, VoiceLibrary};
use pipeline::{ChunkProgress, GenerationReport, GenerationRequest, Pipeline, TextInput};
use std::path::{Path, PathBuf};
use synth::ChunkFailurePolicy;
use text::SplitStrategy;
use tts::params::validate_language;
use tts::{find_preset, preset_names, GenerationParams, DEFAULT_PRESET, PRESETS};

#[derive(Parser, Debug)]
#[command(name = "tts-studio")]
#[command(about = "Voice-cloned speech generation with Chatterbox Multilingual", long_about = None)]
#[command(version)]
struct Args {
    /// Enable debug output
    #[arg(short, long, default_value_t = false, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate speech for one text
    Generate(GenerateArgs),
    /// Generate speech for several texts with one voice
    Batch {
        /// Voice name
        #[arg(long)]
        voice: String,

        /// Text library names or paths to .txt files
        #[arg(required = true)]
        texts: Vec<String>,

        #[command(flatten)]
        params: ParamArgs,
    },
    /// Manage the voice library
    Voices {
        #[command(subcommand)]
        action: VoicesAction,
    },
    /// Manage the text library
    Texts {
        #[command(subcommand)]
        action: TextsAction,
    },
    /// Inspect generation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Show the parameter presets
    Presets,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Voice name
    #[arg(long)]
    voice: String,

    /// Text library name or path to a .txt file
    #[arg(long, conflicts_with = "inline", required_unless_present = "inline")]
    text: Option<String>,

    /// Text to speak, given directly
    #[arg(long)]
    inline: Option<String>,

    /// Output name for --inline text
    #[arg(long, default_value = "inline")]
    name: String,

    /// Split strategy for long texts
    #[arg(long, value_enum)]
    strategy: Option<SplitStrategy>,

    /// Keep the per-chunk WAV files
    #[arg(long, default_value_t = false)]
    keep_chunks: bool,

    #[command(flatten)]
    params: ParamArgs,
}

#[derive(clap::Args, Debug)]
struct ParamArgs {
    /// Start from a named preset (see `presets`)
    #[arg(long)]
    preset: Option<String>,

    /// Language code (e.g. it, en, de)
    #[arg(long)]
    language: Option<String>,

    /// Temperature for randomness (0.05-5.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Pacing/CFG weight (0.0-1.0)
    #[arg(long)]
    cfg: Option<f32>,

    /// Expressiveness/exaggeration (0.25-2.0)
    #[arg(long)]
    exaggeration: Option<f32>,

    /// Repetition penalty (1.0-3.0)
    #[arg(long)]
    repetition_penalty: Option<f32>,

    /// Min-p sampling (0.0-1.0)
    #[arg(long)]
    min_p: Option<f32>,

    /// Top-p sampling (0.0-1.0)
    #[arg(long)]
    top_p: Option<f32>,
}

impl ParamArgs {
    /// Configured defaults, then the preset, then explicit flags.
    fn resolve(&self, defaults: &GenerationParams) -> Result<GenerationParams> {
        let mut params = match &self.preset {
            Some(name) => find_preset(name)
                .with_context(|| format!("Available presets: {}", preset_names().join(", ")))?
                .apply(defaults),
            None => defaults.clone(),
        };

        if let Some(language) = &self.language {
            validate_language(language)?;
            params = params.with_language(language.as_str());
        }
        if let Some(v) = self.temperature {
            params = params.with_temperature(v);
        }
        if let Some(v) = self.cfg {
            params = params.with_cfg_weight(v);
        }
        if let Some(v) = self.exaggeration {
            params = params.with_exaggeration(v);
        }
        if let Some(v) = self.repetition_penalty {
            params = params.with_repetition_penalty(v);
        }
        if let Some(v) = self.min_p {
            params = params.with_min_p(v);
        }
        if let Some(v) = self.top_p {
            params = params.with_top_p(v);
        }

        params.validate()?;
        Ok(params)
    }
}

#[derive(Subcommand, Debug)]
enum VoicesAction {
    /// List voices
    List,
    /// Show the audio files of a voice
    Show { name: String },
    /// Create a voice from audio files
    Create {
        name: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Add audio files to an existing voice
    Add {
        name: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete a voice and its audio
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum TextsAction {
    /// List texts
    List,
    /// Show a text with its length and processing mode
    Show { name: String },
    /// Save a text from a string or import a .txt file
    Save {
        name: String,
        #[arg(long, conflicts_with = "from", required_unless_present = "from")]
        content: Option<String>,
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Delete a text
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List generations, newest first
    List {
        /// Only this voice
        #[arg(long)]
        voice: Option<String>,
    },
    /// Show one generation
    Show { id: u64 },
    /// Show totals
    Stats,
    /// Delete one generation record
    Delete { id: u64 },
    /// Delete all records
    Clear,
    /// Export the history as CSV
    Export { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the voice library directory
    SetVoicesDir { path: PathBuf },
    /// Set the text library directory
    SetTextsDir { path: PathBuf },
    /// Set the output directory
    SetOutputDir { path: PathBuf },
    /// Set the default language
    SetLanguage { code: String },
    /// Set default temperature
    SetTemperature {
        /// Value (0.05-5.0)
        value: f32,
    },
    /// Set default CFG/pacing
    SetCfg {
        /// Value (0.0-1.0)
        value: f32,
    },
    /// Set default exaggeration
    SetExaggeration {
        /// Value (0.25-2.0)
        value: f32,
    },
    /// Set the MP3 bitrate (e.g. 192k)
    SetBitrate { bitrate: String },
    /// Set what happens when a chunk fails
    SetFailurePolicy {
        #[arg(value_enum)]
        policy: ChunkFailurePolicy,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    match args.command {
        Commands::Generate(generate) => handle_generate(generate).await,
        Commands::Batch {
            voice,
            texts,
            params,
        } => handle_batch(&voice, &texts, &params).await,
        Commands::Voices { action } => handle_voices_command(&action),
        Commands::Texts { action } => handle_texts_command(&action),
        Commands::History { action } => handle_history_command(&action),
        Commands::Presets => {
            list_presets();
            Ok(())
        }
        Commands::Config { action } => handle_config_command(&action),
    }
}

fn load_config() -> Result<StudioConfig> {
    StudioConfig::load().context("Failed to load configuration")
}

/// Load the model and build a pipeline around it.
fn open_pipeline(config: &StudioConfig) -> Result<Pipeline> {
    eprintln!("Loading Chatterbox Multilingual...");
    let model = tts::create_backend(
        config.device.as_deref(),
        config.python_site_packages.as_deref(),
    )
    .context("Failed to load TTS model")?;
    eprintln!("Model ready on {}", model.device());

    let pipeline = Pipeline::from_config(config, model);
    if !pipeline.settings().ffmpeg.is_ffmpeg_available() {
        eprintln!("ffmpeg not found: MP3 output will be skipped");
    }
    Ok(pipeline)
}

/// A library name, or a path to a .txt file outside the library.
fn text_input(arg: &str) -> Result<TextInput> {
    let path = Path::new(arg);
    if path.is_file() {
        let content = read_text_file(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| arg.to_string());
        return Ok(TextInput::Inline { name, content });
    }
    Ok(TextInput::Library(arg.to_string()))
}

/// Progress reporter; a new bar starts whenever the label changes.
struct ChunkBar {
    bar: Option<ProgressBar>,
    label: String,
    failed: usize,
}

impl ChunkBar {
    fn new() -> Self {
        Self {
            bar: None,
            label: String::new(),
            failed: 0,
        }
    }

    fn update(&mut self, label: &str, progress: ChunkProgress) {
        if self.label != label {
            self.finish();
            self.label = label.to_string();
        }

        let bar = self.bar.get_or_insert_with(|| {
            let pb = ProgressBar::new(progress.total as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        });

        if !progress.succeeded {
            self.failed += 1;
        }
        bar.set_position(progress.index as u64);
        if self.failed > 0 {
            bar.set_message(format!("{} ({} failed)", label, self.failed));
        } else {
            bar.set_message(label.to_string());
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.failed = 0;
    }
}

fn print_report(report: &GenerationReport) {
    eprintln!();
    eprintln!("Voice: {}", report.voice);
    eprintln!("Text: {} ({} characters)", report.text_source, report.text_length);
    eprintln!("Mode: {}", report.mode);
    eprintln!("Reference: {}", report.reference_audio.display());
    if report.chunks_planned > 0 {
        eprintln!("Chunks: {}/{}", report.chunk_count, report.chunks_planned);
        if !report.failed_chunks.is_empty() {
            eprintln!("Failed chunks: {:?}", report.failed_chunks);
        }
    }
    eprintln!(
        "WAV: {} ({})",
        report.wav_path.display(),
        format_duration(report.duration_secs)
    );
    match &report.encode {
        EncodeStatus::Encoded(path) => eprintln!("MP3: {}", path.display()),
        EncodeStatus::Skipped(reason) => eprintln!("MP3: skipped ({})", reason),
    }
}

async fn handle_generate(args: GenerateArgs) -> Result<()> {
    let config = load_config()?;
    let params = args.params.resolve(&config.params)?;

    let text = match (&args.text, &args.inline) {
        (Some(text), _) => text_input(text)?,
        (None, Some(content)) => TextInput::Inline {
            name: args.name.clone(),
            content: content.clone(),
        },
        (None, None) => anyhow::bail!("Either --text or --inline is required"),
    };

    let pipeline = open_pipeline(&config)?;

    let mut request = GenerationRequest::new(&args.voice, text, params);
    request.strategy = args.strategy;
    if args.keep_chunks {
        request.cleanup_chunks = Some(false);
    }

    let mut bar = ChunkBar::new();
    let result = pipeline
        .submit(request, |progress| bar.update("chunks", progress))
        .await;
    bar.finish();

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Generation failed at {}: {}", e.stage(), e)),
    }
}

async fn handle_batch(voice: &str, texts: &[String], params: &ParamArgs) -> Result<()> {
    let config = load_config()?;
    let params = params.resolve(&config.params)?;
    let inputs = texts
        .iter()
        .map(|t| text_input(t.as_str()))
        .collect::<Result<Vec<_>>>()?;

    let pipeline = open_pipeline(&config)?;

    let mut bar = ChunkBar::new();
    let report = pipeline
        .run_batch(voice, inputs, &params, |source, progress| {
            bar.update(source, progress)
        })
        .await;
    bar.finish();

    for done in &report.succeeded {
        print_report(done);
    }
    eprintln!(
        "\nCompleted: {}, Failed: {}",
        report.succeeded.len(),
        report.failed.len()
    );
    for (source, e) in &report.failed {
        eprintln!("  {}: failed at {}: {}", source, e.stage(), e);
    }

    if report.succeeded.is_empty() && !report.failed.is_empty() {
        anyhow::bail!("Every text in the batch failed");
    }
    Ok(())
}

fn handle_voices_command(action: &VoicesAction) -> Result<()> {
    let config = load_config()?;
    let voices = VoiceLibrary::new(&config.voices_dir);

    match action {
        VoicesAction::List => {
            let names = voices.list()?;
            if names.is_empty() {
                println!("No voices in {}", voices.root().display());
            }
            for name in names {
                println!("{}", name);
            }
        }
        VoicesAction::Show { name } => {
            let ffmpeg = FfmpegTools::locate(config.ffmpeg_path.as_deref());
            let details = voices.details(name, &ffmpeg)?;
            println!("Voice: {}", details.name);
            for file in &details.files {
                let duration = file
                    .duration_secs
                    .map(format_duration)
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "  {} ({}, {})",
                    file.name,
                    format_file_size(file.size_bytes),
                    duration
                );
            }
            println!(
                "{} files, {} total",
                details.files.len(),
                format_duration(details.total_duration_secs())
            );
        }
        VoicesAction::Create { name, files } => {
            let voice = voices.create(name, files)?;
            println!("Created voice '{}' with {} files", voice.name, voice.files.len());
        }
        VoicesAction::Add { name, files } => {
            let added = voices.add_audio(name, files)?;
            println!("Added {} files to voice '{}'", added, name);
        }
        VoicesAction::Delete { name } => {
            voices.delete(name)?;
            println!("Deleted voice '{}'", name);
        }
    }
    Ok(())
}

fn handle_texts_command(action: &TextsAction) -> Result<()> {
    let config = load_config()?;
    let texts = TextLibrary::new(&config.texts_dir);

    match action {
        TextsAction::List => {
            let names = texts.list()?;
            if names.is_empty() {
                println!("No texts in {}", texts.root().display());
            }
            for name in names {
                println!("{}", name);
            }
        }
        TextsAction::Show { name } => {
            let info = texts.info(name, config.long_text_threshold)?;
            println!("Text: {}", name);
            println!("Length: {} characters", info.chars);
            println!("Mode: {}", info.mode_label());
            if let Some(chunks) = info.estimated_chunks {
                println!("Estimated chunks: {}", chunks);
            }
            println!("Estimated time: {}", info.estimated_time);
            println!();
            println!("{}", info.preview);
        }
        TextsAction::Save {
            name,
            content,
            from,
        } => {
            let saved = match (content, from) {
                (Some(content), _) => texts.save(name, content)?,
                (None, Some(path)) => texts.import(path, Some(name))?,
                (None, None) => anyhow::bail!("Either --content or --from is required"),
            };
            println!("Saved {}", saved);
        }
        TextsAction::Delete { name } => {
            texts.delete(name)?;
            println!("Deleted {}", name);
        }
    }
    Ok(())
}

fn handle_history_command(action: &HistoryAction) -> Result<()> {
    let config = load_config()?;
    let history = history::HistoryStore::in_dir(&config.output_dir);

    match action {
        HistoryAction::List { voice } => {
            let records = match voice {
                Some(v) => history.by_voice(v)?,
                None => history.all()?,
            };
            if records.is_empty() {
                println!("No generations recorded in {}", history.path().display());
            }
            for r in records {
                println!(
                    "#{} {} {} <- {} ({} chars, {})",
                    r.id,
                    r.timestamp.format("%Y-%m-%d %H:%M"),
                    r.voice_name,
                    r.text_source,
                    r.text_length,
                    r.mode
                );
            }
        }
        HistoryAction::Show { id } => {
            let record = history
                .by_id(*id)?
                .ok_or_else(|| anyhow::anyhow!("No generation with id {}", id))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        HistoryAction::Stats => {
            let stats = history.statistics()?;
            println!("Total generations: {}", stats.total_generations);
            println!("Unique voices: {}", stats.unique_voices);
            println!("Total characters: {}", stats.total_characters);
            println!("Chunked: {}", stats.chunked_generations);
            println!("Single-pass: {}", stats.single_pass_generations);
            if !stats.voices_used.is_empty() {
                println!("Voices: {}", stats.voices_used.join(", "));
            }
        }
        HistoryAction::Delete { id } => {
            if history.delete(*id)? {
                println!("Deleted generation #{}", id);
            } else {
                anyhow::bail!("No generation with id {}", id);
            }
        }
        HistoryAction::Clear => {
            history.clear()?;
            println!("History cleared");
        }
        HistoryAction::Export { path } => {
            let count = history.export_csv(path)?;
            println!("Exported {} records to {}", count, path.display());
        }
    }
    Ok(())
}

fn list_presets() {
    for preset in PRESETS {
        if preset.name == DEFAULT_PRESET {
            println!("{} *", preset.name);
        } else {
            println!("{}", preset.name);
        }
        println!(
            "  temperature={} cfg={} exaggeration={} repetition_penalty={} min_p={} top_p={}",
            preset.temperature,
            preset.cfg_weight,
            preset.exaggeration,
            preset.repetition_penalty,
            preset.min_p,
            preset.top_p
        );
    }
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    let mut config = load_config()?;
    let message = match action {
        ConfigAction::Show => {
            println!("Configuration file: {}", StudioConfig::config_path().display());
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
            if config.device.is_none() {
                println!("# device = (auto-detect)");
            }
            let ffmpeg = FfmpegTools::locate(config.ffmpeg_path.as_deref());
            match ffmpeg.ffmpeg_path() {
                Some(path) => println!("# ffmpeg found at {}", path.display()),
                None => println!("# ffmpeg not found"),
            }
            return Ok(());
        }
        ConfigAction::SetVoicesDir { path } => {
            config.voices_dir = path.clone();
            format!("Voices directory set to: {}", path.display())
        }
        ConfigAction::SetTextsDir { path } => {
            config.texts_dir = path.clone();
            format!("Texts directory set to: {}", path.display())
        }
        ConfigAction::SetOutputDir { path } => {
            config.output_dir = path.clone();
            format!("Output directory set to: {}", path.display())
        }
        ConfigAction::SetLanguage { code } => {
            validate_language(code)?;
            config.params = config.params.with_language(code.as_str());
            format!("Default language set to: {}", code)
        }
        ConfigAction::SetTemperature { value } => {
            config.params = config.params.with_temperature(*value);
            format!("Default temperature set to: {}", config.params.temperature)
        }
        ConfigAction::SetCfg { value } => {
            config.params = config.params.with_cfg_weight(*value);
            format!("Default CFG set to: {}", config.params.cfg_weight)
        }
        ConfigAction::SetExaggeration { value } => {
            config.params = config.params.with_exaggeration(*value);
            format!("Default exaggeration set to: {}", config.params.exaggeration)
        }
        ConfigAction::SetBitrate { bitrate } => {
            config.mp3_bitrate = bitrate.clone();
            format!("MP3 bitrate set to: {}", bitrate)
        }
        ConfigAction::SetFailurePolicy { policy } => {
            config.failure_policy = *policy;
            format!("Chunk failure policy set to: {}", policy)
        }
    };

    config.save()?;
    println!("{}", message);
    Ok(())
}
