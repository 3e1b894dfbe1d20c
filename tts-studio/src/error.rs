//! Error types for the generation pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single synthesis call.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Model returned no audio")]
    EmptyOutput,

    #[error("Synthesis task failed: {0}")]
    Task(String),

    #[error("Failed to save chunk audio to {path}: {message}")]
    Save { path: PathBuf, message: String },
}

/// Failure to combine audio segments into one waveform.
#[derive(Error, Debug)]
pub enum ReassemblyError {
    #[error("No audio segments to combine")]
    NoSegments,

    #[error("Failed to decode segment {position} ({path}): {message}")]
    Decode {
        position: usize,
        path: PathBuf,
        message: String,
    },

    #[error("Segment {position} is {found} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        position: usize,
        found: u32,
        expected: u32,
    },

    #[error("Failed to write combined audio to {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Out-of-range or unsupported generation parameter.
#[derive(Error, Debug, PartialEq)]
pub enum ParamError {
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("Unsupported language '{0}'")]
    UnsupportedLanguage(String),

    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),
}

/// Admission failure of the generation queue.
#[derive(Error, Debug, PartialEq)]
pub enum QueueError {
    #[error("Generation queue is full ({capacity} requests pending)")]
    Full { capacity: usize },

    #[error("Generation queue is closed")]
    Closed,
}
