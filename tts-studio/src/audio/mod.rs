//! Audio handling: waveforms, WAV I/O, chunk reassembly, reference
//! preparation and MP3 encoding.

pub mod encoder;
pub mod ffmpeg;
pub mod reassembler;
pub mod reference;
pub mod wav;

pub use encoder::{EncodeStatus, Mp3Encoder};
pub use ffmpeg::FfmpegTools;
pub use reassembler::{combine, Combined};

use std::path::{Path, PathBuf};

/// A mono waveform at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Samples per second
    pub sample_rate: u32,
}

impl Waveform {
    /// Create a waveform from samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Silence lasting `duration_secs` seconds.
    pub fn silence(duration_secs: f64, sample_rate: u32) -> Self {
        let len = (duration_secs.max(0.0) * sample_rate as f64).round() as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One unit of synthesized audio: either held in memory or written to a
/// WAV file.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Memory(Waveform),
    File(PathBuf),
}

impl Segment {
    /// Backing file, if any.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Segment::Memory(_) => None,
            Segment::File(path) => Some(path),
        }
    }
}
