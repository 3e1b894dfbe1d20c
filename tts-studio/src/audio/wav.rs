//! WAV reading and writing with hound.

use super::Waveform;
use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs;
use std::io::BufWriter;
use std::path::Path;

/// Read a WAV file into a mono waveform.
///
/// Multi-channel audio is mixed down by averaging; integer PCM is scaled to
/// [-1.0, 1.0].
pub fn read_wav(path: &Path) -> Result<Waveform> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("Failed to read samples from {}", path.display()))?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("Failed to read samples from {}", path.display()))?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(Waveform::new(samples, spec.sample_rate))
}

/// Duration of a WAV file in seconds, from its header only.
pub fn wav_duration_secs(path: &Path) -> Result<f64> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

fn float_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Write a waveform as 32-bit float mono WAV.
///
/// The data goes to a temporary file in the destination directory first and
/// is renamed into place, so readers never observe a partial file.
pub fn write_wav(path: &Path, wave: &Waveform) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".partial-")
        .suffix(".wav")
        .tempfile_in(parent)
        .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;

    {
        let mut writer = WavWriter::new(BufWriter::new(tmp.as_file_mut()), float_spec(wave.sample_rate))
            .context("Failed to start WAV writer")?;
        for sample in &wave.samples {
            writer.write_sample(*sample).context("Failed to write sample")?;
        }
        writer.finalize().context("Failed to finalize WAV file")?;
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to move WAV file into {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_float_wav_is_lossless() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wave.wav");
        let wave = Waveform::new(vec![0.0, 0.25, -0.5, 0.125], 24_000);

        write_wav(&path, &wave).unwrap();
        let read = read_wav(&path).unwrap();
        assert_eq!(read, wave);
    }

    #[test]
    fn test_write_creates_parent_and_leaves_no_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.wav");
        write_wav(&path, &Waveform::new(vec![0.1; 10], 16_000)).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("out.wav")]);
    }

    #[test]
    fn test_read_int_stereo_mixes_down() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for (l, r) in [(16384_i16, 0_i16), (-16384, -16384)] {
            writer.write_sample(l).unwrap();
            writer.write_sample(r).unwrap();
        }
        writer.finalize().unwrap();

        let wave = read_wav(&path).unwrap();
        assert_eq!(wave.sample_rate, 8_000);
        assert_eq!(wave.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn test_duration_from_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d.wav");
        write_wav(&path, &Waveform::new(vec![0.0; 36_000], 24_000)).unwrap();
        assert!((wav_duration_secs(&path).unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(read_wav(&dir.path().join("missing.wav")).is_err());
    }
}
