//! Joining ordered audio segments into one waveform.

use super::wav::{read_wav, write_wav};
use super::{Segment, Waveform};
use crate::error::ReassemblyError;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Result of a successful [`combine`].
#[derive(Debug, Clone, PartialEq)]
pub enum Combined {
    /// A lone segment, handed back without being copied or re-encoded.
    Unchanged(Segment),
    /// Several segments written to `path`.
    Written {
        path: PathBuf,
        sample_count: usize,
        duration_secs: f64,
        /// Chunk files deleted afterwards.
        cleaned_up: usize,
        /// Chunk files that could not be deleted.
        cleanup_failures: usize,
    },
}

fn decode(position: usize, segment: Segment) -> Result<Waveform, ReassemblyError> {
    match segment {
        Segment::Memory(wave) => Ok(wave),
        Segment::File(path) => read_wav(&path).map_err(|e| ReassemblyError::Decode {
            position,
            path,
            message: format!("{:#}", e),
        }),
    }
}

/// Concatenate `segments` in order into `output_path`.
///
/// No resampling is done: every segment must already be at
/// `target_sample_rate`. Nothing is written unless every segment decodes.
/// With `cleanup`, file-backed inputs are removed once the output exists.
pub fn combine(
    mut segments: Vec<Segment>,
    output_path: &Path,
    target_sample_rate: u32,
    cleanup: bool,
) -> Result<Combined, ReassemblyError> {
    if segments.is_empty() {
        return Err(ReassemblyError::NoSegments);
    }

    if segments.len() == 1 {
        if let Some(only) = segments.pop() {
            debug!("Single segment, nothing to combine");
            return Ok(Combined::Unchanged(only));
        }
    }

    let count = segments.len();
    let files: Vec<PathBuf> = segments
        .iter()
        .filter_map(|s| s.file_path().map(Path::to_path_buf))
        .collect();

    let mut samples = Vec::new();
    for (i, segment) in segments.into_iter().enumerate() {
        let position = i + 1;
        let wave = decode(position, segment)?;
        if wave.sample_rate != target_sample_rate {
            return Err(ReassemblyError::SampleRateMismatch {
                position,
                found: wave.sample_rate,
                expected: target_sample_rate,
            });
        }
        samples.extend_from_slice(&wave.samples);
    }

    let combined = Waveform::new(samples, target_sample_rate);
    write_wav(output_path, &combined).map_err(|e| ReassemblyError::Write {
        path: output_path.to_path_buf(),
        message: format!("{:#}", e),
    })?;

    info!(
        "Combined {} segments into {} ({:.1}s)",
        count,
        output_path.display(),
        combined.duration_secs()
    );

    let mut cleaned_up = 0;
    let mut cleanup_failures = 0;
    if cleanup {
        for file in files.iter().filter(|f| f.as_path() != output_path) {
            match std::fs::remove_file(file) {
                Ok(()) => cleaned_up += 1,
                Err(e) => {
                    warn!("Could not remove chunk file {}: {}", file.display(), e);
                    cleanup_failures += 1;
                }
            }
        }
        debug!("Removed {} chunk files", cleaned_up);
    }

    Ok(Combined::Written {
        path: output_path.to_path_buf(),
        sample_count: combined.len(),
        duration_secs: combined.duration_secs(),
        cleaned_up,
        cleanup_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SR: u32 = 24_000;

    fn chunk_file(dir: &Path, name: &str, value: f32, len: usize) -> Segment {
        let path = dir.join(name);
        write_wav(&path, &Waveform::new(vec![value; len], SR)).unwrap();
        Segment::File(path)
    }

    #[test]
    fn test_single_segment_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let seg = chunk_file(dir.path(), "only.wav", 0.1, 100);
        let out = dir.path().join("out.wav");

        let result = combine(vec![seg.clone()], &out, SR, true).unwrap();
        assert_eq!(result, Combined::Unchanged(seg.clone()));
        // Neither written nor cleaned up
        assert!(!out.exists());
        assert!(seg.file_path().unwrap().exists());
    }

    #[test]
    fn test_concatenation_keeps_order_and_duration() {
        let dir = TempDir::new().unwrap();
        let segments = vec![
            chunk_file(dir.path(), "c1.wav", 0.1, 2_400),
            Segment::Memory(Waveform::new(vec![0.2; 1_200], SR)),
            chunk_file(dir.path(), "c3.wav", 0.3, 4_800),
        ];
        let out = dir.path().join("full.wav");

        let result = combine(segments, &out, SR, false).unwrap();
        match result {
            Combined::Written {
                sample_count,
                duration_secs,
                cleaned_up,
                ..
            } => {
                assert_eq!(sample_count, 8_400);
                assert!((duration_secs - 0.35).abs() < 1e-9);
                assert_eq!(cleaned_up, 0);
            }
            other => panic!("unexpected {:?}", other),
        }

        let wave = read_wav(&out).unwrap();
        assert_eq!(wave.samples[0], 0.1);
        assert_eq!(wave.samples[2_400], 0.2);
        assert_eq!(wave.samples[3_600], 0.3);
        assert_eq!(*wave.samples.last().unwrap(), 0.3);
    }

    #[test]
    fn test_cleanup_removes_chunk_files() {
        let dir = TempDir::new().unwrap();
        let a = chunk_file(dir.path(), "a.wav", 0.1, 10);
        let b = chunk_file(dir.path(), "b.wav", 0.2, 10);
        let out = dir.path().join("out.wav");

        let result = combine(vec![a.clone(), b.clone()], &out, SR, true).unwrap();
        assert!(matches!(result, Combined::Written { cleaned_up: 2, cleanup_failures: 0, .. }));
        assert!(!a.file_path().unwrap().exists());
        assert!(!b.file_path().unwrap().exists());
        assert!(out.exists());
    }

    #[test]
    fn test_no_cleanup_keeps_chunk_files() {
        let dir = TempDir::new().unwrap();
        let a = chunk_file(dir.path(), "a.wav", 0.1, 10);
        let b = chunk_file(dir.path(), "b.wav", 0.2, 10);
        let out = dir.path().join("out.wav");

        combine(vec![a.clone(), b.clone()], &out, SR, false).unwrap();
        assert!(a.file_path().unwrap().exists());
        assert!(b.file_path().unwrap().exists());
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = combine(Vec::new(), &dir.path().join("out.wav"), SR, true).unwrap_err();
        assert!(matches!(err, ReassemblyError::NoSegments));
    }

    #[test]
    fn test_sample_rate_mismatch() {
        let dir = TempDir::new().unwrap();
        let segments = vec![
            Segment::Memory(Waveform::new(vec![0.0; 10], SR)),
            Segment::Memory(Waveform::new(vec![0.0; 10], 16_000)),
        ];
        let out = dir.path().join("out.wav");
        let err = combine(segments, &out, SR, true).unwrap_err();
        assert!(matches!(
            err,
            ReassemblyError::SampleRateMismatch { position: 2, found: 16_000, expected: SR }
        ));
        assert!(!out.exists());
    }

    #[test]
    fn test_decode_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let good = chunk_file(dir.path(), "good.wav", 0.1, 10);
        let bad_path = dir.path().join("bad.wav");
        std::fs::write(&bad_path, b"not a wav file").unwrap();
        let out = dir.path().join("out.wav");

        let err = combine(vec![good.clone(), Segment::File(bad_path)], &out, SR, true).unwrap_err();
        assert!(matches!(err, ReassemblyError::Decode { position: 2, .. }));
        assert!(!out.exists());
        // Inputs survive a failed combine
        assert!(good.file_path().unwrap().exists());
    }
}
