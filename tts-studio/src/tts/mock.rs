//! Scripted speech model for tests.

use super::{GenerationParams, SpeechModel};
use crate::audio::Waveform;
use crate::error::SynthesisError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One recorded call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub text: String,
    pub reference: PathBuf,
    pub params: GenerationParams,
}

/// Produces `samples_per_char` samples per input character. Every sample of
/// call *n* (0-based) has the value `(n + 1) / 100`, so tests can tell the
/// segments apart after reassembly. Texts containing a failure marker
/// return an error.
pub struct MockModel {
    sample_rate: u32,
    samples_per_char: usize,
    delay: Duration,
    fail_markers: Vec<String>,
    calls: Mutex<Vec<MockCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockModel {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples_per_char: 10,
            delay: Duration::ZERO,
            fail_markers: Vec::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_samples_per_char(mut self, n: usize) -> Self {
        self.samples_per_char = n;
        self
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.push(marker.into());
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_texts(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.text).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Sample value produced by the `n`th call (0-based).
    pub fn value_for_call(n: usize) -> f32 {
        (n + 1) as f32 / 100.0
    }
}

#[async_trait]
impl SpeechModel for MockModel {
    async fn synthesize(
        &self,
        text: &str,
        reference_audio: &Path,
        params: &GenerationParams,
    ) -> Result<Waveform, SynthesisError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(MockCall {
                text: text.to_string(),
                reference: reference_audio.to_path_buf(),
                params: params.clone(),
            });
            calls.len() - 1
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_markers.iter().any(|m| text.contains(m.as_str())) {
            return Err(SynthesisError::Model(format!("scripted failure for {:?}", text)));
        }

        let len = text.chars().count() * self.samples_per_char;
        Ok(Waveform::new(
            vec![Self::value_for_call(call_number); len],
            self.sample_rate,
        ))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn device(&self) -> &str {
        "mock"
    }
}
