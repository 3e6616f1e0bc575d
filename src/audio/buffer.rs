//! Mono PCM buffer

use crate::{Error, Result};

/// Audio buffer (mono, samples nominally in [-1, 1])
///
/// Buffers are moved, not shared: merging two buffers consumes both.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Audio samples
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create new audio buffer
    ///
    /// Fails if the sample rate is zero.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::Audio("Sample rate must be > 0".into()));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a buffer of `seconds` of digital silence
    pub fn silence(seconds: f32, sample_rate: u32) -> Result<Self> {
        let len = seconds_to_samples(seconds, sample_rate);
        Self::new(vec![0.0; len], sample_rate)
    }

    /// Get duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Borrow the samples
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the buffer, returning its samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// The last `seconds` of audio (or the whole buffer if shorter)
    pub fn tail(&self, seconds: f32) -> &[f32] {
        let n = seconds_to_samples(seconds, self.sample_rate).min(self.samples.len());
        &self.samples[self.samples.len() - n..]
    }
}

/// Convert a duration to a sample count, rounding to nearest
pub fn seconds_to_samples(seconds: f32, sample_rate: u32) -> usize {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds as f64 * sample_rate as f64).round() as usize
}
