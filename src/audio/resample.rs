//! Audio resampling using rubato

use crate::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use super::AudioBuffer;

const CHUNK_SIZE: usize = 1024;

/// Resample audio to target sample rate
///
/// Uses cubic polynomial interpolation; output length is `ceil(len * ratio)`.
pub fn resample(audio: &AudioBuffer, target_sr: u32) -> Result<AudioBuffer> {
    if target_sr == 0 {
        return Err(Error::Audio("Target sample rate must be > 0".into()));
    }
    if audio.sample_rate == target_sr {
        return Ok(audio.clone());
    }
    if audio.is_empty() {
        return AudioBuffer::new(Vec::new(), target_sr);
    }

    let resample_ratio = target_sr as f64 / audio.sample_rate as f64;

    let mut resampler = FastFixedIn::<f32>::new(
        resample_ratio,
        1.0,
        PolynomialDegree::Cubic,
        CHUNK_SIZE,
        1,
    )
    .map_err(|e| Error::Audio(format!("Failed to create resampler: {}", e)))?;

    let frames_needed = resampler.input_frames_next();
    let mut input_buffer = vec![vec![0.0f32; frames_needed]];
    let expected_len = output_len(audio.len(), audio.sample_rate, target_sr);
    let mut output_samples = Vec::with_capacity(expected_len + CHUNK_SIZE);

    let mut pos = 0;
    // Keep feeding zero-padded blocks until the resampler's delay has been flushed
    while output_samples.len() < expected_len {
        let end = (pos + frames_needed).min(audio.len());
        let chunk_size = end.saturating_sub(pos);

        if chunk_size > 0 {
            input_buffer[0][..chunk_size].copy_from_slice(&audio.samples[pos..end]);
        }
        input_buffer[0][chunk_size..].fill(0.0);

        let output = resampler
            .process(&input_buffer, None)
            .map_err(|e| Error::Audio(format!("Resampling failed: {}", e)))?;

        output_samples.extend_from_slice(&output[0]);
        pos += chunk_size;

        if chunk_size == 0 && output[0].is_empty() {
            break;
        }
    }

    output_samples.truncate(expected_len);

    AudioBuffer::new(output_samples, target_sr)
}

/// Samples produced for `len` input samples: `ceil(len * to / from)`, exact
fn output_len(len: usize, from: u32, to: u32) -> usize {
    (len as u64 * to as u64).div_ceil(from as u64) as usize
}
