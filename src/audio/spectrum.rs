//! Short-time spectra
//!
//! Framed real FFT and per-frame spectral statistics

use crate::{Error, Result};
use ndarray::{Array2, Axis};
use num_complex::Complex;
use realfft::RealFftPlanner;
use std::f32::consts::PI;

/// Floor added to power bins before taking logarithms
const POWER_FLOOR: f32 = 1e-12;

/// Compute Hann window
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / size as f32).cos()))
        .collect()
}

/// Compute Short-Time Fourier Transform (STFT) without centre padding
///
/// Frame `k` covers samples `[k * hop_length, k * hop_length + win_length)`;
/// only complete frames are produced.
///
/// # Arguments
/// * `signal` - Input audio signal
/// * `n_fft` - FFT size
/// * `hop_length` - Hop length between frames
/// * `win_length` - Window length (zero padded to n_fft)
///
/// # Returns
/// Complex STFT matrix (n_fft/2+1, time_frames)
pub fn stft(
    signal: &[f32],
    n_fft: usize,
    hop_length: usize,
    win_length: usize,
) -> Result<Array2<Complex<f32>>> {
    if n_fft == 0 || hop_length == 0 || win_length == 0 || win_length > n_fft {
        return Err(Error::Audio(format!(
            "Invalid STFT geometry: n_fft={}, hop={}, win={}",
            n_fft, hop_length, win_length
        )));
    }
    if signal.len() < win_length {
        return Err(Error::Audio("Signal shorter than one STFT window".into()));
    }

    let window = hann_window(win_length);
    let num_frames = (signal.len() - win_length) / hop_length + 1;
    let n_freqs = n_fft / 2 + 1;

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut stft_matrix = Array2::zeros((n_freqs, num_frames));
    let mut input_buffer = vec![0.0f32; n_fft];
    let mut output_buffer = fft.make_output_vec();

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_length;

        for i in 0..win_length {
            input_buffer[i] = signal[start + i] * window[i];
        }
        input_buffer[win_length..].fill(0.0);

        fft.process(&mut input_buffer, &mut output_buffer)
            .map_err(|e| Error::Audio(format!("FFT failed: {}", e)))?;

        for (freq_idx, &val) in output_buffer.iter().enumerate() {
            stft_matrix[[freq_idx, frame_idx]] = val;
        }
    }

    Ok(stft_matrix)
}

/// Compute power spectrogram from STFT
pub fn power_spectrogram(stft_matrix: &Array2<Complex<f32>>) -> Array2<f32> {
    stft_matrix.mapv(|c| c.norm_sqr())
}

/// Spectral flatness of every frame (column) of a power spectrogram
///
/// Geometric mean over arithmetic mean of the power bins, excluding DC.
/// Result lies in [0, 1]: ~0 for tonal frames, ~1 for white noise.
pub fn spectral_flatness(power: &Array2<f32>) -> Vec<f32> {
    power
        .axis_iter(Axis(1))
        .map(|frame| {
            let bins = frame.slice(ndarray::s![1..]);
            let n = bins.len();
            if n == 0 {
                return 0.0;
            }
            let log_mean = bins.iter().map(|&p| (p + POWER_FLOOR).ln()).sum::<f32>() / n as f32;
            let arith_mean = bins.iter().map(|&p| p + POWER_FLOOR).sum::<f32>() / n as f32;
            (log_mean.exp() / arith_mean).clamp(0.0, 1.0)
        })
        .collect()
}
