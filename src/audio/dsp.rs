//! Digital Signal Processing utilities

/// Floor applied before taking logarithms of amplitudes
pub const AMPLITUDE_FLOOR: f32 = 1e-6;

/// Normalize audio to specific peak value
pub fn normalize_audio_peak(signal: &[f32], peak: f32) -> Vec<f32> {
    if signal.is_empty() {
        return vec![];
    }

    let max_abs = compute_peak(signal);

    if max_abs < 1e-8 {
        return signal.to_vec();
    }

    let scale = peak / max_abs;
    signal.iter().map(|x| x * scale).collect()
}

/// Compute RMS energy
pub fn compute_rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|x| x * x).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Compute peak amplitude
pub fn compute_peak(signal: &[f32]) -> f32 {
    signal.iter().map(|x| x.abs()).fold(0.0f32, f32::max)
}

/// RMS of consecutive non-overlapping frames
///
/// The trailing partial frame is included when non-empty.
pub fn frame_rms(signal: &[f32], frame_len: usize) -> Vec<f32> {
    if frame_len == 0 {
        return vec![];
    }
    signal.chunks(frame_len).map(compute_rms).collect()
}

/// Linear amplitude to decibels, floored at [`AMPLITUDE_FLOOR`]
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    20.0 * amplitude.max(AMPLITUDE_FLOOR).log10()
}

/// Percentile (0..=100) by linear interpolation between closest ranks
///
/// Returns 0.0 for an empty slice.
pub fn percentile(values: &[f32], pct: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
