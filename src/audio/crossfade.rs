//! Crossfading and edge fades
//!
//! Adjacent buffers are merged by overlapping the last `n` samples of the
//! first with the first `n` samples of the second under complementary
//! fade-out / fade-in weights:
//!
//! ```text
//! a[..la-n] ++ (a[la-n..] * out + b[..n] * in) ++ b[n..]
//! ```
//!
//! Fade curves depend only on the fade law and their length, so they are
//! memoized in a [`FadeCurveCache`]. The free functions share one
//! process-wide cache.

use crate::{Error, Result};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::buffer::seconds_to_samples;
use super::AudioBuffer;

/// Fade law used to build a [`FadeCurve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeLaw {
    /// `cos`/`sin` quarter period; squared weights sum to 1 (constant energy)
    #[default]
    EqualPower,
    /// Hann half period; weights sum to 1 with zero slope at the endpoints
    RaisedCosine,
    /// Straight ramps; dips ~3 dB at the midpoint for uncorrelated signals
    Linear,
}

impl FadeLaw {
    /// All laws, in declaration order
    pub const ALL: [FadeLaw; 3] = [FadeLaw::EqualPower, FadeLaw::RaisedCosine, FadeLaw::Linear];

    /// Configuration / CLI name
    pub fn name(&self) -> &'static str {
        match self {
            FadeLaw::EqualPower => "equal_power",
            FadeLaw::RaisedCosine => "raised_cosine",
            FadeLaw::Linear => "linear",
        }
    }

    /// (out, in) weights at normalized position `t` in [0, 1]
    fn weights(&self, t: f32) -> (f32, f32) {
        match self {
            FadeLaw::EqualPower => {
                let theta = t * PI / 2.0;
                (theta.cos(), theta.sin())
            }
            FadeLaw::RaisedCosine => {
                let out = 0.5 * (1.0 + (t * PI).cos());
                (out, 1.0 - out)
            }
            FadeLaw::Linear => (1.0 - t, t),
        }
    }
}

impl fmt::Display for FadeLaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FadeLaw {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "equal_power" | "equalpower" | "constant_power" => Ok(FadeLaw::EqualPower),
            "raised_cosine" | "raisedcosine" | "hann" => Ok(FadeLaw::RaisedCosine),
            "linear" => Ok(FadeLaw::Linear),
            other => Err(Error::Config(format!("Unknown fade law: {}", other))),
        }
    }
}

/// Precomputed complementary weight pair of equal length
#[derive(Debug, Clone, PartialEq)]
pub struct FadeCurve {
    law: FadeLaw,
    fade_out: Vec<f32>,
    fade_in: Vec<f32>,
}

impl FadeCurve {
    /// Build a curve of `len` samples
    ///
    /// Position `i` maps to `t = i / max(len - 1, 1)`, so a one-sample curve
    /// is `out = [1], in = [0]` (a hard cut) rather than a division by zero.
    pub fn new(law: FadeLaw, len: usize) -> Self {
        let denom = len.saturating_sub(1).max(1) as f32;
        let (fade_out, fade_in): (Vec<f32>, Vec<f32>) = (0..len).map(|i| law.weights(i as f32 / denom)).unzip();
        Self {
            law,
            fade_out,
            fade_in,
        }
    }

    pub fn law(&self) -> FadeLaw {
        self.law
    }

    pub fn len(&self) -> usize {
        self.fade_out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fade_out.is_empty()
    }

    /// Weights applied to the outgoing buffer (1 -> 0)
    pub fn fade_out(&self) -> &[f32] {
        &self.fade_out
    }

    /// Weights applied to the incoming buffer (0 -> 1)
    pub fn fade_in(&self) -> &[f32] {
        &self.fade_in
    }
}

/// Thread-safe memo of fade curves keyed by (law, length)
///
/// Length is `round(duration * sample_rate)`, so this is equivalent to keying by
/// (law, duration, sample rate). Entries never go stale and are never evicted;
/// a long-lived process that sees many distinct lengths can call
/// [`FadeCurveCache::clear`].
#[derive(Debug, Default)]
pub struct FadeCurveCache {
    curves: RwLock<HashMap<(FadeLaw, usize), Arc<FadeCurve>>>,
}

impl FadeCurveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or build the curve for `law` with `len` samples
    pub fn get(&self, law: FadeLaw, len: usize) -> Arc<FadeCurve> {
        if let Some(curve) = self.curves.read().get(&(law, len)) {
            return Arc::clone(curve);
        }

        let mut curves = self.curves.write();
        Arc::clone(
            curves
                .entry((law, len))
                .or_insert_with(|| Arc::new(FadeCurve::new(law, len))),
        )
    }

    /// Number of cached curves
    pub fn len(&self) -> usize {
        self.curves.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached curve; handles already given out stay valid
    pub fn clear(&self) {
        self.curves.write().clear();
    }

    /// Merge two buffers, consuming both. See [`crossfade`].
    pub fn crossfade(
        &self,
        a: AudioBuffer,
        b: AudioBuffer,
        duration_seconds: f32,
        law: FadeLaw,
    ) -> Result<AudioBuffer> {
        if a.is_empty() || b.is_empty() {
            return Err(Error::Crossfade(format!(
                "Cannot crossfade an empty buffer (lengths {} and {})",
                a.len(),
                b.len()
            )));
        }
        if a.sample_rate != b.sample_rate {
            return Err(Error::Crossfade(format!(
                "Sample rate mismatch: {} Hz vs {} Hz",
                a.sample_rate, b.sample_rate
            )));
        }

        let n = seconds_to_samples(duration_seconds, a.sample_rate)
            .clamp(1, a.len().min(b.len()));
        let curve = self.get(law, n);

        let sample_rate = a.sample_rate;
        let mut out = a.samples;
        out.reserve(b.len() - n);

        let split = out.len() - n;
        for (i, (&w_out, &w_in)) in curve.fade_out().iter().zip(curve.fade_in()).enumerate() {
            out[split + i] = out[split + i] * w_out + b.samples[i] * w_in;
        }
        out.extend_from_slice(&b.samples[n..]);

        Ok(AudioBuffer {
            samples: out,
            sample_rate,
        })
    }

    /// Ramp the first and last samples of a buffer from / to zero.
    /// See [`apply_edge_fades`].
    pub fn apply_edge_fades(
        &self,
        mut buffer: AudioBuffer,
        fade_seconds: f32,
        law: FadeLaw,
    ) -> AudioBuffer {
        let n = seconds_to_samples(fade_seconds, buffer.sample_rate).min(buffer.len() / 2);
        if n == 0 {
            return buffer;
        }

        let curve = self.get(law, n);
        let len = buffer.len();

        for (sample, &w) in buffer.samples[..n].iter_mut().zip(curve.fade_in()) {
            *sample *= w;
        }
        for (sample, &w) in buffer.samples[len - n..].iter_mut().zip(curve.fade_out()) {
            *sample *= w;
        }

        buffer
    }
}

lazy_static! {
    static ref FADE_CURVES: FadeCurveCache = FadeCurveCache::new();
}

/// Fetch a curve from the shared cache
pub fn fade_curve(law: FadeLaw, len: usize) -> Arc<FadeCurve> {
    FADE_CURVES.get(law, len)
}

/// Merge two adjacent buffers into one
///
/// The overlap is `round(duration_seconds * sample_rate)` samples, clamped to
/// `[1, min(len(a), len(b))]`; the result has `len(a) + len(b) - n` samples.
///
/// # Errors
/// * either buffer is empty
/// * the buffers have different sample rates
pub fn crossfade(
    a: AudioBuffer,
    b: AudioBuffer,
    duration_seconds: f32,
    law: FadeLaw,
) -> Result<AudioBuffer> {
    FADE_CURVES.crossfade(a, b, duration_seconds, law)
}

/// Fade the start of a buffer in and its end out to suppress clicks
///
/// The fade covers `round(fade_seconds * sample_rate)` samples at each end,
/// capped at half the buffer. A zero duration leaves the buffer untouched.
pub fn apply_edge_fades(buffer: AudioBuffer, fade_seconds: f32, law: FadeLaw) -> AudioBuffer {
    FADE_CURVES.apply_edge_fades(buffer, fade_seconds, law)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn buffer(value: f32, len: usize, sr: u32) -> AudioBuffer {
        AudioBuffer::new(vec![value; len], sr).unwrap()
    }

    #[test]
    fn test_equal_power_preserves_energy() {
        for len in [1, 2, 3, 17, 480, 12000] {
            let curve = FadeCurve::new(FadeLaw::EqualPower, len);
            for (o, i) in curve.fade_out().iter().zip(curve.fade_in()) {
                assert_abs_diff_eq!(o * o + i * i, 1.0, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_complementary_laws_sum_to_one() {
        for law in [FadeLaw::RaisedCosine, FadeLaw::Linear] {
            let curve = FadeCurve::new(law, 101);
            for (o, i) in curve.fade_out().iter().zip(curve.fade_in()) {
                assert_abs_diff_eq!(o + i, 1.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_curve_endpoints() {
        for law in FadeLaw::ALL {
            let curve = FadeCurve::new(law, 64);
            assert_abs_diff_eq!(curve.fade_out()[0], 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(curve.fade_in()[0], 0.0, epsilon = 1e-6);
            assert_abs_diff_eq!(curve.fade_out()[63], 0.0, epsilon = 1e-6);
            assert_abs_diff_eq!(curve.fade_in()[63], 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_single_sample_curve_is_hard_cut() {
        let curve = FadeCurve::new(FadeLaw::Linear, 1);
        assert_eq!(curve.fade_out(), &[1.0]);
        assert_eq!(curve.fade_in(), &[0.0]);
    }

    #[test]
    fn test_crossfade_length() {
        let a = buffer(0.5, 24000, 24000);
        let b = buffer(0.5, 24000, 24000);
        let merged = crossfade(a, b, 0.5, FadeLaw::EqualPower).unwrap();
        assert_eq!(merged.len(), 24000 + 24000 - 12000);
        assert_eq!(merged.sample_rate, 24000);
    }

    #[test]
    fn test_crossfade_overlap_is_clamped() {
        let a = buffer(1.0, 100, 1000);
        let b = buffer(1.0, 40, 1000);
        let merged = crossfade(a, b, 10.0, FadeLaw::Linear).unwrap();
        assert_eq!(merged.len(), 100);
    }

    #[test]
    fn test_zero_duration_is_single_sample_cut() {
        let a = buffer(1.0, 10, 1000);
        let b = buffer(-1.0, 10, 1000);
        let merged = crossfade(a, b, 0.0, FadeLaw::EqualPower).unwrap();
        assert_eq!(merged.len(), 19);
        assert_eq!(merged.samples[9], 1.0);
        assert_eq!(merged.samples[10], -1.0);
    }

    #[test]
    fn test_crossfade_untouched_regions() {
        let a = AudioBuffer::new((0..100).map(|i| i as f32).collect(), 1000).unwrap();
        let b = AudioBuffer::new((0..100).map(|i| -(i as f32)).collect(), 1000).unwrap();
        let merged = crossfade(a, b, 0.01, FadeLaw::RaisedCosine).unwrap();
        assert_eq!(merged.len(), 190);
        assert_eq!(merged.samples[..90], (0..90).map(|i| i as f32).collect::<Vec<_>>()[..]);
        assert_eq!(merged.samples[100..], (10..100).map(|i| -(i as f32)).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn test_linear_crossfade_of_equal_constants_is_constant() {
        let merged = crossfade(buffer(0.3, 50, 1000), buffer(0.3, 50, 1000), 0.02, FadeLaw::Linear)
            .unwrap();
        for s in merged.samples {
            assert_abs_diff_eq!(s, 0.3, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_empty_buffer_rejected() {
        let err = crossfade(buffer(0.0, 0, 1000), buffer(1.0, 10, 1000), 0.1, FadeLaw::Linear);
        assert!(matches!(err, Err(Error::Crossfade(_))));
        let err = crossfade(buffer(1.0, 10, 1000), buffer(0.0, 0, 1000), 0.1, FadeLaw::Linear);
        assert!(matches!(err, Err(Error::Crossfade(_))));
    }

    #[test]
    fn test_sample_rate_mismatch_rejected() {
        let err = crossfade(buffer(1.0, 10, 1000), buffer(1.0, 10, 2000), 0.001, FadeLaw::Linear);
        assert!(matches!(err, Err(Error::Crossfade(_))));
    }

    #[test]
    fn test_edge_fades_ramp_ends() {
        let faded = apply_edge_fades(buffer(1.0, 1000, 1000), 0.1, FadeLaw::RaisedCosine);
        assert_eq!(faded.len(), 1000);
        assert_abs_diff_eq!(faded.samples[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(faded.samples[999], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(faded.samples[500], 1.0, epsilon = 1e-6);
        assert!(faded.samples[50] > 0.0 && faded.samples[50] < 1.0);
    }

    #[test]
    fn test_edge_fade_zero_duration_is_identity() {
        let original = AudioBuffer::new((0..200).map(|i| (i as f32 * 0.1).sin()).collect(), 1000)
            .unwrap();
        let faded = apply_edge_fades(original.clone(), 0.02, FadeLaw::EqualPower);
        let again = apply_edge_fades(faded.clone(), 0.0, FadeLaw::EqualPower);
        assert_eq!(again, faded);
        assert_ne!(faded, original);
    }

    #[test]
    fn test_edge_fade_capped_at_half_buffer() {
        let faded = apply_edge_fades(buffer(1.0, 10, 1000), 1.0, FadeLaw::Linear);
        assert_eq!(faded.len(), 10);
        assert_eq!(faded.samples[0], 0.0);
        assert_eq!(faded.samples[9], 0.0);
    }

    #[test]
    fn test_edge_fade_on_empty_buffer() {
        let faded = apply_edge_fades(buffer(0.0, 0, 1000), 0.1, FadeLaw::Linear);
        assert!(faded.is_empty());
    }

    #[test]
    fn test_cache_reuses_curves() {
        let cache = FadeCurveCache::new();
        let a = cache.get(FadeLaw::EqualPower, 256);
        let b = cache.get(FadeLaw::EqualPower, 256);
        assert!(Arc::ptr_eq(&a, &b));
        cache.get(FadeLaw::Linear, 256);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_clear_keeps_outstanding_curves() {
        let cache = FadeCurveCache::new();
        let held = cache.get(FadeLaw::Linear, 64);
        cache.get(FadeLaw::RaisedCosine, 32);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(held.len(), 64);

        let rebuilt = cache.get(FadeLaw::Linear, 64);
        assert!(!Arc::ptr_eq(&held, &rebuilt));
        assert_eq!(rebuilt.fade_out(), held.fade_out());
    }

    #[test]
    fn test_fade_law_parsing() {
        assert_eq!("equal-power".parse::<FadeLaw>().unwrap(), FadeLaw::EqualPower);
        assert_eq!("Raised_Cosine".parse::<FadeLaw>().unwrap(), FadeLaw::RaisedCosine);
        assert_eq!("linear".parse::<FadeLaw>().unwrap(), FadeLaw::Linear);
        assert!("cubic".parse::<FadeLaw>().is_err());
    }
}
