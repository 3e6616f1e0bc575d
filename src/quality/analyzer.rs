//! Scalar quality metrics for a single buffer
//!
//! Five metrics are measured independently on short frames, then combined
//! into a 0..100 score by subtracting a bounded penalty for every violated
//! threshold. Each violation also contributes one issue and one
//! recommendation string, in a fixed order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::audio::{
    amplitude_to_db, compute_rms, frame_rms, percentile, power_spectrogram, stft, AudioBuffer,
};
use crate::{Error, Result};

/// Discrete quality level, ordered worst to best
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    #[default]
    Unacceptable,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityLevel {
    pub fn name(&self) -> &'static str {
        match self {
            QualityLevel::Unacceptable => "unacceptable",
            QualityLevel::Poor => "poor",
            QualityLevel::Fair => "fair",
            QualityLevel::Good => "good",
            QualityLevel::Excellent => "excellent",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QualityLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unacceptable" => Ok(QualityLevel::Unacceptable),
            "poor" => Ok(QualityLevel::Poor),
            "fair" => Ok(QualityLevel::Fair),
            "good" => Ok(QualityLevel::Good),
            "excellent" => Ok(QualityLevel::Excellent),
            other => Err(Error::Config(format!("Unknown quality level: {}", other))),
        }
    }
}

/// Thresholds, penalty caps and level cutoffs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Analysis frame length in seconds
    pub frame_seconds: f32,
    /// Fraction of frames (lowest RMS first) that estimate the noise floor
    pub noise_floor_fraction: f32,

    /// |sample| at or above this counts as clipped
    pub clip_level: f32,
    /// Clipping rate above this is an issue
    pub max_clipping_rate: f32,
    /// Frame RMS below this counts as silence
    pub silence_rms: f32,
    /// Silence ratio above this is an issue
    pub max_silence_ratio: f32,
    /// SNR below this (dB) is an issue
    pub good_snr_db: f32,
    /// Dynamic range below this (dB) is an issue
    pub min_dynamic_range_db: f32,
    /// Upper / lower percentiles of frame RMS used for dynamic range
    pub dynamic_range_percentiles: (f32, f32),
    /// Mean spectral flatness above this is an issue
    pub max_spectral_flatness: f32,

    pub excellent_from: f32,
    pub good_from: f32,
    pub fair_from: f32,
    pub poor_from: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            frame_seconds: 0.025,
            noise_floor_fraction: 0.1,
            clip_level: 0.99,
            max_clipping_rate: 0.001,
            silence_rms: 0.01,
            max_silence_ratio: 0.4,
            good_snr_db: 20.0,
            min_dynamic_range_db: 6.0,
            dynamic_range_percentiles: (95.0, 10.0),
            max_spectral_flatness: 0.4,
            excellent_from: 85.0,
            good_from: 70.0,
            fair_from: 50.0,
            poor_from: 30.0,
        }
    }
}

// Penalty caps; their sum exceeds 100 so a buffer failing everything scores 0
const SNR_PENALTY_MAX: f32 = 30.0;
const SNR_PENALTY_PER_DB: f32 = 1.5;
const CLIPPING_PENALTY_BASE: f32 = 10.0;
const CLIPPING_PENALTY_PER_UNIT: f32 = 2000.0;
const CLIPPING_PENALTY_MAX: f32 = 30.0;
const SILENCE_PENALTY_PER_UNIT: f32 = 100.0;
const SILENCE_PENALTY_MAX: f32 = 35.0;
const DYNAMIC_RANGE_PENALTY_PER_DB: f32 = 2.5;
const DYNAMIC_RANGE_PENALTY_MAX: f32 = 15.0;
const FLATNESS_PENALTY_PER_UNIT: f32 = 60.0;
const FLATNESS_PENALTY_MAX: f32 = 20.0;

/// SNR reported when no noise floor is measurable
const MAX_SNR_DB: f32 = 120.0;

impl QualityThresholds {
    /// Validate ranges and cutoff ordering
    pub fn validate(&self) -> Result<()> {
        if !self.frame_seconds.is_finite() || self.frame_seconds <= 0.0 {
            return Err(Error::Config("frame_seconds must be > 0".into()));
        }
        if !(self.noise_floor_fraction > 0.0 && self.noise_floor_fraction <= 1.0) {
            return Err(Error::Config("noise_floor_fraction must be in (0, 1]".into()));
        }
        let (hi, lo) = self.dynamic_range_percentiles;
        if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo >= hi {
            return Err(Error::Config(
                "dynamic_range_percentiles must be (high, low) within 0..=100".into(),
            ));
        }
        if !(self.excellent_from >= self.good_from
            && self.good_from >= self.fair_from
            && self.fair_from >= self.poor_from)
        {
            return Err(Error::Config("Level cutoffs must be descending".into()));
        }
        Ok(())
    }

    /// Samples per analysis frame at `sample_rate`
    pub fn frame_len(&self, sample_rate: u32) -> usize {
        ((self.frame_seconds as f64 * sample_rate as f64).round() as usize).max(1)
    }

    /// Map a score to a level
    pub fn level_for(&self, score: f32) -> QualityLevel {
        if score >= self.excellent_from {
            QualityLevel::Excellent
        } else if score >= self.good_from {
            QualityLevel::Good
        } else if score >= self.fair_from {
            QualityLevel::Fair
        } else if score >= self.poor_from {
            QualityLevel::Poor
        } else {
            QualityLevel::Unacceptable
        }
    }
}

/// Result of analyzing one buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub snr_db: f32,
    pub clipping_rate: f32,
    pub silence_ratio: f32,
    pub dynamic_range_db: f32,
    pub spectral_flatness: f32,
    /// Composite score in [0, 100]
    pub overall_score: f32,
    pub level: QualityLevel,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    /// The buffer was shorter than one analysis frame
    pub insufficient_data: bool,
}

impl QualityMetrics {
    fn insufficient(len: usize, frame_len: usize, sample_rate: u32) -> Self {
        Self {
            snr_db: 0.0,
            clipping_rate: 0.0,
            silence_ratio: 0.0,
            dynamic_range_db: 0.0,
            spectral_flatness: 0.0,
            overall_score: 0.0,
            level: QualityLevel::Unacceptable,
            issues: vec![format!(
                "Insufficient data: {} samples, need at least {} for one analysis frame",
                len, frame_len
            )],
            recommendations: vec![format!(
                "Provide at least {:.0} ms of audio",
                frame_len as f32 * 1000.0 / sample_rate as f32
            )],
            insufficient_data: true,
        }
    }

    /// Level is at least `minimum`
    pub fn meets(&self, minimum: QualityLevel) -> bool {
        self.level >= minimum
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Multi-line human-readable report
    pub fn report(&self) -> String {
        let mut out = format!(
            "Quality: {} ({:.1}/100)\n  SNR: {:.1} dB\n  Clipping: {:.3}%\n  Silence: {:.1}%\n  Dynamic range: {:.1} dB\n  Spectral flatness: {:.3}\n",
            self.level,
            self.overall_score,
            self.snr_db,
            self.clipping_rate * 100.0,
            self.silence_ratio * 100.0,
            self.dynamic_range_db,
            self.spectral_flatness,
        );
        for issue in &self.issues {
            out.push_str(&format!("  ! {}\n", issue));
        }
        for rec in &self.recommendations {
            out.push_str(&format!("  > {}\n", rec));
        }
        out
    }
}

/// Stateless analyzer holding its thresholds
#[derive(Debug, Clone, Default)]
pub struct QualityAnalyzer {
    thresholds: QualityThresholds,
}

impl QualityAnalyzer {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Analyze a buffer
    ///
    /// Never fails: a buffer shorter than one frame yields an `Unacceptable`
    /// result flagged `insufficient_data`.
    pub fn analyze(&self, buffer: &AudioBuffer) -> QualityMetrics {
        let t = &self.thresholds;
        let samples = buffer.as_slice();
        let frame_len = t.frame_len(buffer.sample_rate);

        if samples.len() < frame_len {
            return QualityMetrics::insufficient(samples.len(), frame_len, buffer.sample_rate);
        }

        let frames = frame_rms(samples, frame_len);

        let snr_db = self.snr_db(samples, &frames);
        let clipping_rate = self.clipping_rate(samples);
        let silence_ratio = self.silence_ratio(samples, frame_len, &frames);
        let dynamic_range_db = self.dynamic_range_db(&frames);
        let spectral_flatness = self.spectral_flatness(samples, frame_len, &frames);

        let mut score = 100.0f32;
        let mut issues = Vec::new();
        let mut recommendations = Vec::new();

        if snr_db < t.good_snr_db {
            score -= ((t.good_snr_db - snr_db) * SNR_PENALTY_PER_DB).min(SNR_PENALTY_MAX);
            issues.push(format!(
                "Low signal-to-noise ratio: {:.1} dB (target >= {:.1} dB)",
                snr_db, t.good_snr_db
            ));
            recommendations.push(
                "Record the reference in a quieter room or apply noise reduction".to_string(),
            );
        }

        if clipping_rate > t.max_clipping_rate {
            score -= (CLIPPING_PENALTY_BASE + clipping_rate * CLIPPING_PENALTY_PER_UNIT)
                .min(CLIPPING_PENALTY_MAX);
            issues.push(format!(
                "Clipping detected: {:.3}% of samples at or above {:.2} full scale",
                clipping_rate * 100.0,
                t.clip_level
            ));
            recommendations
                .push("Reduce input gain or normalize peaks to around -1 dBFS".to_string());
        }

        if silence_ratio > t.max_silence_ratio {
            score -= ((silence_ratio - t.max_silence_ratio) * SILENCE_PENALTY_PER_UNIT)
                .min(SILENCE_PENALTY_MAX);
            issues.push(format!(
                "Excessive silence: {:.1}% of the audio is below the silence threshold",
                silence_ratio * 100.0
            ));
            recommendations
                .push("Trim leading, trailing and long internal pauses".to_string());
        }

        if dynamic_range_db < t.min_dynamic_range_db {
            score -= ((t.min_dynamic_range_db - dynamic_range_db) * DYNAMIC_RANGE_PENALTY_PER_DB)
                .min(DYNAMIC_RANGE_PENALTY_MAX);
            issues.push(format!(
                "Narrow dynamic range: {:.1} dB (target >= {:.1} dB)",
                dynamic_range_db, t.min_dynamic_range_db
            ));
            recommendations.push(
                "Avoid heavy compression or limiting; use natural, expressive speech".to_string(),
            );
        }

        if spectral_flatness > t.max_spectral_flatness {
            score -= ((spectral_flatness - t.max_spectral_flatness) * FLATNESS_PENALTY_PER_UNIT)
                .min(FLATNESS_PENALTY_MAX);
            issues.push(format!(
                "Noise-like spectrum: flatness {:.2} (target <= {:.2})",
                spectral_flatness, t.max_spectral_flatness
            ));
            recommendations
                .push("Use a clean speech recording without broadband noise or music".to_string());
        }

        let overall_score = score.clamp(0.0, 100.0);

        QualityMetrics {
            snr_db,
            clipping_rate,
            silence_ratio,
            dynamic_range_db,
            spectral_flatness,
            overall_score,
            level: t.level_for(overall_score),
            issues,
            recommendations,
            insufficient_data: false,
        }
    }

    /// Overall RMS against the mean RMS of the quietest frames
    fn snr_db(&self, samples: &[f32], frames: &[f32]) -> f32 {
        let signal = compute_rms(samples);
        if signal < self.thresholds.silence_rms {
            return 0.0;
        }

        let mut sorted = frames.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let take = ((sorted.len() as f32 * self.thresholds.noise_floor_fraction).ceil() as usize)
            .clamp(1, sorted.len());
        let noise = sorted[..take].iter().sum::<f32>() / take as f32;

        (amplitude_to_db(signal) - amplitude_to_db(noise)).clamp(0.0, MAX_SNR_DB)
    }

    fn clipping_rate(&self, samples: &[f32]) -> f32 {
        let clipped = samples
            .iter()
            .filter(|s| s.abs() >= self.thresholds.clip_level)
            .count();
        clipped as f32 / samples.len() as f32
    }

    /// Fraction of samples lying in frames whose RMS is below the silence level
    fn silence_ratio(&self, samples: &[f32], frame_len: usize, frames: &[f32]) -> f32 {
        let silent: usize = samples
            .chunks(frame_len)
            .zip(frames)
            .filter(|&(_, &rms)| rms < self.thresholds.silence_rms)
            .map(|(chunk, _)| chunk.len())
            .sum();
        silent as f32 / samples.len() as f32
    }

    fn dynamic_range_db(&self, frames: &[f32]) -> f32 {
        let (hi, lo) = self.thresholds.dynamic_range_percentiles;
        (amplitude_to_db(percentile(frames, hi)) - amplitude_to_db(percentile(frames, lo)))
            .max(0.0)
    }

    /// Mean flatness over non-silent full frames; 0 when every frame is silent
    ///
    /// Silent frames are skipped so gaps between words do not read as noise.
    fn spectral_flatness(&self, samples: &[f32], frame_len: usize, frames: &[f32]) -> f32 {
        let n_fft = frame_len.next_power_of_two();
        let power = match stft(samples, n_fft, frame_len, frame_len) {
            Ok(spec) => power_spectrogram(&spec),
            Err(e) => {
                log::debug!("Spectral flatness unavailable: {}", e);
                return 0.0;
            }
        };

        let voiced: Vec<f32> = crate::audio::spectrum::spectral_flatness(&power)
            .into_iter()
            .zip(frames)
            .filter(|&(_, &rms)| rms >= self.thresholds.silence_rms)
            .map(|(flatness, _)| flatness)
            .collect();

        if voiced.is_empty() {
            0.0
        } else {
            voiced.iter().sum::<f32>() / voiced.len() as f32
        }
    }
}

/// Analyze with default thresholds
pub fn analyze(buffer: &AudioBuffer) -> QualityMetrics {
    QualityAnalyzer::default().analyze(buffer)
}
