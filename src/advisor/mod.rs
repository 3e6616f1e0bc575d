//! Per-chunk generation parameters
//!
//! Two independent, deterministic rules:
//! - step count ("how good") from text length band and punctuation
//! - crossfade duration ("how smooth") from the boundary between two chunks
//!
//! Both outputs are always clamped to their configured bounds.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

lazy_static! {
    /// Question / exclamation markers, including Spanish opening marks
    static ref EXPRESSIVE_REGEX: Regex = Regex::new(r"[?!¿¡？！]").unwrap();
    /// A run of sentence-terminal punctuation counts once; decimal points count too
    static ref TERMINAL_RUN_REGEX: Regex = Regex::new(r"[.!?…。！？]+").unwrap();
    /// Punctuation (optionally followed by closing quotes) at the end of a chunk
    static ref PAUSE_AT_END_REGEX: Regex =
        Regex::new(r#"[.!?…。！？,;:，；：—\-]["'”’»)\]]*\s*$"#).unwrap();
}

/// Length band a text falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LengthBand {
    Short,
    Normal,
    Long,
}

/// Tunable constants for both rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Texts with fewer characters than this are `Short`
    pub short_below_chars: usize,
    /// Texts with at least this many characters are `Long`
    pub long_from_chars: usize,
    pub short_steps: u32,
    pub normal_steps: u32,
    pub long_steps: u32,
    /// Added when the text contains a question or exclamation marker
    pub expressive_bonus: u32,
    /// Added when the text holds more than one sentence-terminal run
    pub multi_sentence_bonus: u32,
    pub min_steps: u32,
    pub max_steps: u32,

    pub base_crossfade_seconds: f32,
    /// Multiplier for continuous high-energy boundaries (< 1)
    pub continuous_factor: f32,
    /// Multiplier for boundaries at a natural pause (> 1)
    pub pause_factor: f32,
    pub min_crossfade_seconds: f32,
    pub max_crossfade_seconds: f32,
    /// Tail RMS at or above which speech counts as high energy
    pub high_energy_rms: f32,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            short_below_chars: 50,
            long_from_chars: 200,
            short_steps: 16,
            normal_steps: 24,
            long_steps: 32,
            expressive_bonus: 4,
            multi_sentence_bonus: 4,
            min_steps: 8,
            max_steps: 36,

            base_crossfade_seconds: 0.15,
            continuous_factor: 0.5,
            pause_factor: 1.6,
            min_crossfade_seconds: 0.05,
            max_crossfade_seconds: 0.30,
            high_energy_rms: 0.1,
        }
    }
}

impl AdvisorConfig {
    /// Validate bounds and band ordering
    pub fn validate(&self) -> Result<()> {
        if self.min_steps == 0 || self.min_steps > self.max_steps {
            return Err(Error::Config(format!(
                "Step bounds must satisfy 0 < min <= max (got {}..{})",
                self.min_steps, self.max_steps
            )));
        }
        if self.short_below_chars > self.long_from_chars {
            return Err(Error::Config(
                "short_below_chars must not exceed long_from_chars".into(),
            ));
        }
        if !(self.short_steps <= self.normal_steps && self.normal_steps <= self.long_steps) {
            return Err(Error::Config(
                "Step baselines must be non-decreasing short <= normal <= long".into(),
            ));
        }
        if !(self.min_crossfade_seconds > 0.0
            && self.min_crossfade_seconds <= self.max_crossfade_seconds)
        {
            return Err(Error::Config(format!(
                "Crossfade bounds must satisfy 0 < min <= max (got {}..{})",
                self.min_crossfade_seconds, self.max_crossfade_seconds
            )));
        }
        if self.base_crossfade_seconds <= 0.0
            || self.continuous_factor <= 0.0
            || self.pause_factor <= 0.0
        {
            return Err(Error::Config(
                "Crossfade baseline and factors must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Classify text length in characters
    pub fn band(&self, chars: usize) -> LengthBand {
        if chars < self.short_below_chars {
            LengthBand::Short
        } else if chars < self.long_from_chars {
            LengthBand::Normal
        } else {
            LengthBand::Long
        }
    }

    fn baseline_steps(&self, band: LengthBand) -> u32 {
        match band {
            LengthBand::Short => self.short_steps,
            LengthBand::Normal => self.normal_steps,
            LengthBand::Long => self.long_steps,
        }
    }
}

/// Features of a chunk's text that drive the step rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextFeatures {
    /// Length in characters
    pub chars: usize,
    /// Contains a question or exclamation marker
    pub expressive: bool,
    /// Number of sentence-terminal punctuation runs (`?!` is one, `3.14` is one)
    pub sentence_marks: usize,
}

impl TextFeatures {
    pub fn extract(text: &str) -> Self {
        Self {
            chars: text.chars().count(),
            expressive: EXPRESSIVE_REGEX.is_match(text),
            sentence_marks: TERMINAL_RUN_REGEX.find_iter(text).count(),
        }
    }
}

/// Step count for `text`
///
/// Baseline by length band, plus the expressive and multi-sentence bonuses,
/// clamped to `[min_steps, max_steps]`.
pub fn advise_steps(text: &str, config: &AdvisorConfig) -> u32 {
    steps_for_features(&TextFeatures::extract(text), config)
}

/// Step count from precomputed features
pub fn steps_for_features(features: &TextFeatures, config: &AdvisorConfig) -> u32 {
    let mut steps = config.baseline_steps(config.band(features.chars));
    if features.expressive {
        steps = steps.saturating_add(config.expressive_bonus);
    }
    if features.sentence_marks > 1 {
        steps = steps.saturating_add(config.multi_sentence_bonus);
    }
    steps.clamp(config.min_steps, config.max_steps.max(config.min_steps))
}

/// How two adjacent chunks meet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// The first chunk ends at a natural pause marker
    Pause,
    /// Speech runs through the cut at high energy
    Continuous,
    /// No pause marker, but energy is low or unknown
    Neutral,
}

/// Context around the seam between two chunks
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossfadeContext<'a> {
    /// Text of the chunk before the seam
    pub preceding: &'a str,
    /// Text of the chunk after the seam
    pub following: &'a str,
    /// RMS of the last few tens of milliseconds before the seam, if known
    pub tail_rms: Option<f32>,
}

impl<'a> CrossfadeContext<'a> {
    pub fn between(preceding: &'a str, following: &'a str) -> Self {
        Self {
            preceding,
            following,
            tail_rms: None,
        }
    }

    pub fn with_tail_rms(mut self, rms: f32) -> Self {
        self.tail_rms = Some(rms);
        self
    }

    /// Classify the seam
    ///
    /// Without audio context a seam that lacks a pause marker is treated as
    /// continuous speech.
    pub fn boundary(&self, config: &AdvisorConfig) -> Boundary {
        if PAUSE_AT_END_REGEX.is_match(self.preceding) {
            return Boundary::Pause;
        }
        match self.tail_rms {
            Some(rms) if rms < config.high_energy_rms => Boundary::Neutral,
            _ => Boundary::Continuous,
        }
    }
}

/// Crossfade duration in seconds for the seam described by `context`
pub fn advise_crossfade(context: &CrossfadeContext<'_>, config: &AdvisorConfig) -> f32 {
    let factor = match context.boundary(config) {
        Boundary::Pause => config.pause_factor,
        Boundary::Continuous => config.continuous_factor,
        Boundary::Neutral => 1.0,
    };
    let seconds = config.base_crossfade_seconds * factor;
    let (lo, hi) = (
        config.min_crossfade_seconds,
        config.max_crossfade_seconds.max(config.min_crossfade_seconds),
    );
    if seconds.is_finite() {
        seconds.clamp(lo, hi)
    } else {
        hi
    }
}
