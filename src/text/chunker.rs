//! Chunking strategies
//!
//! All strategies produce chunks that tile the input: ordered, contiguous,
//! and only whitespace between them (see [`super::covers`]). Budgets are in
//! characters, not bytes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{sentence_spans, TextChunk};

/// Strategy selector used in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Greedy packing of whole sentences
    Sentence,
    /// Fixed character windows, cut at whitespace when possible
    Fixed,
    /// Sentence packing with a budget derived from the reference clip
    #[default]
    Adaptive,
}

impl ChunkingStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ChunkingStrategy::Sentence => "sentence",
            ChunkingStrategy::Fixed => "fixed",
            ChunkingStrategy::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChunkingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentence" | "sentences" => Ok(ChunkingStrategy::Sentence),
            "fixed" | "fixed_length" | "fixed-length" => Ok(ChunkingStrategy::Fixed),
            "adaptive" => Ok(ChunkingStrategy::Adaptive),
            other => Err(Error::Config(format!("Unknown chunking strategy: {}", other))),
        }
    }
}

/// Speaking rate demonstrated by the reference clip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceProfile {
    /// Reference audio duration in seconds
    pub audio_seconds: f32,
    /// Reference transcript length in characters
    pub text_chars: usize,
}

impl ReferenceProfile {
    pub fn new(audio_seconds: f32, reference_text: &str) -> Self {
        Self {
            audio_seconds,
            text_chars: reference_text.chars().count(),
        }
    }

    /// Characters per second, if the clip is long enough to measure
    ///
    /// A missing transcript gives no rate rather than a rate of zero.
    pub fn chars_per_second(&self, min_seconds: f32) -> Option<f32> {
        if self.text_chars == 0
            || !self.audio_seconds.is_finite()
            || self.audio_seconds < min_seconds
            || self.audio_seconds <= 0.0
        {
            return None;
        }

        let rate = self.text_chars as f32 / self.audio_seconds;
        (rate.is_finite() && rate > 0.0).then_some(rate)
    }
}

/// Constants for the adaptive budget
///
/// `max_chars = clamp(scale * chars_per_second * target_chunk_seconds, min_chars, max_chars_ceiling)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveBudget {
    /// Multiplier `k` applied to the measured speaking rate
    pub scale: f32,
    /// Audio duration each chunk should roughly produce
    pub target_chunk_seconds: f32,
    /// Lower clamp for the derived budget
    pub min_chars: usize,
    /// Upper clamp for the derived budget
    pub max_chars_ceiling: usize,
    /// References shorter than this fall back to the caller's budget
    pub min_reference_seconds: f32,
}

impl Default for AdaptiveBudget {
    fn default() -> Self {
        Self {
            scale: 1.0,
            target_chunk_seconds: 10.0,
            min_chars: 50,
            max_chars_ceiling: 400,
            min_reference_seconds: 0.5,
        }
    }
}

impl AdaptiveBudget {
    /// Budget for `reference`, or `fallback` when the clip is too short
    pub fn max_chars(&self, reference: &ReferenceProfile, fallback: usize) -> usize {
        match reference.chars_per_second(self.min_reference_seconds) {
            Some(rate) => {
                let raw = self.scale * rate * self.target_chunk_seconds;
                let raw = if raw.is_finite() { raw.round().max(0.0) as usize } else { 0 };
                raw.clamp(self.min_chars, self.max_chars_ceiling.max(self.min_chars))
            }
            None => fallback,
        }
    }
}

/// Interchangeable chunking strategies
#[derive(Debug, Clone, PartialEq)]
pub enum Chunker {
    Sentence,
    Fixed {
        /// How far back from a hard cut to look for whitespace
        lookback: usize,
    },
    Adaptive {
        reference: ReferenceProfile,
        budget: AdaptiveBudget,
    },
}

impl Chunker {
    /// Which strategy this chunker implements
    pub fn strategy(&self) -> ChunkingStrategy {
        match self {
            Chunker::Sentence => ChunkingStrategy::Sentence,
            Chunker::Fixed { .. } => ChunkingStrategy::Fixed,
            Chunker::Adaptive { .. } => ChunkingStrategy::Adaptive,
        }
    }

    /// Budget actually used for a requested `max_chars`
    ///
    /// Only the adaptive strategy overrides the request, and only when the
    /// reference clip is long enough to measure a speaking rate.
    pub fn effective_max_chars(&self, max_chars: usize) -> usize {
        match self {
            Chunker::Adaptive { reference, budget } => budget.max_chars(reference, max_chars),
            _ => max_chars,
        }
    }

    /// Split `text` into chunks of at most `max_chars` characters where possible
    ///
    /// Empty or whitespace-only text yields no chunks.
    ///
    /// # Errors
    /// `max_chars` is zero.
    pub fn chunk(&self, text: &str, max_chars: usize) -> Result<Vec<TextChunk>> {
        validate_budget(max_chars)?;

        let chunks = match self {
            Chunker::Sentence => chunk_sentences(text, max_chars)?,
            Chunker::Fixed { lookback } => chunk_fixed(text, max_chars, *lookback)?,
            Chunker::Adaptive { .. } => {
                let budget = self.effective_max_chars(max_chars);
                log::debug!("Adaptive chunk budget: {} chars", budget);
                chunk_sentences(text, budget)?
            }
        };

        debug_assert!(super::covers(text, &chunks));
        Ok(chunks)
    }
}

fn validate_budget(max_chars: usize) -> Result<()> {
    if max_chars == 0 {
        return Err(Error::Chunking("max_chars must be >= 1".into()));
    }
    Ok(())
}

/// Greedily pack consecutive sentences while the packed length fits `max_chars`
///
/// A sentence longer than the budget becomes its own oversized chunk; text is
/// never truncated.
pub fn chunk_sentences(text: &str, max_chars: usize) -> Result<Vec<TextChunk>> {
    validate_budget(max_chars)?;

    let mut chunks = Vec::new();
    let mut current: Option<(usize, usize, usize)> = None; // (start, end, chars)

    for span in sentence_spans(text) {
        let span_chars = text[span.clone()].chars().count();

        current = match current {
            None => Some((span.start, span.end, span_chars)),
            Some((start, end, chars)) => {
                let gap_chars = text[end..span.start].chars().count();
                let packed = chars + gap_chars + span_chars;
                if packed <= max_chars {
                    Some((start, span.end, packed))
                } else {
                    chunks.push(TextChunk::new(chunks.len(), start, &text[start..end]));
                    Some((span.start, span.end, span_chars))
                }
            }
        };
    }

    if let Some((start, end, _)) = current {
        chunks.push(TextChunk::new(chunks.len(), start, &text[start..end]));
    }

    Ok(chunks)
}

/// Cut every `max_chars` characters, backing up to whitespace within `lookback`
///
/// If no whitespace lies in the look-back window the cut falls mid-word at
/// exactly `max_chars`, so no chunk ever exceeds the budget.
pub fn chunk_fixed(text: &str, max_chars: usize, lookback: usize) -> Result<Vec<TextChunk>> {
    validate_budget(max_chars)?;

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map_or(text.len(), |&(b, _)| b);
    let skip_whitespace = |mut i: usize| {
        while i < chars.len() && chars[i].1.is_whitespace() {
            i += 1;
        }
        i
    };

    let mut chunks = Vec::new();
    let mut pos = skip_whitespace(0);

    while pos < chars.len() {
        let cut = if chars.len() - pos <= max_chars {
            chars.len()
        } else {
            let end = pos + max_chars;
            let floor = end.saturating_sub(lookback).max(pos + 1);
            (floor..=end)
                .rev()
                .find(|&k| chars[k].1.is_whitespace())
                .unwrap_or(end)
        };

        let start = byte_at(pos);
        let piece = text[start..byte_at(cut)].trim_end();
        chunks.push(TextChunk::new(chunks.len(), start, piece));

        pos = skip_whitespace(cut);
    }

    Ok(chunks)
}
