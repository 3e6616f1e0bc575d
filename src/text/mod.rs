//! Text processing module for longtts
//!
//! Splits normalized text into chunks sized for one synthesis call each.
//! Normalization itself happens upstream; this module never rewrites text.

mod chunker;

pub use chunker::{
    chunk_fixed, chunk_sentences, AdaptiveBudget, Chunker, ChunkingStrategy, ReferenceProfile,
};

use std::ops::Range;

/// Sentence-final punctuation
pub fn is_sentence_terminal(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '…' | '。' | '！' | '？')
}

/// Terminals that end a sentence without needing whitespace after them
fn is_cjk_terminal(ch: char) -> bool {
    matches!(ch, '。' | '！' | '？')
}

/// Closing quotes and brackets that stay attached to the sentence they end
fn is_closing_mark(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\'' | '”' | '’' | '»' | ')' | ']' | '」' | '』' | '）'
    )
}

/// One contiguous piece of the input text
///
/// `start` is a byte offset into the text the chunk was cut from; the chunk
/// text has no leading or trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    index: usize,
    start: usize,
    text: String,
}

impl TextChunk {
    pub(crate) fn new(index: usize, start: usize, text: &str) -> Self {
        Self {
            index,
            start,
            text: text.to_string(),
        }
    }

    /// Position of this chunk in its sequence
    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of the first character
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset one past the last character
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length in characters
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn byte_range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Split text into trimmed sentence byte ranges
///
/// A sentence ends after a run of terminal punctuation (plus any closing
/// quotes or brackets) that is followed by whitespace or the end of the
/// text. Opening marks such as `¿` and `¡` never end a sentence. Text after
/// the last terminal forms a final sentence of its own.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map_or(text.len(), |&(b, _)| b);

    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let (byte, ch) = chars[i];

        if start.is_none() {
            if ch.is_whitespace() {
                i += 1;
                continue;
            }
            start = Some(byte);
        }

        if !is_sentence_terminal(ch) {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && (is_sentence_terminal(chars[j].1) || is_closing_mark(chars[j].1)) {
            j += 1;
        }

        let at_boundary =
            j == chars.len() || chars[j].1.is_whitespace() || is_cjk_terminal(chars[j - 1].1);
        if at_boundary {
            if let Some(s) = start.take() {
                spans.push(s..byte_at(j));
            }
        }
        i = j;
    }

    if let Some(s) = start {
        let end = s + text[s..].trim_end().len();
        if end > s {
            spans.push(s..end);
        }
    }

    spans
}

/// Split text into trimmed sentences
pub fn split_sentences(text: &str) -> Vec<&str> {
    sentence_spans(text).into_iter().map(|r| &text[r]).collect()
}

/// Check that `chunks` tile `text`: ordered, non-overlapping, each chunk equal
/// to the text at its offsets, and only whitespace between or around them.
pub fn covers(text: &str, chunks: &[TextChunk]) -> bool {
    let mut cursor = 0;
    for chunk in chunks {
        if chunk.start() < cursor || chunk.end() > text.len() {
            return false;
        }
        let (Some(gap), Some(body)) = (text.get(cursor..chunk.start()), text.get(chunk.byte_range()))
        else {
            return false;
        };
        if !gap.chars().all(char::is_whitespace) || body != chunk.text() || body.is_empty() {
            return false;
        }
        cursor = chunk.end();
    }
    text[cursor..].chars().all(char::is_whitespace)
}

/// Estimate spoken duration from character count
pub fn estimate_duration(text: &str, chars_per_second: f32) -> f32 {
    if chars_per_second <= 0.0 {
        return 0.0;
    }
    text.chars().count() as f32 / chars_per_second
}
