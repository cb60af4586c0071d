//! Overlapping, sentence-aware text chunking.
//!
//! Offsets are measured in characters, not bytes, so multi-byte text never
//! splits inside a code point.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be positive")]
    ZeroSize,

    #[error("overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Target chunk size and overlap, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: 800,
            overlap: 150,
        }
    }
}

impl ChunkConfig {
    pub fn new(size: usize, overlap: usize) -> Self {
        Self { size, overlap }
    }

    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if self.overlap >= self.size {
            return Err(ChunkError::OverlapTooLarge {
                size: self.size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Minimum distance between consecutive chunk starts.
    pub fn step(&self) -> usize {
        self.size - self.overlap
    }
}

/// Half-open character range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compute chunk boundaries over `text`.
///
/// A window ends at the last sentence terminator at or after half the
/// target size, provided the next window (which starts at
/// `max(end - overlap, start + step)`) leaves nothing uncovered. Otherwise
/// the window is cut hard at the target size.
pub fn chunk_spans(text: &str, config: &ChunkConfig) -> Result<Vec<ChunkSpan>, ChunkError> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let step = config.step();
    let mut spans = Vec::new();

    if len == 0 {
        return Ok(spans);
    }

    let mut start = 0;
    loop {
        let mut end = (start + config.size).min(len);

        if end < len {
            let earliest = (start + config.size / 2).max(start + step.saturating_sub(1));
            if let Some(p) = (earliest..end)
                .rev()
                .find(|&i| SENTENCE_TERMINATORS.contains(&chars[i]))
            {
                end = p + 1;
            }
        }

        spans.push(ChunkSpan { start, end });

        if end >= len {
            break;
        }
        start = end.saturating_sub(config.overlap).max(start + step);
    }

    Ok(spans)
}

/// Normalize and chunk a document, returning trimmed non-empty chunk texts.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Result<Vec<String>, ChunkError> {
    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();

    let chunks = chunk_spans(&normalized, config)?
        .into_iter()
        .map(|span| chars[span.start..span.end].iter().collect::<String>())
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect();

    Ok(chunks)
}
