//! Text processing for TTS: bounded-size segmentation of long input.

pub mod segmenter;

pub use segmenter::{segment, DEFAULT_MAX_CHARS};

use serde::{Deserialize, Serialize};

/// Texts longer than this many characters are synthesized in chunks.
pub const LONG_TEXT_THRESHOLD: usize = 500;

/// A chunk of text ready for TTS processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// 1-based position in the original text
    pub index: usize,
    /// Trimmed, non-empty text content
    pub content: String,
}

impl TextChunk {
    /// Create a new text chunk.
    pub fn new(index: usize, content: String) -> Self {
        Self { index, content }
    }

    /// Length of the content in characters.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// How text is broken into units before greedy accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// Split after `.`, `!` or `?` followed by whitespace
    #[default]
    Sentences,
    /// Split on line breaks, dropping empty lines
    Paragraphs,
}

impl std::fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitStrategy::Sentences => write!(f, "sentences"),
            SplitStrategy::Paragraphs => write!(f, "paragraphs"),
        }
    }
}

/// Number of characters (not bytes) in `text`.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Whether `text` must go through chunked synthesis.
pub fn is_long_text(text: &str, threshold: usize) -> bool {
    char_count(text) > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_chunk_creation() {
        let chunk = TextChunk::new(1, "Hello world".to_string());
        assert_eq!(chunk.index, 1);
        assert_eq!(chunk.content, "Hello world");
        assert_eq!(chunk.char_len(), 11);
    }

    #[test]
    fn test_long_text_threshold_is_exclusive() {
        let exactly = "a".repeat(LONG_TEXT_THRESHOLD);
        let over = "a".repeat(LONG_TEXT_THRESHOLD + 1);
        assert!(!is_long_text(&exactly, LONG_TEXT_THRESHOLD));
        assert!(is_long_text(&over, LONG_TEXT_THRESHOLD));
    }

    #[test]
    fn test_char_count_is_not_byte_count() {
        assert_eq!(char_count("perché"), 6);
        assert!(!is_long_text(&"è".repeat(300), LONG_TEXT_THRESHOLD));
    }

    #[test]
    fn test_strategy_parses_from_config() {
        let s: SplitStrategy = serde_json::from_str("\"paragraphs\"").unwrap();
        assert_eq!(s, SplitStrategy::Paragraphs);
        assert_eq!(SplitStrategy::default().to_string(), "sentences");
    }
}
