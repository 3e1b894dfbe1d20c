//! Text segmentation for chunked TTS processing.
//!
//! Every strategy feeds its units through the same bounded greedy
//! accumulator. Chunks that still exceed the bound afterwards (a run-on
//! sentence or a huge paragraph) are split again at word boundaries.

use super::{SplitStrategy, TextChunk};
use regex::Regex;
use std::sync::OnceLock;

/// Default maximum chunk size in characters.
pub const DEFAULT_MAX_CHARS: usize = 500;

/// Sentence terminator followed by whitespace.
static SENTENCE_END: OnceLock<Regex> = OnceLock::new();

fn sentence_end() -> &'static Regex {
    SENTENCE_END.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence pattern should compile"))
}

/// Greedily packs units into chunks of at most `max_chars` characters.
///
/// A unit is never split here: one unit longer than the bound becomes its
/// own (oversized) chunk.
struct BoundedAccumulator<'a> {
    max_chars: usize,
    separator: &'a str,
    current: String,
    current_len: usize,
    chunks: Vec<String>,
}

impl<'a> BoundedAccumulator<'a> {
    fn new(max_chars: usize, separator: &'a str) -> Self {
        Self {
            max_chars,
            separator,
            current: String::new(),
            current_len: 0,
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, unit: &str) {
        let unit_len = unit.chars().count();

        if !self.current.is_empty() {
            let separator_len = self.separator.chars().count();
            if self.current_len + separator_len + unit_len > self.max_chars {
                self.flush();
            } else {
                self.current.push_str(self.separator);
                self.current_len += separator_len;
            }
        }

        self.current.push_str(unit);
        self.current_len += unit_len;
    }

    fn flush(&mut self) {
        let trimmed = self.current.trim();
        if !trimmed.is_empty() {
            self.chunks.push(trimmed.to_string());
        }
        self.current.clear();
        self.current_len = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// Split text into sentences, keeping each terminator and its trailing
/// whitespace attached to the sentence it ends.
fn sentence_units(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;

    for m in sentence_end().find_iter(text) {
        units.push(&text[start..m.end()]);
        start = m.end();
    }

    if start < text.len() {
        units.push(&text[start..]);
    }

    units
}

/// Split text on line breaks, dropping blank lines.
fn paragraph_units(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Accumulate sentences into chunks. Sentences are concatenated as-is since
/// they already carry their trailing whitespace.
fn split_by_sentences(text: &str, max_chars: usize) -> Vec<String> {
    let mut acc = BoundedAccumulator::new(max_chars, "");
    for unit in sentence_units(text) {
        acc.push(unit);
    }
    acc.finish()
}

/// Accumulate paragraphs into chunks joined by newlines.
fn split_by_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut acc = BoundedAccumulator::new(max_chars, "\n");
    for unit in paragraph_units(text) {
        acc.push(unit);
    }
    acc.finish()
}

/// Split text on word boundaries, joining words with single spaces.
fn split_on_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut acc = BoundedAccumulator::new(max_chars, " ");
    for word in text.split_whitespace() {
        acc.push(word);
    }
    acc.finish()
}

/// Split text into TTS-friendly strings of at most `max_chars` characters.
///
/// The only chunk allowed to exceed `max_chars` is a single word that is
/// itself longer than the bound.
pub fn split_text(text: &str, max_chars: usize, strategy: SplitStrategy) -> Vec<String> {
    let max_chars = max_chars.max(1);

    let chunks = match strategy {
        SplitStrategy::Sentences => split_by_sentences(text, max_chars),
        SplitStrategy::Paragraphs => split_by_paragraphs(text, max_chars),
    };

    let mut final_chunks = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if chunk.chars().count() <= max_chars {
            final_chunks.push(chunk);
        } else {
            final_chunks.extend(split_on_words(&chunk, max_chars));
        }
    }

    final_chunks
}

/// Segment text into indexed chunks for synthesis.
///
/// # Arguments
/// * `text` - The text to segment
/// * `max_chars` - Maximum chunk size in characters (default: 500)
/// * `strategy` - Unit boundaries to respect before falling back to words
///
/// # Returns
/// Chunks in original text order, indexed from 1.
pub fn segment(text: &str, max_chars: usize, strategy: SplitStrategy) -> Vec<TextChunk> {
    split_text(text, max_chars, strategy)
        .into_iter()
        .enumerate()
        .map(|(i, content)| TextChunk::new(i + 1, content))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn non_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_segment_short_text() {
        let chunks = segment("Hello world. How are you?", 500, SplitStrategy::Sentences);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 1);
        assert_eq!(chunks[0].content, "Hello world. How are you?");
    }

    #[test]
    fn test_segment_empty_text() {
        assert!(segment("", 500, SplitStrategy::Sentences).is_empty());
        assert!(segment("   \n\n   ", 500, SplitStrategy::Paragraphs).is_empty());
        assert!(segment(" \t ", 500, SplitStrategy::Sentences).is_empty());
    }

    #[test]
    fn test_sentence_units_keep_terminators() {
        let units = sentence_units("One. Two! Three? Four");
        assert_eq!(units, vec!["One. ", "Two! ", "Three? ", "Four"]);
    }

    #[test]
    fn test_sentence_units_ignore_inner_periods() {
        // "3.14" has no whitespace after the period
        let units = sentence_units("Pi is 3.14 roughly. Next.");
        assert_eq!(units, vec!["Pi is 3.14 roughly. ", "Next."]);
    }

    #[test]
    fn test_sentences_accumulate_greedily() {
        let text = "First sentence. Second sentence. Third sentence. Fourth sentence.";
        let chunks = split_text(text, 34, SplitStrategy::Sentences);
        assert_eq!(
            chunks,
            vec![
                "First sentence. Second sentence.",
                "Third sentence. Fourth sentence."
            ]
        );
    }

    #[test]
    fn test_paragraphs_join_with_newline() {
        let text = "Para one.\n\n  Para two.  \nPara three is longer.";
        let chunks = split_text(text, 21, SplitStrategy::Paragraphs);
        assert_eq!(chunks, vec!["Para one.\nPara two.", "Para three is longer."]);
    }

    #[test]
    fn test_paragraph_separator_counts_toward_bound() {
        // "aaaa\nbbbb" is 9 characters
        let chunks = split_text("aaaa\nbbbb", 8, SplitStrategy::Paragraphs);
        assert_eq!(chunks, vec!["aaaa", "bbbb"]);
        let chunks = split_text("aaaa\nbbbb", 9, SplitStrategy::Paragraphs);
        assert_eq!(chunks, vec!["aaaa\nbbbb"]);
    }

    #[test]
    fn test_run_on_sentence_falls_back_to_words() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = split_text(text, 10, SplitStrategy::Sentences);
        assert_eq!(
            chunks,
            vec!["one two", "three four", "five six", "seven", "eight nine", "ten"]
        );
    }

    #[test]
    fn test_oversized_word_is_left_intact() {
        let long_word = "x".repeat(30);
        let text = format!("tiny {} end", long_word);
        let chunks = split_text(&text, 10, SplitStrategy::Sentences);
        assert_eq!(chunks, vec!["tiny".to_string(), long_word, "end".to_string()]);
    }

    #[test]
    fn test_bound_is_counted_in_characters() {
        // 10 accented characters is 20 bytes
        let text = "àèìòùàèìòù. àèìòùàèìòù.";
        let chunks = split_text(text, 11, SplitStrategy::Sentences);
        assert_eq!(chunks, vec!["àèìòùàèìòù.", "àèìòùàèìòù."]);
    }

    #[test]
    fn test_long_text_yields_three_or_four_chunks() {
        let sentence = "This sentence is used to fill the chunked input text. ";
        let text = sentence.repeat(26);
        let len = text.trim().chars().count();
        assert!((1350..=1450).contains(&len), "unexpected length {}", len);

        let chunks = segment(&text, 500, SplitStrategy::Sentences);
        assert!((3..=4).contains(&chunks.len()), "got {} chunks", chunks.len());
        for chunk in &chunks {
            assert!(!chunk.content.is_empty());
            assert!(chunk.char_len() <= 500, "chunk too long: {}", chunk.char_len());
        }
    }

    #[test]
    fn test_segment_indices_are_one_based_and_ordered() {
        let text = "Alpha. Beta. Gamma. Delta.";
        let chunks = segment(text, 7, SplitStrategy::Sentences);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["Alpha.", "Beta.", "Gamma.", "Delta."]);
    }

    #[test]
    fn test_zero_max_chars_does_not_loop() {
        let chunks = split_text("a b c", 0, SplitStrategy::Sentences);
        assert_eq!(chunks, vec!["a", "b", "c"]);
    }

    fn text_strategy() -> impl Strategy<Value = String> {
        let word = "[a-zA-Zàé]{1,14}[.!?,]?";
        let sep = prop_oneof![Just(" "), Just("  "), Just("\n"), Just("\n\n"), Just("\t")];
        prop::collection::vec((word, sep), 0..120).prop_map(|parts| {
            parts
                .into_iter()
                .map(|(w, s)| format!("{}{}", w, s))
                .collect::<String>()
        })
    }

    fn strategy_strategy() -> impl Strategy<Value = SplitStrategy> {
        prop_oneof![Just(SplitStrategy::Sentences), Just(SplitStrategy::Paragraphs)]
    }

    proptest! {
        #[test]
        fn prop_chunks_respect_bound(
            text in text_strategy(),
            max_chars in 5usize..200,
            strategy in strategy_strategy(),
        ) {
            for chunk in split_text(&text, max_chars, strategy) {
                let len = chunk.chars().count();
                let single_word = !chunk.contains(char::is_whitespace);
                prop_assert!(len <= max_chars || single_word, "chunk of {} > {}", len, max_chars);
            }
        }

        #[test]
        fn prop_chunks_are_trimmed_and_non_empty(
            text in text_strategy(),
            max_chars in 5usize..200,
            strategy in strategy_strategy(),
        ) {
            for chunk in split_text(&text, max_chars, strategy) {
                prop_assert!(!chunk.is_empty());
                prop_assert_eq!(chunk.trim(), chunk.as_str());
            }
        }

        #[test]
        fn prop_chunks_reconstruct_text(
            text in text_strategy(),
            max_chars in 5usize..200,
            strategy in strategy_strategy(),
        ) {
            let joined: String = split_text(&text, max_chars, strategy).concat();
            prop_assert_eq!(non_whitespace(&joined), non_whitespace(&text));
        }
    }
}
