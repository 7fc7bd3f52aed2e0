//! Fixed-size text chunking with overlap.
//!
//! Sizes count Unicode scalar values, so a chunk never splits a code point.

use serde::Serialize;

use crate::memory::core::config::SummaryConfig;
use crate::memory::core::errors::{CoreError, CoreResult};

/// A contiguous slice of the source text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SummaryChunk {
    /// Position of the chunk in the sequence.
    pub index: usize,
    /// Character offset of the chunk in the source text.
    pub start: usize,
    /// Chunk content.
    pub text: String,
}

/// Splits text into overlapping chunks of bounded size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextChunker {
    max_chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker.
    ///
    /// # Errors
    /// Returns a configuration error unless `0 <= overlap < max_chunk_size`.
    pub fn new(max_chunk_size: usize, overlap: usize) -> CoreResult<Self> {
        if max_chunk_size == 0 {
            return Err(CoreError::Config("chunk size must be > 0".to_string()));
        }
        if overlap >= max_chunk_size {
            return Err(CoreError::Config(format!(
                "chunk overlap ({overlap}) must be < chunk size ({max_chunk_size})"
            )));
        }
        Ok(Self {
            max_chunk_size,
            overlap,
        })
    }

    /// Create a chunker from summary settings.
    ///
    /// # Errors
    /// Returns a configuration error for invalid sizes.
    pub fn from_config(config: &SummaryConfig) -> CoreResult<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Maximum characters per chunk.
    #[must_use]
    pub const fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Characters shared by consecutive chunks.
    #[must_use]
    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    const fn stride(&self) -> usize {
        self.max_chunk_size - self.overlap
    }

    /// Number of chunks a text of `char_len` characters produces.
    #[must_use]
    pub const fn chunk_count(&self, char_len: usize) -> usize {
        if char_len <= self.max_chunk_size {
            1
        } else {
            1 + (char_len - self.max_chunk_size).div_ceil(self.stride())
        }
    }

    /// Split `text` into ordered chunks covering it from start to end.
    ///
    /// Text no longer than one chunk (including empty text) yields a single
    /// chunk equal to the input.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<SummaryChunk> {
        let mut bounds: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
        let char_len = bounds.len();
        bounds.push(text.len());

        let mut chunks = Vec::with_capacity(self.chunk_count(char_len));
        let mut start = 0;
        loop {
            let end = (start + self.max_chunk_size).min(char_len);
            chunks.push(SummaryChunk {
                index: chunks.len(),
                start,
                text: text[bounds[start]..bounds[end]].to_string(),
            });
            if end >= char_len {
                break;
            }
            start += self.stride();
        }

        chunks
    }
}

/// Split `text` into chunks of at most `max_chunk_size` characters.
///
/// # Errors
/// Returns a configuration error unless `0 <= overlap < max_chunk_size`.
pub fn chunk_text(text: &str, max_chunk_size: usize, overlap: usize) -> CoreResult<Vec<SummaryChunk>> {
    Ok(TextChunker::new(max_chunk_size, overlap)?.chunk(text))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn reassemble(chunks: &[SummaryChunk], overlap: usize) -> String {
        let mut out = String::new();
        for chunk in chunks {
            if chunk.index == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("hello", 10, 2).unwrap_or_default();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello");

        let exact = "a".repeat(10);
        let chunks = chunk_text(&exact, 10, 0).unwrap_or_default();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, exact);
    }

    #[test]
    fn test_empty_text_single_empty_chunk() {
        let chunks = chunk_text("", 5, 0).unwrap_or_default();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.is_empty());
    }

    proptest! {
        #[test]
        fn test_chunks_reassemble_to_text(
            text in any::<String>(),
            size in 1usize..64,
            overlap_seed in 0usize..64,
        ) {
            let overlap = overlap_seed % size;
            let chunks = chunk_text(&text, size, overlap).unwrap_or_default();
            let char_len = text.chars().count();

            prop_assert_eq!(reassemble(&chunks, overlap), text);
            prop_assert!(chunks.iter().all(|c| c.text.chars().count() <= size));
            prop_assert_eq!(
                chunks.len(),
                TextChunker::new(size, overlap).map_or(0, |c| c.chunk_count(char_len))
            );
        }

        #[test]
        fn test_text_within_size_is_single_chunk(text in any::<String>(), slack in 0usize..8) {
            let size = (text.chars().count() + slack).max(1);
            let chunks = chunk_text(&text, size, 0).unwrap_or_default();

            prop_assert_eq!(chunks.len(), 1);
            prop_assert_eq!(&chunks[0].text, &text);
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunk_text(text, 10, 3).unwrap_or_default();
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(pair[0].text.chars().count() - 3).collect();
            let head: String = pair[1].text.chars().take(3).collect();
            assert_eq!(tail, head);
        }
        assert!(chunks.iter().rev().skip(1).all(|c| c.text.chars().count() == 10));
    }

    #[test]
    fn test_multibyte_characters_are_not_split() {
        let text = "日本語のテキストを分割します";
        let chunks = chunk_text(text, 4, 1).unwrap_or_default();
        assert_eq!(reassemble(&chunks, 1), text);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 4));
    }

    #[test]
    fn test_chunk_count_matches_ceil_for_zero_overlap() {
        let chunker = TextChunker::new(2000, 0);
        assert_eq!(chunker.map(|c| c.chunk_count(3001)).ok(), Some(2));
        let chunks = chunk_text(&"x".repeat(3001), 2000, 0).unwrap_or_default();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start, 2000);
        assert_eq!(chunks[1].text.len(), 1001);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(TextChunker::new(0, 0), Err(CoreError::Config(_))));
        assert!(matches!(TextChunker::new(5, 5), Err(CoreError::Config(_))));
    }
}
