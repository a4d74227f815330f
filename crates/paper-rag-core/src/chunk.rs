//! Sliding-window text chunker with sentence-aware boundaries.
//!
//! Splits document text into overlapping [`Chunk`]s of at most
//! `chunk_size` characters. Windows prefer to end on a sentence terminator
//! (`.`) or newline when one exists in the back half of the window.
//!
//! # Algorithm
//!
//! 1. Open a window of `chunk_size` characters at `start`.
//! 2. Unless the window reaches the end of the text, look backward from its
//!    end for the last `.` or `\n`. If that break lies past the window's
//!    midpoint, end the window just after it.
//! 3. Emit the window's text, trimmed. Windows that trim to nothing are
//!    skipped.
//! 4. Stop once a window reaches the end of the text; otherwise move
//!    `start` to `end - overlap`. If that would not advance (a short window
//!    under a large overlap), continue from `end` instead.
//!
//! All offsets are in characters, not bytes, so multibyte text is never
//! split inside a code point.
//!
//! # Example
//!
//! ```rust
//! use paper_rag_core::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams::new(20, 5).unwrap();
//! let chunks = chunk_text("Sentence one. Sentence two. Sentence three.", params);
//! assert_eq!(chunks[0].text, "Sentence one.");
//! ```

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Default window length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of characters shared by consecutive windows.
pub const DEFAULT_OVERLAP: usize = 200;

/// Validated chunking parameters. `overlap < chunk_size` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Build parameters, rejecting a zero window or an overlap that would
    /// keep the window from advancing.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Validation("chunk_size must be > 0".to_string()));
        }
        if overlap >= chunk_size {
            return Err(RagError::Validation(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Split `text` into ordered, overlapping chunks.
///
/// # Guarantees
///
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - Every chunk is at most `chunk_size` characters.
/// - Window starts strictly increase and the last window ends at the end
///   of the text, so the windows cover the whole document.
/// - Text shorter than `chunk_size` yields exactly one chunk (none if it is
///   empty or whitespace only).
pub fn chunk_text(text: &str, params: ChunkParams) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let mut end = (start + params.chunk_size).min(total);

        if end < total {
            if let Some(brk) = last_break(&chars[start..end]) {
                if brk > params.chunk_size / 2 {
                    end = start + brk + 1;
                }
            }
        }

        let piece = text[offsets[start]..offsets[end]].trim();
        if !piece.is_empty() {
            chunks.push(Chunk {
                index: chunks.len(),
                text: piece.to_string(),
                start,
                end,
            });
        }

        if end >= total {
            break;
        }

        let next = end.saturating_sub(params.overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Position of the last sentence terminator or newline in `window`.
fn last_break(window: &[char]) -> Option<usize> {
    window.iter().rposition(|&c| c == '.' || c == '\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(size: usize, overlap: usize) -> ChunkParams {
        ChunkParams::new(size, overlap).unwrap()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("  Hello, world!  ", ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_empty_and_blank_text() {
        assert!(chunk_text("", ChunkParams::default()).is_empty());
        assert!(chunk_text(" \n\t ", ChunkParams::default()).is_empty());
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            ChunkParams::new(0, 0),
            Err(RagError::Validation(_))
        ));
        assert!(matches!(
            ChunkParams::new(10, 10),
            Err(RagError::Validation(_))
        ));
        assert!(matches!(
            ChunkParams::new(10, 25),
            Err(RagError::Validation(_))
        ));
        assert!(ChunkParams::new(10, 9).is_ok());
    }

    #[test]
    fn test_breaks_at_sentence_boundaries() {
        let text = "Sentence one. Sentence two. Sentence three.";
        let chunks = chunk_text(text, params(20, 5));
        assert!(chunks.len() >= 3);
        assert_eq!(chunks[0].text, "Sentence one.");
        assert_eq!(chunks[1].text, "one. Sentence two.");
        assert!(chunks[0].text.ends_with('.'));
        assert!(chunks[1].text.ends_with('.'));
    }

    #[test]
    fn test_break_in_first_half_is_ignored() {
        let text = "ab.cdefghijklmnopqrstuvwxyz";
        let chunks = chunk_text(text, params(10, 2));
        assert_eq!(chunks[0].text, "ab.cdefghi");
        assert_eq!(chunks[0].end, 10);
    }

    #[test]
    fn test_newline_is_a_break() {
        let text = "abcdefg\nhijklmnopqrstuvwxyz";
        let chunks = chunk_text(text, params(10, 2));
        assert_eq!(chunks[0].text, "abcdefg");
        assert_eq!(chunks[0].end, 8);
        assert_eq!(chunks[1].start, 6);
    }

    #[test]
    fn test_hard_windows_share_overlap() {
        let text: String = ('a'..='z').collect();
        let chunks = chunk_text(&text, params(10, 3));
        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].start, 7);
        assert_eq!(chunks[1].text, "hijklmnopq");
        assert_eq!(&chunks[0].text[7..], &chunks[1].text[..3]);
    }

    #[test]
    fn test_chunk_lengths_bounded() {
        let text = (0..200)
            .map(|i| format!("Sentence number {} talks about retrieval.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, params(120, 30));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 120, "chunk too long: {}", c.text);
        }
    }

    #[test]
    fn test_windows_cover_text() {
        let text = (0..80)
            .map(|i| format!("Line {} of the paper.\nIt continues here", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, params(100, 25));
        let chars: Vec<char> = text.chars().collect();

        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks.last().unwrap().end, chars.len());

        let mut rebuilt = String::new();
        for pair in chunks.windows(2) {
            assert!(pair[1].start > pair[0].start);
            assert!(pair[1].start <= pair[0].end);
            rebuilt.extend(&chars[pair[0].start..pair[1].start]);
        }
        let last = chunks.last().unwrap();
        rebuilt.extend(&chars[last.start..last.end]);

        let squash = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(squash(&rebuilt), squash(&text));
    }

    #[test]
    fn test_indices_contiguous() {
        let text = "word ".repeat(500);
        let chunks = chunk_text(&text, params(50, 10));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_large_overlap_after_early_break_terminates() {
        let text = "abcdef.ghijklmnopqrstuvwxyz.abcdefghij";
        let chunks = chunk_text(text, params(10, 9));
        assert_eq!(chunks[0].text, "abcdef.");
        assert_eq!(chunks[1].start, 7);
        assert_eq!(chunks.last().unwrap().end, text.chars().count());
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let chunks = chunk_text(text, params(12, 4));
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.text.chars().count() <= 12);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha. Beta.\nGamma. Delta epsilon zeta eta theta.";
        let c1 = chunk_text(text, params(16, 4));
        let c2 = chunk_text(text, params(16, 4));
        assert_eq!(c1, c2);
    }
}
