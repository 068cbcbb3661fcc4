//! Overlapping, boundary-aware text chunker.
//!
//! Splits extracted text into [`Chunk`]s that can be retrieved independently.
//!
//! # Algorithm
//!
//! 1. Collapse every whitespace run to a single space and trim.
//! 2. Slide a window of `size` characters forward by `size - overlap`
//!    characters, starting at offset 0, until the offset reaches the end.
//! 3. For every window that ends before the text does, find the last `.` or
//!    newline in the window. If it lies past the window midpoint, cut the
//!    window right after it. Snapping only ever shortens a window.
//! 4. Trim and sanitize the window. Windows of [`MIN_CHUNK_CHARS`] characters
//!    or fewer are dropped without consuming an index.
//!
//! Offsets and lengths are measured in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::Chunker;
//!
//! let text = "Intro sentence. ".repeat(100);
//! let chunks = Chunker::default().chunk(&text, "notes.txt");
//! assert_eq!(chunks[0].index, 0);
//! assert!(chunks.iter().all(|c| c.content.chars().count() > 50));
//! ```

use crate::models::Chunk;
use crate::sanitize::sanitize;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Chunks at or below this many characters are discarded.
pub const MIN_CHUNK_CHARS: usize = 50;

/// Fixed-window chunker with overlap and sentence-boundary snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    /// A zero `size` is treated as 1; an `overlap` of `size` or more
    /// degrades to a step of one character.
    pub fn new(size: usize, overlap: usize) -> Self {
        Self {
            size: size.max(1),
            overlap,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Distance between consecutive window starts.
    pub fn step(&self) -> usize {
        self.size.saturating_sub(self.overlap).max(1)
    }

    /// Split `text` into chunks labelled with `source_label`.
    ///
    /// Returns chunks with contiguous indices starting at 0. Empty or very
    /// short input yields an empty vector.
    pub fn chunk(&self, text: &str, source_label: &str) -> Vec<Chunk> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let chars: Vec<char> = normalized.chars().collect();
        let len = chars.len();

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let end = (start + self.size).min(len);
            let mut window = &chars[start..end];

            if end < len {
                if let Some(pos) = window.iter().rposition(|c| *c == '.' || *c == '\n') {
                    if pos > self.size / 2 {
                        window = &window[..=pos];
                    }
                }
            }

            let piece: String = window.iter().collect();
            let content = sanitize(piece.trim());
            if content.chars().count() > MIN_CHUNK_CHARS {
                chunks.push(Chunk {
                    content,
                    index: chunks.len(),
                    source_label: source_label.to_string(),
                });
            }

            start += self.step();
        }

        chunks
    }
}
