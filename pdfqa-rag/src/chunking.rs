//! Corpus chunking.
//!
//! [`RecursiveChunker`] splits text hierarchically: paragraphs, lines,
//! sentences, words, and finally single characters. The resulting pieces are
//! merged greedily into chunks of at most `chunk_size` characters, and each
//! new chunk re-uses up to `chunk_overlap` characters of trailing pieces from
//! the previous one.
//!
//! Lengths are measured in `char`s, never bytes, so multi-byte text is never
//! split inside a code point.

use std::collections::VecDeque;
use std::ops::Range;

use crate::document::Chunk;
use crate::error::{RagError, Result};

/// Separators tried in order, coarsest first.
const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// A strategy for splitting corpus text into chunks.
pub trait Chunker: Send + Sync {
    /// Split text into ordered chunks, each holding some non-whitespace text.
    ///
    /// Returns an empty `Vec` for empty or whitespace-only text.
    fn chunk(&self, text: &str) -> Vec<Chunk>;
}

/// Splits text hierarchically and merges the pieces with overlap.
///
/// Boundaries land on the coarsest separator that keeps a piece within
/// `chunk_size`; text with no usable separator is cut at the hard size limit.
/// Separators stay attached to the piece they end, so the
/// [`spans`](RecursiveChunker::spans) cover the input without gaps. Spans made
/// only of whitespace are not worth an embedding call and are left out of
/// [`chunk`](Chunker::chunk).
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(10_000, 1_000)?;
/// let chunks = chunker.chunk(&corpus);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

/// A contiguous run of text, as a byte range with its length in chars.
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - maximum number of characters shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator hierarchy. Empty separators are ignored.
    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators =
            separators.iter().filter(|s| !s.is_empty()).map(|s| s.to_string()).collect();
        self
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Maximum number of characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Byte ranges covering all of `text`, in order.
    ///
    /// Includes whitespace-only ranges, which [`chunk`](Chunker::chunk) drops.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.is_empty() {
            return Vec::new();
        }

        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        let mut pieces = Vec::new();
        atomize(text, 0..text.len(), &separators, self.chunk_size, &mut pieces);
        merge(&pieces, self.chunk_size, self.chunk_overlap)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        self.spans(text)
            .into_iter()
            .filter(|span| !text[span.clone()].trim().is_empty())
            .enumerate()
            .map(|(index, span)| Chunk { index, text: text[span].to_string() })
            .collect()
    }
}

/// Break `text[range]` into pieces no longer than `limit` chars, trying each
/// separator in turn and falling back to single characters.
fn atomize(
    text: &str,
    range: Range<usize>,
    separators: &[&str],
    limit: usize,
    out: &mut Vec<Piece>,
) {
    let segment = &text[range.clone()];
    let chars = segment.chars().count();
    if chars <= limit {
        out.push(Piece { start: range.start, end: range.end, chars });
        return;
    }

    match separators.split_first() {
        Some((separator, rest)) => {
            if !segment.contains(separator) {
                atomize(text, range, rest, limit, out);
                return;
            }
            for part in split_keeping_separator(segment, separator) {
                let part = (range.start + part.start)..(range.start + part.end);
                atomize(text, part, rest, limit, out);
            }
        }
        None => {
            for (offset, c) in segment.char_indices() {
                let start = range.start + offset;
                out.push(Piece { start, end: start + c.len_utf8(), chars: 1 });
            }
        }
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<Range<usize>> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(start..end);
        start = end;
    }

    if start < text.len() {
        result.push(start..text.len());
    }

    result
}

/// Greedily merge contiguous pieces into chunks of at most `chunk_size` chars.
///
/// When a chunk is emitted, trailing pieces totalling at most `chunk_overlap`
/// chars are carried into the next one.
fn merge(pieces: &[Piece], chunk_size: usize, chunk_overlap: usize) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut window: VecDeque<Piece> = VecDeque::new();
    let mut total = 0;

    for piece in pieces {
        if total + piece.chars > chunk_size {
            if let (Some(first), Some(last)) = (window.front(), window.back()) {
                spans.push(first.start..last.end);
            }
            while let Some(front) = window.front() {
                if total > chunk_overlap || total + piece.chars > chunk_size {
                    total -= front.chars;
                    window.pop_front();
                } else {
                    break;
                }
            }
        }
        total += piece.chars;
        window.push_back(*piece);
    }

    if let (Some(first), Some(last)) = (window.front(), window.back()) {
        spans.push(first.start..last.end);
    }

    spans
}
