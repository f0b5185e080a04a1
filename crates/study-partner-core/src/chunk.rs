//! Recursive character text chunker.
//!
//! Splits extracted document text into overlapping [`Chunk`]s no longer
//! than a configurable number of characters. Splitting prefers the coarsest
//! boundary available, walking down a separator ladder:
//!
//! ```text
//! "\n\n"  →  "\n"  →  ". "  →  " "  →  ""  (single characters)
//! ```
//!
//! # Algorithm
//!
//! 1. Pick the first separator that occurs in the text.
//! 2. Split on it. Pieces shorter than `chunk_size` are queued for merging;
//!    longer pieces are split recursively with the remaining separators.
//! 3. Queued pieces are merged greedily into windows of at most
//!    `chunk_size` characters. When a window is flushed, its trailing pieces
//!    (up to `chunk_overlap` characters) seed the next window.
//!
//! Lengths are measured in characters, not bytes, so multi-byte text is
//! never split inside a code point.
//!
//! # Example
//!
//! ```rust
//! use study_partner_core::chunk::Chunker;
//! use study_partner_core::models::ChunkMetadata;
//!
//! let chunker = Chunker::new(1000, 200).unwrap();
//! let meta = ChunkMetadata {
//!     source: "aws_certification_guide".into(),
//!     doc_type: "study_guide".into(),
//!     filename: "guide.pdf".into(),
//! };
//! let chunks = chunker.chunk_text("Amazon S3 stores objects.\n\nEC2 runs servers.", &meta);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_id, 0);
//! ```

use std::collections::VecDeque;

use anyhow::{bail, Result};

use crate::models::{Chunk, ChunkMetadata};

/// Separator ladder, coarsest first. The empty separator splits into characters.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Tokens that chat models treat specially and must not reach the embedder.
const SPECIAL_TOKENS: [&str; 7] = [
    "<|endoftext|>",
    "<|startoftext|>",
    "<|im_start|>",
    "<|im_end|>",
    "<|system|>",
    "<|user|>",
    "<|assistant|>",
];

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    /// Create a chunker. `chunk_overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text and attach metadata. Chunk ids are contiguous from 0.
    pub fn chunk_text(&self, text: &str, metadata: &ChunkMetadata) -> Vec<Chunk> {
        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                text,
                chunk_id: i as i64,
                metadata: metadata.clone(),
            })
            .collect()
    }

    /// Split text into overlapping windows of at most `chunk_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut out = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                out.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if remaining.is_empty() {
                out.push(piece);
            } else {
                out.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !pending.is_empty() {
            out.extend(self.merge(&pending, separator));
        }
        out
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut docs, &window, separator);
                // Drop leading pieces until the window fits the overlap budget
                // and leaves room for the incoming piece.
                while let Some(front) = window.front() {
                    let over_overlap = total > self.chunk_overlap;
                    let no_room = total + len + sep_len > self.chunk_size;
                    if !(over_overlap || no_room) || total == 0 {
                        break;
                    }
                    let front_len = char_len(front);
                    let dropped = front_len + if window.len() > 1 { sep_len } else { 0 };
                    total = total.saturating_sub(dropped);
                    window.pop_front();
                }
            }
            let joiner = if window.is_empty() { 0 } else { sep_len };
            total += len + joiner;
            window.push_back(piece);
        }
        push_joined(&mut docs, &window, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Remove chat-model special tokens and collapse all whitespace runs.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = text.to_string();
    for token in SPECIAL_TOKENS {
        cleaned = cleaned.replace(token, "");
    }
    cleaned = strip_token_patterns(&cleaned);
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip any remaining `<|...|>` sequences.
fn strip_token_patterns(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<|") {
        let after = &rest[start + 2..];
        match after.find('>') {
            Some(end) if after[..end].ends_with('|') => {
                out.push_str(&rest[..start]);
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str(&rest[..start + 2]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ChunkMetadata {
        ChunkMetadata {
            source: "practice_test".to_string(),
            doc_type: "questions".to_string(),
            filename: "practice.pdf".to_string(),
        }
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk_text("Hello, world!", &meta());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].metadata.doc_type, "questions");
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let chunker = Chunker::default();
        assert!(chunker.chunk_text("", &meta()).is_empty());
        assert!(chunker.chunk_text("   \n\n  ", &meta()).is_empty());
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 20).is_ok());
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let text = (0..200)
            .map(|i| format!("Sentence number {} talks about Amazon S3 buckets", i))
            .collect::<Vec<_>>()
            .join(". ");
        let chunker = Chunker::new(120, 30).unwrap();
        let chunks = chunker.split_text(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 120, "chunk too long: {}", c.len());
        }
    }

    #[test]
    fn test_ids_contiguous() {
        let text = (0..50)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = Chunker::new(60, 10).unwrap().chunk_text(&text, &meta());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_id, i as i64, "id mismatch at position {}", i);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = (0..40)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = Chunker::new(50, 20).unwrap().split_text(&text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(
                pair[1].contains(last_word),
                "expected {:?} to carry over into {:?}",
                last_word,
                pair[1]
            );
        }
    }

    #[test]
    fn test_paragraphs_preferred_over_words() {
        let text = "Alpha paragraph here.\n\nBeta paragraph here.";
        let chunks = Chunker::new(25, 5).unwrap().split_text(text);
        assert_eq!(chunks, vec!["Alpha paragraph here.", "Beta paragraph here."]);
    }

    #[test]
    fn test_unbroken_text_split_by_characters() {
        let text = "x".repeat(250);
        let chunks = Chunker::new(100, 10).unwrap().split_text(&text);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_multibyte_text_is_safe() {
        let text = "é".repeat(300);
        let chunks = Chunker::new(100, 10).unwrap().split_text(&text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let chunker = Chunker::new(12, 4).unwrap();
        assert_eq!(chunker.split_text(text), chunker.split_text(text));
    }

    #[test]
    fn test_clean_text_strips_special_tokens() {
        let dirty = "Hello <|endoftext|> world\n\n<|custom_token|>  again <|im_start|>";
        assert_eq!(clean_text(dirty), "Hello world again");
    }

    #[test]
    fn test_clean_text_keeps_unrelated_brackets() {
        assert_eq!(clean_text("a <| b > c"), "a <| b > c");
        assert_eq!(clean_text("x < y"), "x < y");
    }
}
