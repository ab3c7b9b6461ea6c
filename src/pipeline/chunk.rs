//! Greedy grouping of segments into word-budgeted chunks.
//!
//! Word count stands in for model tokens. Segments are never split: a segment
//! larger than the budget on its own becomes a chunk of exactly that segment.

use serde::{Deserialize, Serialize};

/// An ordered group of segments submitted as one summarization unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based position in the document.
    pub index: usize,
    pub segments: Vec<String>,
    pub word_count: usize,
}

impl Chunk {
    /// Segments joined by a newline; this is what the model sees.
    pub fn text(&self) -> String {
        self.segments.join("\n")
    }
}

/// Approximate token count of a segment.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Group `segments` into chunks of at most `token_budget` words.
///
/// The current chunk is closed only when it is non-empty and the next segment
/// would push it over budget.
pub fn chunk_segments<S: AsRef<str>>(segments: &[S], token_budget: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0usize;

    for segment in segments {
        let segment = segment.as_ref();
        let words = word_count(segment);

        if !current.is_empty() && current_words + words > token_budget {
            chunks.push(Chunk {
                index: chunks.len(),
                segments: std::mem::take(&mut current),
                word_count: current_words,
            });
            current_words = 0;
        }

        current.push(segment.to_string());
        current_words += words;
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            segments: current,
            word_count: current_words,
        });
    }

    chunks
}
