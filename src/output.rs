//! Result types returned by summarization and generation.

use crate::config::DocumentFormat;
use crate::error::ChunkError;
use serde::{Deserialize, Serialize};

/// Outcome of summarizing one chunk.
///
/// On failure `summary` holds [`crate::prompts::FAILED_CHUNK_SENTINEL`] and
/// `error` says why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSummary {
    /// 0-based position of the chunk in its document.
    pub chunk_index: usize,
    pub summary: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub error: Option<ChunkError>,
}

impl ChunkSummary {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-document statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub segment_count: usize,
    pub word_count: usize,
    pub chunk_count: usize,
    pub failed_chunks: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub duration_ms: u64,
}

/// A summarized document: the ordered join of every chunk slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Chunk summaries joined by a blank line, in chunk order.
    pub text: String,
    /// One entry per chunk, in chunk order.
    pub chunks: Vec<ChunkSummary>,
    pub stats: SummaryStats,
}

impl DocumentSummary {
    /// Assemble from ordered slots. The text is always rebuilt from `chunks`.
    pub fn from_chunks(chunks: Vec<ChunkSummary>, mut stats: SummaryStats) -> Self {
        let text = chunks
            .iter()
            .map(|c| c.summary.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        stats.chunk_count = chunks.len();
        stats.failed_chunks = chunks.iter().filter(|c| !c.is_success()).count();
        stats.total_input_tokens = chunks.iter().map(|c| c.input_tokens).sum();
        stats.total_output_tokens = chunks.iter().map(|c| c.output_tokens).sum();
        Self {
            text,
            chunks,
            stats,
        }
    }
}

/// Shape of a document without calling the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub format: DocumentFormat,
    pub segment_count: usize,
    pub word_count: usize,
    pub chunk_count: usize,
    /// Word count of each chunk, in order.
    pub chunk_word_counts: Vec<usize>,
}

/// Statistics for one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub steps_run: Vec<String>,
    pub failed_chunks: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub summarize_duration_ms: u64,
    pub workflow_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a complete generate (or enhance) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Final, cleaned FRD text.
    pub frd: String,
    /// Present when the style-pattern step ran.
    pub style_pattern: Option<String>,
    pub existing_brd: DocumentSummary,
    pub existing_frd: DocumentSummary,
    pub new_brd: DocumentSummary,
    pub stats: GenerationStats,
}
