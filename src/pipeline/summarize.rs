//! Chunk summarization: fan out one model call per chunk, gather in order.
//!
//! ## Failure policy
//!
//! A chunk whose every attempt fails is not an error for the document: its
//! slot receives [`FAILED_CHUNK_SENTINEL`] and a [`ChunkError`], and its
//! siblings carry on. Non-retryable errors (bad API key) give up on the
//! chunk at once instead of burning the attempt budget.

use crate::config::GenerationConfig;
use crate::error::{CallError, ChunkError};
use crate::output::{ChunkSummary, DocumentSummary, SummaryStats};
use crate::pipeline::chunk::{chunk_segments, word_count, Chunk};
use crate::pipeline::llm::{complete_with_timeout, ChatBackend, CompletionRequest, PromptPair};
use crate::pipeline::retry::retry_with_backoff;
use crate::pipeline::scatter::scatter_gather;
use crate::prompts::{FAILED_CHUNK_SENTINEL, SUMMARY_SYSTEM_PROMPT};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Summarize one chunk with retry. Never fails: exhaustion yields the sentinel.
pub async fn summarize_chunk(
    backend: &dyn ChatBackend,
    chunk: &Chunk,
    config: &GenerationConfig,
) -> ChunkSummary {
    let start = Instant::now();
    let system = config
        .summary_prompt
        .as_deref()
        .unwrap_or(SUMMARY_SYSTEM_PROMPT);
    let request = CompletionRequest {
        prompt: PromptPair::new(system, chunk.text()),
        temperature: config.temperature,
        max_tokens: config.summary_max_tokens,
    };
    let timeout = config.api_timeout();

    let outcome = retry_with_backoff(
        config.retry_policy(),
        CallError::is_retryable,
        |attempt| {
            debug!("Chunk {}: attempt {}", chunk.index, attempt);
            complete_with_timeout(backend, &request, timeout)
        },
    )
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;
    match outcome.result {
        Ok(completion) => ChunkSummary {
            chunk_index: chunk.index,
            summary: completion.content,
            input_tokens: completion.prompt_tokens,
            output_tokens: completion.completion_tokens,
            duration_ms,
            attempts: outcome.attempts,
            error: None,
        },
        Err(e) => {
            warn!(
                "Chunk {}: giving up after {} attempt(s) — {}",
                chunk.index, outcome.attempts, e
            );
            let error = if e.is_retryable() {
                ChunkError::SummaryFailed {
                    chunk: chunk.index,
                    attempts: outcome.attempts,
                    detail: e.to_string(),
                }
            } else {
                ChunkError::Rejected {
                    chunk: chunk.index,
                    detail: e.to_string(),
                }
            };
            ChunkSummary {
                chunk_index: chunk.index,
                summary: FAILED_CHUNK_SENTINEL.to_string(),
                input_tokens: 0,
                output_tokens: 0,
                duration_ms,
                attempts: outcome.attempts,
                error: Some(error),
            }
        }
    }
}

/// Summarize every chunk, at most `config.concurrency` at a time.
///
/// Returns exactly one [`ChunkSummary`] per chunk, in chunk order.
/// `label` names the document in progress events.
pub async fn summarize_chunks(
    backend: &dyn ChatBackend,
    chunks: Vec<Chunk>,
    label: &str,
    config: &GenerationConfig,
) -> Vec<ChunkSummary> {
    let total = chunks.len();
    let progress = config.progress_callback.as_ref();
    if let Some(cb) = progress {
        cb.on_summary_start(label, total);
    }

    let mut completed = 0usize;
    let results = scatter_gather(
        chunks,
        config.concurrency,
        |_, chunk| async move { summarize_chunk(backend, &chunk, config).await },
        |index, result: &ChunkSummary| {
            completed += 1;
            if let Some(cb) = progress {
                if let Some(ref e) = result.error {
                    cb.on_chunk_error(label, index, &e.to_string());
                }
                cb.on_chunk_complete(label, completed, total);
            }
        },
    )
    .await;

    let failed = results.iter().filter(|r| !r.is_success()).count();
    if let Some(cb) = progress {
        cb.on_summary_complete(label, total, failed);
    }
    results
}

/// Chunk `segments` and summarize them into one [`DocumentSummary`].
pub async fn summarize_segments(
    backend: &dyn ChatBackend,
    segments: &[String],
    label: &str,
    config: &GenerationConfig,
) -> DocumentSummary {
    let start = Instant::now();
    let chunks = chunk_segments(segments, config.max_tokens_per_chunk);
    info!(
        "{}: {} segments → {} chunks (budget {} words)",
        label,
        segments.len(),
        chunks.len(),
        config.max_tokens_per_chunk
    );

    let results = summarize_chunks(backend, chunks, label, config).await;

    let stats = SummaryStats {
        segment_count: segments.len(),
        word_count: segments.iter().map(|s| word_count(s)).sum(),
        duration_ms: start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    let summary = DocumentSummary::from_chunks(results, stats);
    info!(
        "{}: summarized {}/{} chunks in {}ms",
        label,
        summary.stats.chunk_count - summary.stats.failed_chunks,
        summary.stats.chunk_count,
        summary.stats.duration_ms
    );
    summary
}
