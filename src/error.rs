//! Error types for the edgequake-frd library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`FrdError`] — **Fatal**: the run cannot proceed at all (missing input
//!   document, unreadable container, provider not configured, a workflow step
//!   failed). Returned as `Err(FrdError)` from the top-level entry points.
//!
//! * [`ChunkError`] — **Non-fatal**: a single chunk could not be summarized
//!   after all retries. Stored inside [`crate::output::ChunkSummary`] next to
//!   the failure sentinel so sibling chunks are unaffected.
//!
//! * [`CallError`] — one failed call to the remote model. The summarizer
//!   retries it when [`CallError::is_retryable`] says so; the workflow
//!   sequencer never does.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-frd library.
///
/// Chunk-level failures use [`ChunkError`] and are stored in
/// [`crate::output::ChunkSummary`] rather than propagated here.
#[derive(Debug, Error)]
pub enum FrdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file extension does not map to a supported reader.
    #[error("Unsupported document format for '{path}'\nSupported: .docx, .pptx, .txt, .md")]
    UnsupportedFormat { path: PathBuf },

    /// The container could not be opened or parsed.
    #[error("Document '{path}' could not be read: {detail}")]
    CorruptDocument { path: PathBuf, detail: String },

    /// A required input was not supplied. Raised before any remote call.
    #[error("Missing required input: {what}")]
    MissingInput { what: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A workflow step's single model call failed. Steps are never retried.
    #[error("Workflow step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FrdError {
    pub(crate) fn missing(what: impl Into<String>) -> Self {
        FrdError::MissingInput { what: what.into() }
    }
}

/// A non-fatal error for a single chunk.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// Every attempt failed.
    #[error("Chunk {chunk}: summarization failed after {attempts} attempts: {detail}")]
    SummaryFailed {
        chunk: usize,
        attempts: u32,
        detail: String,
    },

    /// The error was not retryable, so the chunk was given up on immediately.
    #[error("Chunk {chunk}: summarization rejected: {detail}")]
    Rejected { chunk: usize, detail: String },
}

/// Failure of one request to the remote model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// Network failure, 5xx, malformed response. Worth retrying.
    #[error("transient LLM error: {0}")]
    Transient(String),

    /// HTTP 429.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The call exceeded the per-call timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// 401/403 or a rejected request. Retrying will not help.
    #[error("LLM request rejected: {0}")]
    Permanent(String),
}

impl CallError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CallError::Permanent(_))
    }
}
