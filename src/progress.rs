//! Progress-callback trait for summarization and workflow events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as documents are chunked, summarized and turned into an FRD.
//!
//! Chunk events are emitted from the single gathering loop of the fan-out,
//! never from inside the concurrent tasks, so `completed` in
//! [`GenerationProgressCallback::on_chunk_complete`] is strictly increasing
//! and hits `total` exactly once per document.
//!
//! # Example
//!
//! ```rust
//! use edgequake_frd::{GenerationProgressCallback, GenerationConfig};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl GenerationProgressCallback for Printer {
//!     fn on_chunk_complete(&self, document: &str, completed: usize, total: usize) {
//!         eprintln!("{document}: {completed}/{total}");
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it works through documents and workflow steps.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `document` is a caller-chosen label such as
/// `"new BRD"`.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once per document after chunking, before any remote call.
    fn on_summary_start(&self, document: &str, total_chunks: usize) {
        let _ = (document, total_chunks);
    }

    /// Called each time one chunk finishes, successfully or not.
    fn on_chunk_complete(&self, document: &str, completed: usize, total: usize) {
        let _ = (document, completed, total);
    }

    /// Called when a chunk is replaced by the failure sentinel.
    ///
    /// `chunk_index` is 0-based.
    fn on_chunk_error(&self, document: &str, chunk_index: usize, error: &str) {
        let _ = (document, chunk_index, error);
    }

    /// Called once after every chunk of a document has been attempted.
    fn on_summary_complete(&self, document: &str, total_chunks: usize, failed_chunks: usize) {
        let _ = (document, total_chunks, failed_chunks);
    }

    /// Called before a workflow step sends its request.
    ///
    /// `index` is 1-based.
    fn on_step_start(&self, step: &str, index: usize, total_steps: usize) {
        let _ = (step, index, total_steps);
    }

    /// Called after a workflow step merged its output into the state.
    fn on_step_complete(&self, step: &str, output_len: usize) {
        let _ = (step, output_len);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
