//! Pipeline stages for BRD summarization.
//!
//! Each submodule implements exactly one step so each is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ summarize ──▶ (workflow) ──▶ postprocess
//! (path)    (segments)  (budget)  (fan-out)                     (cleanup)
//! ```
//!
//! 1. [`input`]     — validate the path and pick a [`crate::config::DocumentFormat`]
//! 2. [`extract`]   — read ordered text segments; runs in `spawn_blocking`
//!    because the zip/XML readers are synchronous
//! 3. [`chunk`]     — greedy word-budget grouping of segments
//! 4. [`summarize`] — one model call per chunk, fanned out through
//!    [`scatter`] with [`retry`]; the only stage with network I/O besides
//!    the workflow
//! 5. [`postprocess`] — deterministic cleanup of the generated document
//!
//! [`llm`] holds the backend seam shared by the summarizer and the workflow.

pub mod chunk;
pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod retry;
pub mod scatter;
pub mod summarize;
