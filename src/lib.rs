//! # edgequake-frd
//!
//! Draft a new Functional Requirements Document (FRD) from an existing
//! BRD/FRD pair and a new Business Requirements Document (BRD), using an LLM.
//!
//! ## Why summarize first?
//!
//! Requirements documents are long, and three of them rarely fit one prompt.
//! Each document is therefore split into paragraph-aligned chunks, every
//! chunk is summarized concurrently, and only the three summaries go to the
//! generation step. The existing pair shows the model the house style; the
//! new BRD supplies the content.
//!
//! ## Pipeline Overview
//!
//! ```text
//! docx / pptx / txt
//!  │
//!  ├─ 1. Input      resolve file or uploaded bytes, check container magic
//!  ├─ 2. Extract    ordered text segments (spawn_blocking)
//!  ├─ 3. Chunk      greedy packing under a word budget
//!  ├─ 4. Summarize  bounded concurrent calls, retry, sentinel on failure
//!  ├─ 5. Workflow   [style pattern →] generate FRD, one call per step
//!  └─ 6. Polish     cleanup rules, then text output
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_frd::{generate_frd, DocumentInputs, GenerationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = GenerationConfig::default();
//!     let inputs = DocumentInputs::from_paths("brd_v1.docx", "frd_v1.docx", "brd_v2.pptx");
//!     let output = generate_frd(&inputs, Some("Keep the FR-x numbering"), &config).await?;
//!     println!("{}", output.frd);
//!     eprintln!("failed chunks: {}", output.stats.failed_chunks);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `frdgen` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-frd = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DocumentFormat, GenerationConfig, GenerationConfigBuilder};
pub use error::{CallError, ChunkError, FrdError};
pub use generate::{
    generate_frd, generate_from_summaries, generate_sync, generate_to_file, inspect,
    resolve_backend, summarize_document, summarize_inputs, DocumentInputs, DocumentSource,
    InputSummaries,
};
pub use output::{
    ChunkSummary, DocumentInfo, DocumentSummary, GenerationOutput, GenerationStats, SummaryStats,
};
pub use pipeline::llm::{ChatBackend, Completion, CompletionRequest, PromptPair, ProviderBackend};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::Session;
pub use workflow::{StateField, StepOptions, Workflow, WorkflowState, WorkflowStep};
