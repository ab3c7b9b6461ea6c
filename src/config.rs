//! Configuration types for BRD summarization and FRD generation.
//!
//! All run behaviour is controlled through [`GenerationConfig`], built via its
//! [`GenerationConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share the config between the summarizer and the workflow and to
//! log it in one line.

use crate::error::FrdError;
use crate::pipeline::llm::ChatBackend;
use crate::pipeline::retry::RetryPolicy;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a summarize-and-generate run.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_frd::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .concurrency(5)
///     .max_tokens_per_chunk(1500)
///     .model("gpt-4o")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Word budget per summarization chunk. Default: 2000.
    ///
    /// Word count is a rough stand-in for tokens. A single paragraph longer
    /// than the budget still becomes its own chunk; it is never split.
    pub max_tokens_per_chunk: usize,

    /// Number of concurrent summarization calls. Default: 5.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, uses `gpt-4o`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `backend`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over `provider_name`.
    pub backend: Option<Arc<dyn ChatBackend>>,

    /// Sampling temperature for every call. Default: 0.2.
    pub temperature: f32,

    /// Output cap for each chunk summary. Default: 800.
    pub summary_max_tokens: usize,

    /// Output cap for each workflow step. Default: 3000.
    ///
    /// A complete FRD is long; too low a cap truncates it mid-section.
    pub generation_max_tokens: usize,

    /// Attempts per chunk, including the first. Default: 3.
    pub max_attempts: u32,

    /// Fixed pause between attempts in milliseconds. Default: 2000.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom summarization system prompt. If None, uses built-in default.
    pub summary_prompt: Option<String>,

    /// Run the style-pattern step before generating. Default: false.
    ///
    /// The extra call asks the model to describe the existing FRD's layout
    /// first, then hands that description to the generation step.
    pub extract_style_pattern: bool,

    /// Progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: 2000,
            concurrency: 5,
            model: None,
            provider_name: None,
            backend: None,
            temperature: 0.2,
            summary_max_tokens: 800,
            generation_max_tokens: 3000,
            max_attempts: 3,
            retry_backoff_ms: 2000,
            api_timeout_secs: 120,
            summary_prompt: None,
            extract_style_pattern: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("max_tokens_per_chunk", &self.max_tokens_per_chunk)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn ChatBackend>"))
            .field("temperature", &self.temperature)
            .field("summary_max_tokens", &self.summary_max_tokens)
            .field("generation_max_tokens", &self.generation_max_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("extract_style_pattern", &self.extract_style_pattern)
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retry policy applied to each chunk summary.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Builder for [`GenerationConfig`].
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl fmt::Debug for GenerationConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl GenerationConfigBuilder {
    pub fn max_tokens_per_chunk(mut self, n: usize) -> Self {
        self.config.max_tokens_per_chunk = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn summary_max_tokens(mut self, n: usize) -> Self {
        self.config.summary_max_tokens = n;
        self
    }

    pub fn generation_max_tokens(mut self, n: usize) -> Self {
        self.config.generation_max_tokens = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn summary_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.summary_prompt = Some(prompt.into());
        self
    }

    pub fn extract_style_pattern(mut self, v: bool) -> Self {
        self.config.extract_style_pattern = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, FrdError> {
        let c = &self.config;
        if c.max_tokens_per_chunk == 0 {
            return Err(FrdError::InvalidConfig(
                "Chunk token budget must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(FrdError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_attempts == 0 {
            return Err(FrdError::InvalidConfig(
                "At least one attempt per chunk is required".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(FrdError::InvalidConfig("API timeout must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Container formats the segment extractors understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Word document: one segment per paragraph.
    Docx,
    /// PowerPoint deck: one segment per text shape.
    Pptx,
    /// Plain text or Markdown: one segment per non-blank line.
    Text,
}

impl DocumentFormat {
    /// Pick the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(DocumentFormat::Docx),
            "pptx" => Some(DocumentFormat::Pptx),
            "txt" | "md" | "markdown" => Some(DocumentFormat::Text),
            _ => None,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether the format is a zip container (checked by magic bytes).
    pub fn is_zip_container(self) -> bool {
        matches!(self, DocumentFormat::Docx | DocumentFormat::Pptx)
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Text => "txt",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
