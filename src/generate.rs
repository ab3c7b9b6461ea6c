//! End-to-end entry points: documents in, FRD out.
//!
//! A run has two phases. First all three input documents are read into
//! segments, so a missing or corrupt file fails the run before any model
//! call. Each document is then chunked and summarized (chunks fan out
//! concurrently; the documents themselves go one after another). Finally the
//! workflow sequencer turns the three summaries into the new FRD, which is
//! cleaned before it is returned.

use crate::config::{DocumentFormat, GenerationConfig};
use crate::error::FrdError;
use crate::output::{DocumentInfo, DocumentSummary, GenerationOutput, GenerationStats};
use crate::pipeline::chunk::{chunk_segments, word_count};
use crate::pipeline::llm::{ChatBackend, ProviderBackend};
use crate::pipeline::{extract, input, postprocess, summarize};
use crate::workflow::{StateField, StepOptions, Workflow, WorkflowState};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Default model when only a provider name is given.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Where one input document comes from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A file on disk; format from its extension.
    Path(PathBuf),
    /// Uploaded bytes; format from the extension of `name`.
    Bytes { name: String, bytes: Vec<u8> },
}

impl DocumentSource {
    fn describe(&self) -> String {
        match self {
            DocumentSource::Path(p) => p.display().to_string(),
            DocumentSource::Bytes { name, .. } => name.clone(),
        }
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(p: PathBuf) -> Self {
        DocumentSource::Path(p)
    }
}

impl From<&Path> for DocumentSource {
    fn from(p: &Path) -> Self {
        DocumentSource::Path(p.to_path_buf())
    }
}

/// The three documents a run needs. Any may be absent until validated.
#[derive(Debug, Clone, Default)]
pub struct DocumentInputs {
    pub existing_brd: Option<DocumentSource>,
    pub existing_frd: Option<DocumentSource>,
    pub new_brd: Option<DocumentSource>,
}

impl DocumentInputs {
    /// All three documents from paths.
    pub fn from_paths(
        existing_brd: impl AsRef<Path>,
        existing_frd: impl AsRef<Path>,
        new_brd: impl AsRef<Path>,
    ) -> Self {
        Self {
            existing_brd: Some(existing_brd.as_ref().into()),
            existing_frd: Some(existing_frd.as_ref().into()),
            new_brd: Some(new_brd.as_ref().into()),
        }
    }

    /// Check every document is supplied, naming the first one that is not.
    pub fn validate(&self) -> Result<[(&'static str, &DocumentSource); 3], FrdError> {
        fn pick<'a>(
            label: &'static str,
            src: &'a Option<DocumentSource>,
        ) -> Result<(&'static str, &'a DocumentSource), FrdError> {
            src.as_ref()
                .map(|s| (label, s))
                .ok_or_else(|| FrdError::missing(format!("{label} document")))
        }
        Ok([
            pick(EXISTING_BRD, &self.existing_brd)?,
            pick(EXISTING_FRD, &self.existing_frd)?,
            pick(NEW_BRD, &self.new_brd)?,
        ])
    }
}

const EXISTING_BRD: &str = "existing BRD";
const EXISTING_FRD: &str = "existing FRD";
const NEW_BRD: &str = "new BRD";

/// Summaries of the three input documents.
#[derive(Debug, Clone)]
pub struct InputSummaries {
    pub existing_brd: DocumentSummary,
    pub existing_frd: DocumentSummary,
    pub new_brd: DocumentSummary,
}

impl InputSummaries {
    fn failed_chunks(&self) -> usize {
        self.all().iter().map(|s| s.stats.failed_chunks).sum()
    }

    fn all(&self) -> [&DocumentSummary; 3] {
        [&self.existing_brd, &self.existing_frd, &self.new_brd]
    }
}

/// Generate a new FRD from three documents.
///
/// # Errors
/// Fatal only: a missing or unreadable document, an unconfigured provider,
/// or a failed workflow step. Chunks that could not be summarized are
/// replaced by the failure sentinel and counted in
/// [`GenerationStats::failed_chunks`].
///
/// # Example
/// ```rust,no_run
/// use edgequake_frd::{generate_frd, DocumentInputs, GenerationConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let inputs = DocumentInputs::from_paths("old_brd.docx", "old_frd.docx", "new_brd.pptx");
/// let output = generate_frd(&inputs, None, &GenerationConfig::default()).await?;
/// println!("{}", output.frd);
/// # Ok(())
/// # }
/// ```
pub async fn generate_frd(
    inputs: &DocumentInputs,
    notes: Option<&str>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FrdError> {
    let total_start = Instant::now();
    let sources = inputs.validate()?;
    let backend = resolve_backend(config).await?;

    let summarize_start = Instant::now();
    let summaries = summarize_sources(backend.as_ref(), sources, config).await?;
    let summarize_duration_ms = summarize_start.elapsed().as_millis() as u64;

    let mut output =
        generate_from_summaries(backend.as_ref(), summaries, notes, None, config).await?;
    output.stats.summarize_duration_ms = summarize_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(output)
}

/// Generate and write the FRD to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_to_file(
    inputs: &DocumentInputs,
    notes: Option<&str>,
    output_path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<GenerationStats, FrdError> {
    let output = generate_frd(inputs, notes, config).await?;
    write_atomic(output_path.as_ref(), &output.frd).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`generate_frd`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    inputs: &DocumentInputs,
    notes: Option<&str>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FrdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FrdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_frd(inputs, notes, config))
}

/// Summarize one document.
pub async fn summarize_document(
    path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<DocumentSummary, FrdError> {
    let path = path.as_ref();
    let backend = resolve_backend(config).await?;
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    summarize_source(
        backend.as_ref(),
        &DocumentSource::Path(path.to_path_buf()),
        &label,
        config,
    )
    .await
}

/// Segment and chunk counts for a document, without calling the model.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    path: impl AsRef<Path>,
    token_budget: usize,
) -> Result<DocumentInfo, FrdError> {
    if token_budget == 0 {
        return Err(FrdError::InvalidConfig(
            "Chunk token budget must be ≥ 1".into(),
        ));
    }
    let doc = input::resolve_document(path)?;
    let segments = extract::extract_segments(&doc).await?;
    let chunks = chunk_segments(&segments, token_budget);
    Ok(DocumentInfo {
        format: doc.format(),
        segment_count: segments.len(),
        word_count: segments.iter().map(|s| word_count(s)).sum(),
        chunk_count: chunks.len(),
        chunk_word_counts: chunks.iter().map(|c| c.word_count).collect(),
    })
}

/// Summarize every input document, failing before any call if one is missing.
pub async fn summarize_inputs(
    backend: &dyn ChatBackend,
    inputs: &DocumentInputs,
    config: &GenerationConfig,
) -> Result<InputSummaries, FrdError> {
    let sources = inputs.validate()?;
    summarize_sources(backend, sources, config).await
}

/// Run the workflow over existing summaries and clean the result.
///
/// `previous_frd` turns the run into a revision of that FRD.
pub async fn generate_from_summaries(
    backend: &dyn ChatBackend,
    summaries: InputSummaries,
    notes: Option<&str>,
    previous_frd: Option<&str>,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FrdError> {
    let mut state = WorkflowState::from_summaries(
        summaries.existing_brd.text.as_str(),
        summaries.existing_frd.text.as_str(),
        summaries.new_brd.text.as_str(),
    );
    if let Some(n) = notes {
        state = state.with_user_notes(n);
    }
    if let Some(prev) = previous_frd {
        state = state.with_previous_frd(prev);
    }

    let workflow = if config.extract_style_pattern {
        Workflow::with_style_pattern()
    } else {
        Workflow::single_step()
    };
    let options = StepOptions {
        temperature: config.temperature,
        max_tokens: config.generation_max_tokens,
        timeout: config.api_timeout(),
    };

    let workflow_start = Instant::now();
    let finished = workflow
        .run(backend, &state, &options, config.progress_callback.as_ref())
        .await?;
    let workflow_duration_ms = workflow_start.elapsed().as_millis() as u64;

    let frd = finished
        .get(workflow.terminal_field())
        .map(postprocess::clean_document)
        .ok_or_else(|| FrdError::StepFailed {
            step: workflow
                .step_names()
                .last()
                .copied()
                .unwrap_or("generate_frd")
                .to_string(),
            message: "model returned an empty document".into(),
        })?;
    info!("Generated FRD: {} chars", frd.len());

    let stats = GenerationStats {
        steps_run: workflow.step_names().iter().map(|s| s.to_string()).collect(),
        failed_chunks: summaries.failed_chunks(),
        total_input_tokens: summaries
            .all()
            .iter()
            .map(|s| s.stats.total_input_tokens)
            .sum(),
        total_output_tokens: summaries
            .all()
            .iter()
            .map(|s| s.stats.total_output_tokens)
            .sum(),
        summarize_duration_ms: summaries.all().iter().map(|s| s.stats.duration_ms).sum(),
        workflow_duration_ms,
        total_duration_ms: workflow_duration_ms,
    };

    Ok(GenerationOutput {
        frd,
        style_pattern: finished.get(StateField::StylePattern).map(str::to_string),
        existing_brd: summaries.existing_brd,
        existing_frd: summaries.existing_frd,
        new_brd: summaries.new_brd,
        stats,
    })
}

/// Write `contents` to `path` via a sibling temp file and rename.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), FrdError> {
    let write_err = |e: std::io::Error| FrdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn summarize_sources(
    backend: &dyn ChatBackend,
    sources: [(&'static str, &DocumentSource); 3],
    config: &GenerationConfig,
) -> Result<InputSummaries, FrdError> {
    let [(l1, s1), (l2, s2), (l3, s3)] = sources;
    // Every document is read before the first summary call.
    let existing_brd = load_segments(s1, l1).await?;
    let existing_frd = load_segments(s2, l2).await?;
    let new_brd = load_segments(s3, l3).await?;

    Ok(InputSummaries {
        existing_brd: summarize::summarize_segments(backend, &existing_brd, l1, config).await,
        existing_frd: summarize::summarize_segments(backend, &existing_frd, l2, config).await,
        new_brd: summarize::summarize_segments(backend, &new_brd, l3, config).await,
    })
}

async fn summarize_source(
    backend: &dyn ChatBackend,
    source: &DocumentSource,
    label: &str,
    config: &GenerationConfig,
) -> Result<DocumentSummary, FrdError> {
    let segments = load_segments(source, label).await?;
    Ok(summarize::summarize_segments(backend, &segments, label, config).await)
}

/// Validate and extract one document. Never calls the model.
async fn load_segments(source: &DocumentSource, label: &str) -> Result<Vec<String>, FrdError> {
    info!("Reading {}: {}", label, source.describe());
    match source {
        DocumentSource::Path(path) => {
            let doc = input::resolve_document(path)?;
            extract::extract_segments(&doc).await
        }
        DocumentSource::Bytes { name, bytes } => {
            let format = DocumentFormat::from_path(Path::new(name)).ok_or_else(|| {
                FrdError::UnsupportedFormat {
                    path: PathBuf::from(name),
                }
            })?;
            extract::extract_segments_from_bytes(bytes, name, format).await
        }
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, FrdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        FrdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the chat backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are set.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, then full auto-detection via
///    [`ProviderFactory::from_env`].
pub async fn resolve_backend(config: &GenerationConfig) -> Result<Arc<dyn ChatBackend>, FrdError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(ProviderBackend::new(provider)))
}

fn resolve_provider(config: &GenerationConfig) -> Result<Arc<dyn LLMProvider>, FrdError> {
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| FrdError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
