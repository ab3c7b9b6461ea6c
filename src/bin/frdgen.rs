//! CLI binary for edgequake-frd.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GenerationConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_frd::{
    generate_frd, generate_to_file, inspect, summarize_document, DocumentInputs,
    GenerationConfig, GenerationProgressCallback, ProgressCallback, Session,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar per document while its chunks are summarized,
/// then a spinner per workflow step.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(Self::spinner_style());
        bar.set_prefix("Preparing");
        bar.set_message("Reading documents…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS)
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS)
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_summary_start(&self, document: &str, total_chunks: usize) {
        self.bar.set_style(Self::bar_style());
        self.bar.set_length(total_chunks as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(document.to_string());
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Summarizing {document}: {total_chunks} chunks"))
        ));
    }

    fn on_chunk_complete(&self, _document: &str, completed: usize, _total: usize) {
        self.bar.set_position(completed as u64);
    }

    fn on_chunk_error(&self, document: &str, chunk_index: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {} chunk {:>3}  {}",
            red("✗"),
            document,
            chunk_index + 1,
            red(&msg)
        ));
    }

    fn on_summary_complete(&self, document: &str, total_chunks: usize, failed_chunks: usize) {
        let mark = if failed_chunks == 0 {
            green("✓")
        } else {
            cyan("⚠")
        };
        self.bar.println(format!(
            "  {} {}  {}",
            mark,
            document,
            dim(&format!(
                "{}/{} chunks summarized",
                total_chunks - failed_chunks,
                total_chunks
            ))
        ));
    }

    fn on_step_start(&self, step: &str, index: usize, total_steps: usize) {
        self.bar.set_style(Self::spinner_style());
        self.bar.set_prefix(format!("Step {index}/{total_steps}"));
        self.bar.set_message(step.to_string());
    }

    fn on_step_complete(&self, step: &str, output_len: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            step,
            dim(&format!("{output_len} chars"))
        ));
    }
}

impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Draft a new FRD (stdout)
  frdgen generate brd_v1.docx frd_v1.docx brd_v2.pptx

  # Write to file, with notes and a style-pattern pass
  frdgen generate brd_v1.docx frd_v1.docx brd_v2.docx -o frd_v2.txt \
      --notes "Keep FR-x numbering" --style-pattern

  # Revise a generated FRD
  frdgen enhance brd_v1.docx frd_v1.docx brd_v2.docx --frd frd_v2.txt \
      --notes "Add a refunds section" -o frd_v2.txt

  # Summarize one document
  frdgen summarize brd_v2.docx

  # Segment and chunk counts (no API key needed)
  frdgen inspect brd_v2.docx --chunk-tokens 1500

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

/// Generate Functional Requirements Documents from BRDs using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "frdgen",
    version,
    about = "Generate a new FRD from an existing BRD/FRD pair and a new BRD",
    long_about = "Summarize an existing BRD, its FRD and a new BRD (.docx, .pptx, .txt, .md) \
chunk by chunk, then ask an LLM to write the new FRD in the style of the existing one. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// LLM model ID (e.g. gpt-4o, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent summarization calls.
    #[arg(short, long, global = true, env = "FRDGEN_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// Attempts per chunk, including the first.
    #[arg(
        long,
        global = true,
        env = "FRDGEN_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_attempts: u32,

    /// Word budget per summarization chunk.
    #[arg(long, global = true, env = "FRDGEN_CHUNK_TOKENS", default_value_t = 2000)]
    chunk_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "FRDGEN_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, global = true, env = "FRDGEN_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Output structured JSON instead of text.
    #[arg(long, global = true, env = "FRDGEN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "FRDGEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FRDGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FRDGEN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new FRD.
    Generate {
        #[command(flatten)]
        docs: DocumentArgs,

        #[command(flatten)]
        notes: NotesArgs,

        /// Describe the existing FRD's layout first and follow it.
        #[arg(long)]
        style_pattern: bool,

        /// Write the FRD to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Revise a previously generated FRD with requested changes.
    Enhance {
        #[command(flatten)]
        docs: DocumentArgs,

        /// The FRD to revise.
        #[arg(long)]
        frd: PathBuf,

        #[command(flatten)]
        notes: NotesArgs,

        /// Describe the existing FRD's layout first and follow it.
        #[arg(long)]
        style_pattern: bool,

        /// Write the revised FRD to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize one document.
    Summarize {
        input: PathBuf,

        /// Write the summary to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print segment and chunk counts, no LLM calls.
    Inspect { input: PathBuf },
}

#[derive(Args, Debug)]
struct DocumentArgs {
    /// Existing Business Requirements Document.
    existing_brd: PathBuf,
    /// Existing Functional Requirements Document.
    existing_frd: PathBuf,
    /// New Business Requirements Document.
    new_brd: PathBuf,
}

impl DocumentArgs {
    fn inputs(&self) -> DocumentInputs {
        DocumentInputs::from_paths(&self.existing_brd, &self.existing_frd, &self.new_brd)
    }
}

#[derive(Args, Debug)]
struct NotesArgs {
    /// Instructions for the model.
    #[arg(long)]
    notes: Option<String>,

    /// Read instructions from a file (appended after --notes).
    #[arg(long)]
    notes_file: Option<PathBuf>,
}

impl NotesArgs {
    async fn resolve(&self) -> Result<Option<String>> {
        let mut parts = Vec::new();
        if let Some(ref n) = self.notes {
            parts.push(n.trim().to_string());
        }
        if let Some(ref path) = self.notes_file {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read notes from {:?}", path))?;
            parts.push(text.trim().to_string());
        }
        parts.retain(|p| !p.is_empty());
        Ok((!parts.is_empty()).then(|| parts.join("\n\n")))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Inspect { input } => run_inspect(&cli, input).await,
        Command::Summarize { input, output } => {
            let config = build_config(&cli, false, show_progress)?;
            let summary = summarize_document(input, &config)
                .await
                .context("Summarization failed")?;
            if cli.json {
                emit(&serde_json::to_string_pretty(&summary)?, output.as_deref()).await
            } else {
                emit(&summary.text, output.as_deref()).await?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {}/{} chunks  {}ms",
                        status_mark(summary.stats.failed_chunks),
                        summary.stats.chunk_count - summary.stats.failed_chunks,
                        summary.stats.chunk_count,
                        summary.stats.duration_ms
                    );
                }
                Ok(())
            }
        }
        Command::Generate {
            docs,
            notes,
            style_pattern,
            output,
        } => {
            let config = build_config(&cli, *style_pattern, show_progress)?;
            let notes = notes.resolve().await?;
            let inputs = docs.inputs();

            if let (Some(path), false) = (output, cli.json) {
                let stats = generate_to_file(&inputs, notes.as_deref(), path, &config)
                    .await
                    .context("FRD generation failed")?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {}  {}ms  →  {}",
                        status_mark(stats.failed_chunks),
                        stats.steps_run.join(" → "),
                        stats.total_duration_ms,
                        bold(&path.display().to_string()),
                    );
                    eprintln!(
                        "   {} tokens in  /  {} tokens out",
                        dim(&stats.total_input_tokens.to_string()),
                        dim(&stats.total_output_tokens.to_string()),
                    );
                }
                return Ok(());
            }

            let out = generate_frd(&inputs, notes.as_deref(), &config)
                .await
                .context("FRD generation failed")?;
            if cli.json {
                emit(&serde_json::to_string_pretty(&out)?, output.as_deref()).await?;
            } else {
                emit(&out.frd, None).await?;
            }
            if !cli.quiet && out.stats.failed_chunks > 0 {
                eprintln!(
                    "{} {} chunk(s) could not be summarized",
                    cyan("⚠"),
                    out.stats.failed_chunks
                );
            }
            Ok(())
        }
        Command::Enhance {
            docs,
            frd,
            notes,
            style_pattern,
            output,
        } => {
            let config = build_config(&cli, *style_pattern, show_progress)?;
            let notes = notes
                .resolve()
                .await?
                .context("Enhancement needs --notes or --notes-file")?;
            let previous = tokio::fs::read_to_string(frd)
                .await
                .with_context(|| format!("Failed to read FRD from {:?}", frd))?;

            let mut session = Session::connect(config)
                .await
                .context("Failed to set up LLM provider")?;
            session
                .summarize_inputs(&docs.inputs())
                .await
                .context("Summarization failed")?;
            session.load_frd(previous)?;
            let revised = session
                .enhance(&notes)
                .await
                .context("FRD enhancement failed")?;

            if cli.json {
                emit(&serde_json::to_string_pretty(revised)?, output.as_deref()).await
            } else if let Some(path) = output {
                session.save(path).await.context("Failed to save FRD")?;
                if !cli.quiet {
                    eprintln!(
                        "{}  revised FRD  →  {}",
                        green("✔"),
                        bold(&path.display().to_string())
                    );
                }
                Ok(())
            } else {
                emit(&revised.frd, None).await
            }
        }
    }
}

async fn run_inspect(cli: &Cli, input: &Path) -> Result<()> {
    let info = inspect(input, cli.chunk_tokens)
        .await
        .context("Failed to inspect document")?;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialize info")?
        );
    } else {
        println!("File:         {}", input.display());
        println!("Format:       {}", info.format);
        println!("Segments:     {}", info.segment_count);
        println!("Words:        {}", info.word_count);
        println!(
            "Chunks:       {} (budget {} words)",
            info.chunk_count, cli.chunk_tokens
        );
        if !info.chunk_word_counts.is_empty() {
            let sizes: Vec<String> = info
                .chunk_word_counts
                .iter()
                .map(|n| n.to_string())
                .collect();
            println!("Chunk sizes:  {}", sizes.join(", "));
        }
    }
    Ok(())
}

/// Map CLI args to `GenerationConfig`.
fn build_config(cli: &Cli, style_pattern: bool, show_progress: bool) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .concurrency(cli.concurrency)
        .max_attempts(cli.max_attempts)
        .max_tokens_per_chunk(cli.chunk_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .extract_style_pattern(style_pattern);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write `text` to `path`, or to stdout with a trailing newline.
async fn emit(text: &str, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        return Ok(());
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn status_mark(failed: usize) -> String {
    if failed == 0 {
        green("✔")
    } else {
        cyan("⚠")
    }
}
