//! Integration tests for the summarize → workflow pipeline.
//!
//! Every test runs against a scripted in-process backend, so no API key or
//! network access is needed. Fixtures are written to temp dirs: a `.docx`
//! built with `docx-rust`, a `.pptx` assembled with `zip`, and plain text.

use async_trait::async_trait;
use docx_rust::document::Paragraph;
use docx_rust::Docx;
use edgequake_frd::prompts::{
    FAILED_CHUNK_SENTINEL, GENERATE_FRD_SYSTEM_PROMPT, STYLE_PATTERN_SYSTEM_PROMPT,
    SUMMARY_SYSTEM_PROMPT,
};
use edgequake_frd::{
    generate_frd, generate_sync, CallError, ChatBackend, Completion, CompletionRequest,
    DocumentInputs, DocumentSource, FrdError, GenerationConfig, GenerationProgressCallback,
    Session, StateField, Workflow, WorkflowState,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use zip::write::SimpleFileOptions;

// ── Scripted backend ─────────────────────────────────────────────────────────

/// Answers by prompt kind and records every request.
#[derive(Default)]
struct Scripted {
    requests: Mutex<Vec<CompletionRequest>>,
    /// Chunks containing this marker always fail with a transient error.
    poison: Option<&'static str>,
    /// Fail every workflow step.
    fail_steps: AtomicBool,
}

impl Scripted {
    fn with_poison(marker: &'static str) -> Self {
        Self {
            poison: Some(marker),
            ..Default::default()
        }
    }

    fn requests_with_system(&self, system: &str) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.prompt.system == system)
            .cloned()
            .collect()
    }

    fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for Scripted {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CallError> {
        self.requests.lock().unwrap().push(request.clone());
        let system = request.prompt.system.as_str();
        let user = request.prompt.user.as_str();

        let content = if system == SUMMARY_SYSTEM_PROMPT {
            if self.poison.is_some_and(|p| user.contains(p)) {
                return Err(CallError::Transient("503 Service Unavailable".into()));
            }
            format!("S[{}]", user.replace('\n', " | "))
        } else if self.fail_steps.load(Ordering::SeqCst) {
            return Err(CallError::Permanent("401 Unauthorized".into()));
        } else if system == STYLE_PATTERN_SYSTEM_PROMPT {
            "1. Purpose / 2. Functional Requirements (FR-n)".to_string()
        } else if system == GENERATE_FRD_SYSTEM_PROMPT {
            let n = self.requests_with_system(GENERATE_FRD_SYSTEM_PROMPT).len();
            format!("```markdown\n# FRD v{n}\r\n\r\nFR-1 Login  \n```")
        } else {
            return Err(CallError::Permanent(format!("unexpected prompt: {system}")));
        };

        Ok(Completion {
            content,
            prompt_tokens: 10,
            completion_tokens: 5,
        })
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn write_docx(dir: &Path, name: &str, paragraphs: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut docx = Docx::default();
    for text in paragraphs {
        docx.document.push(Paragraph::default().push_text(*text));
    }
    docx.write_file(&path).unwrap();
    path
}

fn slide_xml(shapes: &[&str]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><p:sld><p:cSld><p:spTree>"#,
    );
    for text in shapes {
        xml.push_str(&format!(
            "<p:sp><p:spPr/><p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sp>"
        ));
    }
    xml.push_str("</p:spTree></p:cSld></p:sld>");
    xml
}

/// Slides are listed out of numeric order to exercise `sldIdLst`.
fn write_pptx(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = SimpleFileOptions::default();

    let entries = [
        (
            "ppt/presentation.xml",
            r#"<p:presentation><p:sldIdLst><p:sldId id="256" r:id="rId7"/><p:sldId id="257" r:id="rId8"/></p:sldIdLst></p:presentation>"#.to_string(),
        ),
        (
            "ppt/_rels/presentation.xml.rels",
            r#"<Relationships><Relationship Id="rId7" Type="slide" Target="slides/slide2.xml"/><Relationship Id="rId8" Type="slide" Target="slides/slide1.xml"/></Relationships>"#.to_string(),
        ),
        ("ppt/slides/slide1.xml", slide_xml(&["Req 3: refund"])),
        (
            "ppt/slides/slide2.xml",
            slide_xml(&["Checkout &amp; Payments", "Req 2: checkout"]),
        ),
    ];
    for (entry, body) in entries {
        zip.start_file(entry, opts).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn write_text(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

struct Fixture {
    _dir: TempDir,
    inputs: DocumentInputs,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let brd = write_docx(
        dir.path(),
        "brd_v1.docx",
        &["Business goals", "Req 1: login"],
    );
    let frd = write_text(
        dir.path(),
        "frd_v1.md",
        "# FRD v1\n\nFR-1 The system shall allow login.\n",
    );
    let new_brd = write_pptx(dir.path(), "brd_v2.pptx");
    Fixture {
        inputs: DocumentInputs::from_paths(brd, frd, new_brd),
        _dir: dir,
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_with(backend: Arc<Scripted>) -> GenerationConfig {
    GenerationConfig::builder()
        .backend(backend)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

// ── Generation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn generates_cleaned_frd_from_three_formats() {
    let fx = fixture();
    let backend = Arc::new(Scripted::default());
    let out = generate_frd(&fx.inputs, None, &config_with(backend.clone()))
        .await
        .unwrap();

    assert_eq!(out.frd, "# FRD v1\n\nFR-1 Login\n");
    assert_eq!(out.existing_brd.text, "S[Business goals | Req 1: login]");
    assert_eq!(
        out.new_brd.text,
        "S[Checkout & Payments | Req 2: checkout | Req 3: refund]"
    );
    assert_eq!(out.stats.steps_run, vec!["generate_frd"]);
    assert_eq!(out.stats.failed_chunks, 0);
    assert!(out.style_pattern.is_none());

    let gen = backend.requests_with_system(GENERATE_FRD_SYSTEM_PROMPT);
    assert_eq!(gen.len(), 1);
    assert!(gen[0]
        .prompt
        .user
        .contains("NEW BRD SUMMARY:\nS[Checkout & Payments"));
    assert!(!gen[0].prompt.user.contains("USER NOTES"));
    assert_eq!(backend.call_count(), 4);
}

#[tokio::test]
async fn failed_chunk_becomes_sentinel_and_generation_continues() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let brd = write_text(dir.path(), "brd.txt", "Intro words here\nREDACTED block\nOutro line here\n");
    let frd = write_text(dir.path(), "frd.txt", "FR-1 login\n");
    let new_brd = write_text(dir.path(), "new.txt", "Req 9: export\n");

    let backend = Arc::new(Scripted::with_poison("REDACTED"));
    let config = GenerationConfig::builder()
        .backend(backend.clone())
        .max_tokens_per_chunk(3)
        .max_attempts(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let out = generate_frd(&DocumentInputs::from_paths(brd, frd, new_brd), None, &config)
        .await
        .unwrap();

    let chunks = &out.existing_brd.chunks;
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].summary, "S[Intro words here]");
    assert_eq!(chunks[1].summary, FAILED_CHUNK_SENTINEL);
    assert_eq!(chunks[1].attempts, 2);
    assert_eq!(chunks[2].summary, "S[Outro line here]");
    assert_eq!(out.stats.failed_chunks, 1);

    let gen = backend.requests_with_system(GENERATE_FRD_SYSTEM_PROMPT);
    assert!(gen[0].prompt.user.contains(FAILED_CHUNK_SENTINEL));
}

#[tokio::test]
async fn style_pattern_runs_before_generation() {
    let fx = fixture();
    let backend = Arc::new(Scripted::default());
    let config = GenerationConfig::builder()
        .backend(backend.clone())
        .extract_style_pattern(true)
        .build()
        .unwrap();

    let out = generate_frd(&fx.inputs, Some("Keep FR numbering"), &config)
        .await
        .unwrap();

    assert_eq!(
        out.stats.steps_run,
        vec!["extract_style_pattern", "generate_frd"]
    );
    assert_eq!(
        out.style_pattern.as_deref(),
        Some("1. Purpose / 2. Functional Requirements (FR-n)")
    );

    let requests = backend.requests.lock().unwrap();
    let systems: Vec<&str> = requests
        .iter()
        .map(|r| r.prompt.system.as_str())
        .filter(|s| *s != SUMMARY_SYSTEM_PROMPT)
        .collect();
    assert_eq!(
        systems,
        vec![STYLE_PATTERN_SYSTEM_PROMPT, GENERATE_FRD_SYSTEM_PROMPT]
    );
    let gen = requests.last().unwrap();
    assert!(gen.prompt.user.contains("FRD PATTERN TO FOLLOW:\n1. Purpose"));
    assert!(gen.prompt.user.contains("USER NOTES:\nKeep FR numbering"));
}

#[tokio::test]
async fn step_failure_is_fatal_and_not_retried() {
    init_tracing();
    let fx = fixture();
    let backend = Arc::new(Scripted::default());
    backend.fail_steps.store(true, Ordering::SeqCst);

    let err = generate_frd(&fx.inputs, None, &config_with(backend.clone()))
        .await
        .unwrap_err();
    match err {
        FrdError::StepFailed { step, .. } => assert_eq!(step, "generate_frd"),
        other => panic!("expected StepFailed, got {other}"),
    }
    assert_eq!(
        backend.requests_with_system(GENERATE_FRD_SYSTEM_PROMPT).len(),
        1
    );
}

#[tokio::test]
async fn missing_document_is_rejected_before_any_call() {
    let fx = fixture();
    let backend = Arc::new(Scripted::default());
    let inputs = DocumentInputs {
        new_brd: None,
        ..fx.inputs.clone()
    };
    let err = generate_frd(&inputs, None, &config_with(backend.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, FrdError::MissingInput { .. }));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn corrupt_container_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write_text(dir.path(), "broken.docx", "not a zip");
    let ok = write_text(dir.path(), "ok.txt", "fine\n");
    let backend = Arc::new(Scripted::default());
    let err = generate_frd(
        &DocumentInputs::from_paths(&bad, &ok, &ok),
        None,
        &config_with(backend.clone()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, FrdError::CorruptDocument { .. }));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn corrupt_last_document_fails_before_any_summary_call() {
    let dir = tempfile::tempdir().unwrap();
    let ok = write_text(dir.path(), "ok.txt", "Req 1: login\nReq 2: checkout\n");
    let bad = write_text(dir.path(), "brd_v2.docx", "not a zip");
    let backend = Arc::new(Scripted::default());
    let err = generate_frd(
        &DocumentInputs::from_paths(&ok, &ok, &bad),
        None,
        &config_with(backend.clone()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, FrdError::CorruptDocument { .. }));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn absent_last_document_fails_before_any_summary_call() {
    let dir = tempfile::tempdir().unwrap();
    let ok = write_text(dir.path(), "ok.txt", "Req 1: login\n");
    let backend = Arc::new(Scripted::default());
    let mut session = Session::with_backend(backend.clone(), config_with(backend.clone()));
    let result = session
        .summarize_inputs(&DocumentInputs::from_paths(
            &ok,
            &ok,
            dir.path().join("nope.docx"),
        ))
        .await;
    assert!(result.is_err());
    assert_eq!(backend.call_count(), 0);
    assert!(session.summaries().is_none());
}

#[tokio::test]
async fn uploaded_bytes_are_summarized() {
    let fx = fixture();
    let backend = Arc::new(Scripted::default());
    let inputs = DocumentInputs {
        new_brd: Some(DocumentSource::Bytes {
            name: "upload.txt".into(),
            bytes: b"Req 4: audit log\n".to_vec(),
        }),
        ..fx.inputs.clone()
    };
    let out = generate_frd(&inputs, None, &config_with(backend))
        .await
        .unwrap();
    assert_eq!(out.new_brd.text, "S[Req 4: audit log]");
}

#[test]
fn sync_wrapper_runs_the_pipeline() {
    let fx = fixture();
    let out = generate_sync(&fx.inputs, None, &config_with(Arc::new(Scripted::default())))
        .unwrap();
    assert!(out.frd.starts_with("# FRD"));
}

// ── Workflow ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_step_workflow_with_missing_first_input_makes_no_calls() {
    let backend = Scripted::default();
    let state = WorkflowState {
        existing_brd_summary: Some("brd".into()),
        new_brd_summary: Some("new".into()),
        ..Default::default()
    };
    let before = state.clone();

    let err = Workflow::with_style_pattern()
        .run(&backend, &state, &Default::default(), None)
        .await
        .unwrap_err();

    match err {
        FrdError::MissingInput { what } => {
            assert!(what.contains("existing FRD summary"), "got: {what}");
            assert!(what.contains("extract_style_pattern"), "got: {what}");
        }
        other => panic!("expected MissingInput, got {other}"),
    }
    assert_eq!(backend.call_count(), 0);
    assert_eq!(state, before);
}

#[tokio::test]
async fn workflow_run_leaves_input_state_untouched() {
    let backend = Scripted::default();
    let state = WorkflowState::from_summaries("brd", "frd", "new");
    let done = Workflow::single_step()
        .run(&backend, &state, &Default::default(), None)
        .await
        .unwrap();
    assert!(state.new_frd.is_none());
    assert!(done.get(StateField::NewFrd).is_some());
    assert_eq!(done.get(StateField::ExistingBrdSummary), Some("brd"));
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(String, usize, usize)>>,
    steps: Mutex<Vec<String>>,
}

impl GenerationProgressCallback for Recorder {
    fn on_chunk_complete(&self, document: &str, completed: usize, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push((document.to_string(), completed, total));
    }

    fn on_step_start(&self, step: &str, _index: usize, _total_steps: usize) {
        self.steps.lock().unwrap().push(step.to_string());
    }
}

#[tokio::test]
async fn progress_is_monotonic_and_reaches_total_once() {
    let dir = tempfile::tempdir().unwrap();
    let many: String = (1..=12).map(|i| format!("Req {i}: item\n")).collect();
    let brd = write_text(dir.path(), "brd.txt", &many);
    let frd = write_text(dir.path(), "frd.txt", "FR-1\n");
    let new_brd = write_text(dir.path(), "new.txt", "BAD one\nok two\n");

    let recorder = Arc::new(Recorder::default());
    let config = GenerationConfig::builder()
        .backend(Arc::new(Scripted::with_poison("BAD")))
        .progress_callback(recorder.clone())
        .max_tokens_per_chunk(3)
        .concurrency(4)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    generate_frd(&DocumentInputs::from_paths(brd, frd, new_brd), None, &config)
        .await
        .unwrap();

    let events = recorder.events.lock().unwrap();
    for doc in ["existing BRD", "existing FRD", "new BRD"] {
        let seen: Vec<(usize, usize)> = events
            .iter()
            .filter(|(d, _, _)| d == doc)
            .map(|(_, c, t)| (*c, *t))
            .collect();
        let total = seen[0].1;
        let completed: Vec<usize> = seen.iter().map(|(c, _)| *c).collect();
        assert_eq!(completed, (1..=total).collect::<Vec<_>>(), "{doc}");
        assert_eq!(completed.iter().filter(|c| **c == total).count(), 1);
    }
    assert_eq!(*recorder.steps.lock().unwrap(), vec!["generate_frd"]);
}

// ── Session ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_generate_enhance_and_save() {
    let fx = fixture();
    let backend = Arc::new(Scripted::default());
    let mut session = Session::with_backend(backend.clone(), config_with(backend.clone()));

    let first = session.generate(&fx.inputs, None).await.unwrap().frd.clone();
    assert_eq!(first, "# FRD v1\n\nFR-1 Login\n");
    assert_eq!(session.generation(), 1);
    let calls_after_generate = backend.call_count();

    let revised = session.enhance("Add a refunds section").await.unwrap();
    assert_eq!(revised.frd, "# FRD v2\n\nFR-1 Login\n");
    assert_eq!(session.generation(), 2);
    // Summaries are reused: exactly one more call.
    assert_eq!(backend.call_count(), calls_after_generate + 1);

    let gen = backend.requests_with_system(GENERATE_FRD_SYSTEM_PROMPT);
    let prompt = &gen[1].prompt.user;
    assert!(prompt.contains(&format!("CURRENT FRD VERSION:\n{first}")));
    assert!(prompt.contains("USER REQUESTED CHANGES:\nAdd a refunds section"));
    assert!(prompt.ends_with("Please return the complete revised FRD."));

    let out_dir = tempfile::tempdir().unwrap();
    let out = out_dir.path().join("frd_v2.txt");
    session.save(&out).await.unwrap();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "# FRD v2\n\nFR-1 Login\n");
}

#[tokio::test]
async fn failed_enhancement_keeps_previous_frd() {
    let fx = fixture();
    let backend = Arc::new(Scripted::default());
    let mut session = Session::with_backend(backend.clone(), config_with(backend.clone()));
    session.generate(&fx.inputs, None).await.unwrap();

    backend.fail_steps.store(true, Ordering::SeqCst);
    let err = session.enhance("Add exports").await.unwrap_err();
    assert!(matches!(err, FrdError::StepFailed { .. }));
    assert_eq!(session.current_frd(), Some("# FRD v1\n\nFR-1 Login\n"));
    assert_eq!(session.generation(), 1);
}

#[test]
fn session_enhances_a_loaded_frd() {
    let fx = fixture();
    let backend = Arc::new(Scripted::default());
    let mut session = Session::with_backend(backend.clone(), config_with(backend.clone()));

    tokio_test::block_on(async {
        session.summarize_inputs(&fx.inputs).await.unwrap();
        session.load_frd("# Hand-edited FRD\n").unwrap();
        session.enhance("Tighten FR-1").await.unwrap();
    });

    let gen = backend.requests_with_system(GENERATE_FRD_SYSTEM_PROMPT);
    assert_eq!(gen.len(), 1);
    assert!(gen[0]
        .prompt
        .user
        .contains("CURRENT FRD VERSION:\n# Hand-edited FRD"));
}
