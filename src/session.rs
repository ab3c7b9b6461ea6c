//! Per-user session: the state an interactive front end keeps between actions.
//!
//! A [`Session`] remembers the three document summaries and the last FRD so
//! a user can generate once, then ask for revisions without re-summarizing.
//! Every operation either completes and updates the session, or fails and
//! leaves it exactly as it was.

use crate::config::GenerationConfig;
use crate::error::FrdError;
use crate::generate::{
    generate_from_summaries, resolve_backend, summarize_inputs, write_atomic, DocumentInputs,
    InputSummaries,
};
use crate::output::GenerationOutput;
use crate::pipeline::llm::ChatBackend;
use crate::prompts::enhancement_notes;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct Session {
    backend: Arc<dyn ChatBackend>,
    config: GenerationConfig,
    summaries: Option<InputSummaries>,
    current: Option<GenerationOutput>,
    generation: u32,
}

impl Session {
    /// Open a session, resolving the backend from `config`.
    pub async fn connect(config: GenerationConfig) -> Result<Self, FrdError> {
        let backend = resolve_backend(&config).await?;
        Ok(Self::with_backend(backend, config))
    }

    pub fn with_backend(backend: Arc<dyn ChatBackend>, config: GenerationConfig) -> Self {
        Self {
            backend,
            config,
            summaries: None,
            current: None,
            generation: 0,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn summaries(&self) -> Option<&InputSummaries> {
        self.summaries.as_ref()
    }

    /// The latest generated or revised FRD.
    pub fn current_frd(&self) -> Option<&str> {
        self.current.as_ref().map(|o| o.frd.as_str())
    }

    pub fn current_output(&self) -> Option<&GenerationOutput> {
        self.current.as_ref()
    }

    /// Number of successful generate and enhance runs.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Summarize the three documents and keep the summaries.
    ///
    /// Fails with [`FrdError::MissingInput`] before any call if a document
    /// is absent.
    pub async fn summarize_inputs(
        &mut self,
        inputs: &DocumentInputs,
    ) -> Result<&InputSummaries, FrdError> {
        let summaries = summarize_inputs(self.backend.as_ref(), inputs, &self.config).await?;
        Ok(self.summaries.insert(summaries))
    }

    /// Summarize the documents and generate a fresh FRD.
    pub async fn generate(
        &mut self,
        inputs: &DocumentInputs,
        notes: Option<&str>,
    ) -> Result<&GenerationOutput, FrdError> {
        let summaries = summarize_inputs(self.backend.as_ref(), inputs, &self.config).await?;
        let output = generate_from_summaries(
            self.backend.as_ref(),
            summaries.clone(),
            notes,
            None,
            &self.config,
        )
        .await?;
        self.summaries = Some(summaries);
        Ok(self.commit(output))
    }

    /// Use `frd` as the current FRD, e.g. one loaded from disk.
    ///
    /// Needs summaries already in the session.
    pub fn load_frd(&mut self, frd: impl Into<String>) -> Result<(), FrdError> {
        let summaries = self
            .summaries
            .clone()
            .ok_or_else(|| FrdError::missing("document summaries (summarize the inputs first)"))?;
        self.current = Some(GenerationOutput {
            frd: frd.into(),
            style_pattern: None,
            existing_brd: summaries.existing_brd,
            existing_frd: summaries.existing_frd,
            new_brd: summaries.new_brd,
            stats: Default::default(),
        });
        Ok(())
    }

    /// Revise the current FRD with the user's requested changes.
    ///
    /// Requires non-blank `changes` and a current FRD. The revision replaces
    /// the current FRD only when the run succeeds.
    pub async fn enhance(&mut self, changes: &str) -> Result<&GenerationOutput, FrdError> {
        if changes.trim().is_empty() {
            return Err(FrdError::missing("enhancement notes"));
        }
        let previous = self
            .current
            .as_ref()
            .map(|o| o.frd.clone())
            .ok_or_else(|| FrdError::missing("a generated FRD to enhance"))?;
        let summaries = self
            .summaries
            .clone()
            .ok_or_else(|| FrdError::missing("document summaries"))?;

        let notes = enhancement_notes(changes);
        let output = generate_from_summaries(
            self.backend.as_ref(),
            summaries,
            Some(&notes),
            Some(&previous),
            &self.config,
        )
        .await?;
        Ok(self.commit(output))
    }

    /// Write the current FRD to `path` atomically.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), FrdError> {
        let frd = self
            .current_frd()
            .ok_or_else(|| FrdError::missing("a generated FRD to save"))?;
        write_atomic(path.as_ref(), frd).await?;
        info!("Saved FRD to {}", path.as_ref().display());
        Ok(())
    }

    fn commit(&mut self, output: GenerationOutput) -> &GenerationOutput {
        self.generation += 1;
        info!("FRD generation {} ready", self.generation);
        self.current.insert(output)
    }
}
