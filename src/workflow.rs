//! Workflow sequencer: a fixed, linear list of model-call steps.
//!
//! A [`Workflow`] threads a strongly typed [`WorkflowState`] through its
//! steps in order. Each step declares the fields it needs and the one field
//! it writes, builds one prompt pair from the state, calls the model exactly
//! once and merges the answer back. There is one entry step and one terminal
//! step; nothing branches or loops.
//!
//! ```text
//! single_step:         [generate_frd] ──▶ new_frd
//! with_style_pattern:  [extract_style_pattern] ──▶ style_pattern ──▶ [generate_frd] ──▶ new_frd
//! ```
//!
//! Before the first call, [`Workflow::validate`] walks the steps and checks
//! that every required field is either in the initial state or written by an
//! earlier step. A failed step call aborts the run with
//! [`FrdError::StepFailed`]; there is no retry and no partial output. The
//! caller's state is never mutated.

use crate::error::FrdError;
use crate::pipeline::llm::{complete_with_timeout, ChatBackend, CompletionRequest, PromptPair};
use crate::progress::ProgressCallback;
use crate::prompts::{
    generate_frd_user_prompt, style_pattern_user_prompt, GenerateFrdInputs,
    GENERATE_FRD_SYSTEM_PROMPT, STYLE_PATTERN_SYSTEM_PROMPT,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Names of the [`WorkflowState`] fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    ExistingBrdSummary,
    ExistingFrdSummary,
    NewBrdSummary,
    UserNotes,
    StylePattern,
    PreviousFrd,
    NewFrd,
}

impl StateField {
    pub fn name(self) -> &'static str {
        match self {
            StateField::ExistingBrdSummary => "existing BRD summary",
            StateField::ExistingFrdSummary => "existing FRD summary",
            StateField::NewBrdSummary => "new BRD summary",
            StateField::UserNotes => "user notes",
            StateField::StylePattern => "FRD style pattern",
            StateField::PreviousFrd => "previous FRD",
            StateField::NewFrd => "new FRD",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Values carried between steps. `None` means "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub existing_brd_summary: Option<String>,
    pub existing_frd_summary: Option<String>,
    pub new_brd_summary: Option<String>,
    pub user_notes: Option<String>,
    pub style_pattern: Option<String>,
    pub previous_frd: Option<String>,
    pub new_frd: Option<String>,
}

impl WorkflowState {
    /// State for a first run from three document summaries.
    pub fn from_summaries(
        existing_brd: impl Into<String>,
        existing_frd: impl Into<String>,
        new_brd: impl Into<String>,
    ) -> Self {
        Self {
            existing_brd_summary: Some(existing_brd.into()),
            existing_frd_summary: Some(existing_frd.into()),
            new_brd_summary: Some(new_brd.into()),
            ..Default::default()
        }
    }

    /// Set notes; blank notes are treated as absent.
    pub fn with_user_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.user_notes = (!notes.trim().is_empty()).then_some(notes);
        self
    }

    pub fn with_previous_frd(mut self, frd: impl Into<String>) -> Self {
        self.previous_frd = Some(frd.into());
        self
    }

    /// The value of `field`, if present and not blank.
    pub fn get(&self, field: StateField) -> Option<&str> {
        let value = match field {
            StateField::ExistingBrdSummary => &self.existing_brd_summary,
            StateField::ExistingFrdSummary => &self.existing_frd_summary,
            StateField::NewBrdSummary => &self.new_brd_summary,
            StateField::UserNotes => &self.user_notes,
            StateField::StylePattern => &self.style_pattern,
            StateField::PreviousFrd => &self.previous_frd,
            StateField::NewFrd => &self.new_frd,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Write or overwrite `field`.
    pub fn set(&mut self, field: StateField, value: String) {
        let slot = match field {
            StateField::ExistingBrdSummary => &mut self.existing_brd_summary,
            StateField::ExistingFrdSummary => &mut self.existing_frd_summary,
            StateField::NewBrdSummary => &mut self.new_brd_summary,
            StateField::UserNotes => &mut self.user_notes,
            StateField::StylePattern => &mut self.style_pattern,
            StateField::PreviousFrd => &mut self.previous_frd,
            StateField::NewFrd => &mut self.new_frd,
        };
        *slot = Some(value);
    }

    /// The subset of `fields` that currently hold a value, in order.
    pub fn present(&self, fields: &[StateField]) -> Vec<StateField> {
        fields
            .iter()
            .copied()
            .filter(|&f| self.get(f).is_some())
            .collect()
    }

    fn require(&self, field: StateField) -> &str {
        self.get(field).unwrap_or_default()
    }
}

/// One model call in a workflow.
pub trait WorkflowStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fields that must be present before the step runs.
    fn required_fields(&self) -> &'static [StateField];

    /// Fields the prompt includes when present.
    fn optional_fields(&self) -> &'static [StateField] {
        &[]
    }

    /// The single field this step writes.
    fn output_field(&self) -> StateField;

    /// Build the prompt. Only called after validation succeeded.
    fn build_prompt(&self, state: &WorkflowState) -> PromptPair;
}

/// Describe the existing FRD's structure for reuse as a template.
pub struct ExtractStylePattern;

impl WorkflowStep for ExtractStylePattern {
    fn name(&self) -> &'static str {
        "extract_style_pattern"
    }

    fn required_fields(&self) -> &'static [StateField] {
        &[StateField::ExistingFrdSummary]
    }

    fn output_field(&self) -> StateField {
        StateField::StylePattern
    }

    fn build_prompt(&self, state: &WorkflowState) -> PromptPair {
        PromptPair::new(
            STYLE_PATTERN_SYSTEM_PROMPT,
            style_pattern_user_prompt(state.require(StateField::ExistingFrdSummary)),
        )
    }
}

/// Write the new FRD from the three summaries.
pub struct GenerateFrd;

impl WorkflowStep for GenerateFrd {
    fn name(&self) -> &'static str {
        "generate_frd"
    }

    fn required_fields(&self) -> &'static [StateField] {
        &[
            StateField::ExistingBrdSummary,
            StateField::ExistingFrdSummary,
            StateField::NewBrdSummary,
        ]
    }

    fn optional_fields(&self) -> &'static [StateField] {
        &[
            StateField::UserNotes,
            StateField::StylePattern,
            StateField::PreviousFrd,
        ]
    }

    fn output_field(&self) -> StateField {
        StateField::NewFrd
    }

    fn build_prompt(&self, state: &WorkflowState) -> PromptPair {
        let inputs = GenerateFrdInputs {
            existing_brd_summary: state.require(StateField::ExistingBrdSummary),
            existing_frd_summary: state.require(StateField::ExistingFrdSummary),
            new_brd_summary: state.require(StateField::NewBrdSummary),
            user_notes: state.get(StateField::UserNotes),
            style_pattern: state.get(StateField::StylePattern),
            previous_frd: state.get(StateField::PreviousFrd),
        };
        PromptPair::new(GENERATE_FRD_SYSTEM_PROMPT, generate_frd_user_prompt(&inputs))
    }
}

/// Per-call settings for workflow steps.
#[derive(Debug, Clone, Copy)]
pub struct StepOptions {
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 3000,
            timeout: Duration::from_secs(120),
        }
    }
}

/// A fixed ordered list of steps.
pub struct Workflow {
    steps: Vec<Box<dyn WorkflowStep>>,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("steps", &self.step_names())
            .finish()
    }
}

impl Workflow {
    /// Build from explicit steps. At least one step is required.
    pub fn new(steps: Vec<Box<dyn WorkflowStep>>) -> Result<Self, FrdError> {
        if steps.is_empty() {
            return Err(FrdError::InvalidConfig(
                "A workflow needs at least one step".into(),
            ));
        }
        Ok(Self { steps })
    }

    /// `generate_frd` alone.
    pub fn single_step() -> Self {
        Self {
            steps: vec![Box::new(GenerateFrd)],
        }
    }

    /// `extract_style_pattern` then `generate_frd`.
    pub fn with_style_pattern() -> Self {
        Self {
            steps: vec![Box::new(ExtractStylePattern), Box::new(GenerateFrd)],
        }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Field written by the last step; this is the product.
    pub fn terminal_field(&self) -> StateField {
        // `new` and the named constructors never build an empty workflow.
        self.steps
            .last()
            .map(|s| s.output_field())
            .unwrap_or(StateField::NewFrd)
    }

    /// Check that every step's inputs will be available, without calling anything.
    pub fn validate(&self, state: &WorkflowState) -> Result<(), FrdError> {
        let mut written: Vec<StateField> = Vec::new();
        for step in &self.steps {
            for &field in step.required_fields() {
                if state.get(field).is_none() && !written.contains(&field) {
                    return Err(FrdError::missing(format!(
                        "{} (needed by step '{}')",
                        field,
                        step.name()
                    )));
                }
            }
            written.push(step.output_field());
        }
        Ok(())
    }

    /// Run every step once, in order, on a copy of `state`.
    pub async fn run(
        &self,
        backend: &dyn ChatBackend,
        state: &WorkflowState,
        options: &StepOptions,
        progress: Option<&ProgressCallback>,
    ) -> Result<WorkflowState, FrdError> {
        self.validate(state)?;

        let mut current = state.clone();
        let total = self.steps.len();
        for (i, step) in self.steps.iter().enumerate() {
            let name = step.name();
            if let Some(cb) = progress {
                cb.on_step_start(name, i + 1, total);
            }
            info!("Workflow step {}/{}: {}", i + 1, total, name);
            let optional = current.present(step.optional_fields());
            if !optional.is_empty() {
                debug!("Step {} also uses: {:?}", name, optional);
            }

            let request = CompletionRequest {
                prompt: step.build_prompt(&current),
                temperature: options.temperature,
                max_tokens: options.max_tokens,
            };
            let completion = complete_with_timeout(backend, &request, options.timeout)
                .await
                .map_err(|e| FrdError::StepFailed {
                    step: name.to_string(),
                    message: e.to_string(),
                })?;
            debug!(
                "Step {}: {} input tokens, {} output tokens",
                name, completion.prompt_tokens, completion.completion_tokens
            );

            let output_len = completion.content.len();
            current.set(step.output_field(), completion.content);
            if let Some(cb) = progress {
                cb.on_step_complete(name, output_len);
            }
        }
        Ok(current)
    }
}
