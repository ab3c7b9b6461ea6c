//! Prompts for chunk summarization and FRD generation.
//!
//! Every prompt lives here so the wording can change without touching retry,
//! fan-out or workflow code, and so unit tests can inspect prompts directly.
//!
//! Callers can override the summarization prompt via
//! [`crate::config::GenerationConfig::summary_prompt`].

/// Default system prompt for summarizing one chunk of a document.
pub const SUMMARY_SYSTEM_PROMPT: &str = "Summarize the following document chunk clearly, \
retaining important requirements, features, and key points.";

/// Placeholder stored in place of a chunk summary when every attempt failed.
pub const FAILED_CHUNK_SENTINEL: &str = "[Error: Failed to summarize this chunk.]";

/// System prompt for the style-pattern step.
pub const STYLE_PATTERN_SYSTEM_PROMPT: &str = "You are an expert business analyst. \
Describe the structure of the given Functional Requirements Document so it can be reused \
as a template: list its sections and headings in order, the numbering scheme, how \
requirements are phrased, and any tables or recurring fields. Do not restate its content.";

/// System prompt for the FRD generation step.
pub const GENERATE_FRD_SYSTEM_PROMPT: &str = "You are an expert business analyst. \
You are given summarized versions of an existing BRD, FRD, and a new BRD. \
Your task is to create a NEW FRD based on the new BRD, maintaining structure and clarity \
of the existing FRD.";

/// User prompt for the style-pattern step.
pub fn style_pattern_user_prompt(existing_frd_summary: &str) -> String {
    format!("EXISTING FRD SUMMARY:\n{existing_frd_summary}\n\nDescribe the FRD pattern.")
}

/// Inputs interpolated into the generation prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenerateFrdInputs<'a> {
    pub existing_brd_summary: &'a str,
    pub existing_frd_summary: &'a str,
    pub new_brd_summary: &'a str,
    pub user_notes: Option<&'a str>,
    pub style_pattern: Option<&'a str>,
    pub previous_frd: Option<&'a str>,
}

/// User prompt for the generation step.
///
/// Optional sections are only emitted when the field is present, so a plain
/// first run sends exactly the three summaries.
pub fn generate_frd_user_prompt(inputs: &GenerateFrdInputs<'_>) -> String {
    let mut prompt = format!(
        "EXISTING BRD SUMMARY:\n{}\n\nEXISTING FRD SUMMARY:\n{}\n\nNEW BRD SUMMARY:\n{}\n",
        inputs.existing_brd_summary, inputs.existing_frd_summary, inputs.new_brd_summary
    );

    if let Some(pattern) = inputs.style_pattern {
        prompt.push_str(&format!("\nFRD PATTERN TO FOLLOW:\n{pattern}\n"));
    }
    if let Some(previous) = inputs.previous_frd {
        prompt.push_str(&format!("\nCURRENT FRD VERSION:\n{previous}\n"));
    }
    if let Some(notes) = inputs.user_notes {
        prompt.push_str(&format!("\nUSER NOTES:\n{notes}\n"));
    }

    if inputs.previous_frd.is_some() {
        prompt.push_str("\nPlease return the complete revised FRD.");
    } else {
        prompt.push_str("\nPlease generate the NEW FRD.");
    }
    prompt
}

/// Wrap user-requested changes into revision instructions for an enhancement run.
pub fn enhancement_notes(user_changes: &str) -> String {
    format!(
        "Please revise the existing FRD by intelligently incorporating these user-requested changes:\n\n\
USER REQUESTED CHANGES:\n{}\n\n\
GUIDELINES:\n\
1. Merge changes contextually where they belong\n\
2. Maintain all existing valid content\n\
3. Keep the professional FRD format\n\
4. Add new sections only if needed\n\
5. Return the complete revised FRD",
        user_changes.trim()
    )
}
