//! Prompt rendering.
//!
//! The generator receives plain text: the system instruction, the problem,
//! and the partial solution so far. A partial solution always ends with the
//! step delimiter, so the model continues with a fresh step.

use crate::config::SearchConfig;
use crate::steps::StepSegmenter;

/// Renders problems and partial solutions into generator prompts.
#[derive(Debug, Clone)]
pub struct PromptFormat {
    system_prompt: String,
    segmenter: StepSegmenter,
}

impl PromptFormat {
    /// Create a format with an explicit system prompt and step segmenter.
    pub fn new(system_prompt: impl Into<String>, segmenter: StepSegmenter) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            segmenter,
        }
    }

    /// Build the format described by a search configuration.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(
            config.system_prompt.clone(),
            StepSegmenter::new(config.step_delimiter.clone()),
        )
    }

    /// The segmenter used to join steps.
    pub fn segmenter(&self) -> &StepSegmenter {
        &self.segmenter
    }

    /// Render a prompt for `problem` continuing after `steps`.
    pub fn render<S: AsRef<str>>(&self, problem: &str, steps: &[S]) -> String {
        let mut prompt = String::with_capacity(self.system_prompt.len() + problem.len() + 32);

        if !self.system_prompt.is_empty() {
            prompt.push_str(&self.system_prompt);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Problem: ");
        prompt.push_str(problem);
        prompt.push_str("\n\nSolution:\n");

        if !steps.is_empty() {
            prompt.push_str(&self.segmenter.join(steps));
            prompt.push_str(self.segmenter.delimiter());
        }

        prompt
    }
}
