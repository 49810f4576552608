//! Step segmentation.
//!
//! A completion is split into reasoning steps on a fixed delimiter
//! (`"\n\n"` by default). Empty segments are dropped and surrounding
//! whitespace is trimmed, so `"a\n\n\n\nb\n\n"` has two steps.

/// Splits completion text into reasoning steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSegmenter {
    delimiter: String,
}

impl StepSegmenter {
    /// Create a segmenter for `delimiter`.
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    /// The delimiter between steps.
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Split `text` into non-empty steps.
    pub fn split(&self, text: &str) -> Vec<String> {
        text.split(self.delimiter.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Normalize a single generated step: strip a trailing delimiter and
    /// surrounding whitespace.
    pub fn clean_step(&self, step: &str) -> String {
        step.strip_suffix(self.delimiter.as_str())
            .unwrap_or(step)
            .trim()
            .to_string()
    }

    /// Join steps back into completion text.
    pub fn join<S: AsRef<str>>(&self, steps: &[S]) -> String {
        let mut text = String::new();
        for (i, step) in steps.iter().enumerate() {
            if i > 0 {
                text.push_str(&self.delimiter);
            }
            text.push_str(step.as_ref());
        }
        text
    }
}

impl Default for StepSegmenter {
    fn default() -> Self {
        Self::new("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_lines() {
        let seg = StepSegmenter::default();
        let steps = seg.split("## Step 1: add\n2 + 2 = 4\n\n## Step 2: answer\n$\\boxed{4}$");

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0], "## Step 1: add\n2 + 2 = 4");
        assert_eq!(steps[1], "## Step 2: answer\n$\\boxed{4}$");
    }

    #[test]
    fn drops_empty_segments() {
        let seg = StepSegmenter::default();
        assert_eq!(seg.split("a\n\n\n\nb\n\n"), vec!["a", "b"]);
        assert!(seg.split("").is_empty());
        assert!(seg.split("\n\n").is_empty());
    }

    #[test]
    fn single_line_answer_is_one_step() {
        let seg = StepSegmenter::default();
        assert_eq!(seg.split("4"), vec!["4"]);
    }

    #[test]
    fn clean_step_strips_stop_sequence() {
        let seg = StepSegmenter::default();
        assert_eq!(seg.clean_step("Multiply both sides.\n\n"), "Multiply both sides.");
        assert_eq!(seg.clean_step("  done "), "done");
    }

    #[test]
    fn join_inverts_split_for_clean_steps() {
        let seg = StepSegmenter::new("\n---\n");
        let steps = vec!["first".to_string(), "second".to_string()];
        let text = seg.join(&steps);

        assert_eq!(text, "first\n---\nsecond");
        assert_eq!(seg.split(&text), steps);
    }
}
