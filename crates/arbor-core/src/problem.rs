//! Problems fed to the search strategies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a problem within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemId(pub String);

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProblemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProblemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A question to solve, with an optional reference answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// Unique identifier.
    pub id: ProblemId,
    /// Question text.
    #[serde(rename = "problem", alias = "prompt", alias = "question")]
    pub text: String,
    /// Reference answer, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl Problem {
    /// Create a problem without a reference answer.
    pub fn new(id: impl Into<ProblemId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            answer: None,
        }
    }

    /// Attach a reference answer.
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_dataset_rows() {
        let row = r#"{"id": "algebra/17", "problem": "Solve x + 1 = 3", "answer": "2"}"#;
        let problem: Problem = serde_json::from_str(row).unwrap();

        assert_eq!(problem.id, ProblemId::from("algebra/17"));
        assert_eq!(problem.text, "Solve x + 1 = 3");
        assert_eq!(problem.answer.as_deref(), Some("2"));
    }

    #[test]
    fn answer_is_optional() {
        let row = r#"{"id": "p0", "question": "2+2=?"}"#;
        let problem: Problem = serde_json::from_str(row).unwrap();
        assert!(problem.answer.is_none());

        let json = serde_json::to_string(&problem).unwrap();
        assert!(!json.contains("answer"));
    }
}
