//! Candidate completions and pool ranking.

use crate::aggregate::Aggregation;
use crate::error::{ArborError, Result};
use crate::steps::StepSegmenter;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Lifecycle state of a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishState {
    /// Still being extended.
    InProgress,
    /// Finished on its own (end of sequence or end marker).
    Complete,
    /// Cut off by a token cap or the round budget.
    Truncated,
}

/// Where a completion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provenance {
    /// DVTS slot (always 0 for other strategies).
    pub slot: usize,
    /// Index of the parent beam or sample within its round.
    pub beam: usize,
    /// Round that produced the latest step.
    pub round: usize,
    /// Generation order within the problem; lower was produced earlier.
    pub ordinal: u64,
}

/// A full or partial candidate answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Completion text (steps joined by the step delimiter).
    pub text: String,
    /// Reasoning steps, oldest first.
    pub steps: Vec<String>,
    /// One reward score per step, empty before scoring or after a scoring failure.
    pub step_scores: Vec<f64>,
    /// Aggregate score; `-inf` when scoring failed.
    ///
    /// JSON has no infinities, so a failed aggregate serializes as `null`;
    /// [`score_error`](Self::score_error) tells it apart from "never scored".
    pub aggregate: Option<f64>,
    /// Why scoring failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_error: Option<String>,
    /// Lifecycle state.
    pub finish: FinishState,
    /// Producer of this completion.
    pub provenance: Provenance,
    /// Tokens generated for this completion, lookahead included.
    pub completion_tokens: usize,
}

impl Completion {
    /// Create an empty root beam.
    pub fn root(slot: usize, beam: usize) -> Self {
        Self {
            text: String::new(),
            steps: Vec::new(),
            step_scores: Vec::new(),
            aggregate: None,
            score_error: None,
            finish: FinishState::InProgress,
            provenance: Provenance {
                slot,
                beam,
                round: 0,
                ordinal: 0,
            },
            completion_tokens: 0,
        }
    }

    /// Create a completion from whole generated text.
    pub fn from_text(
        text: &str,
        segmenter: &StepSegmenter,
        provenance: Provenance,
        completion_tokens: usize,
    ) -> Self {
        let steps = segmenter.split(text);
        Self {
            text: segmenter.join(&steps),
            steps,
            step_scores: Vec::new(),
            aggregate: None,
            score_error: None,
            finish: FinishState::InProgress,
            provenance,
            completion_tokens,
        }
    }

    /// Extend this completion by one step.
    pub fn child(
        &self,
        step: String,
        segmenter: &StepSegmenter,
        provenance: Provenance,
        tokens: usize,
    ) -> Self {
        let mut steps = self.steps.clone();
        if !step.is_empty() {
            steps.push(step);
        }

        Self {
            text: segmenter.join(&steps),
            steps,
            step_scores: Vec::new(),
            aggregate: None,
            score_error: None,
            finish: FinishState::InProgress,
            provenance,
            completion_tokens: self.completion_tokens + tokens,
        }
    }

    /// Whether this completion stopped expanding.
    pub fn is_frozen(&self) -> bool {
        self.finish != FinishState::InProgress
    }

    /// Aggregate score, `-inf` when undefined.
    pub fn score(&self) -> f64 {
        self.aggregate.unwrap_or(f64::NEG_INFINITY)
    }

    /// Whether the aggregate is a usable finite number.
    pub fn is_scored(&self) -> bool {
        self.score_error.is_none() && self.aggregate.is_some_and(f64::is_finite)
    }

    /// Whether scoring was attempted and failed.
    pub fn scoring_failed(&self) -> bool {
        self.score_error.is_some()
    }

    /// Record the reward for a scored trace of `scored_len` steps.
    ///
    /// The trace may extend past [`steps`](Self::steps) when lookahead steps
    /// were scored with it; the aggregate covers the whole trace while
    /// `step_scores` keeps only this completion's own steps. Any failure
    /// leaves the completion with a `-inf` aggregate and is returned to the
    /// caller for accounting.
    pub fn apply_scores(
        &mut self,
        scores: Result<Vec<f64>>,
        scored_len: usize,
        aggregation: Aggregation,
    ) -> Result<()> {
        let outcome = scores.and_then(|scores| {
            if scores.len() != scored_len {
                return Err(ArborError::Scoring(format!(
                    "expected {scored_len} step scores, got {}",
                    scores.len()
                )));
            }
            if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
                return Err(ArborError::Scoring(format!("non-finite step score {bad}")));
            }
            let aggregate = aggregation.aggregate(&scores)?;
            Ok((scores, aggregate))
        });

        match outcome {
            Ok((mut scores, aggregate)) => {
                scores.truncate(self.steps.len());
                self.step_scores = scores;
                self.aggregate = Some(aggregate);
                self.score_error = None;
                Ok(())
            }
            Err(e) => {
                self.step_scores.clear();
                self.aggregate = Some(f64::NEG_INFINITY);
                self.score_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Ranking order: higher aggregate first, earlier ordinal on ties.
pub fn rank_order(a: &Completion, b: &Completion) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| a.provenance.ordinal.cmp(&b.provenance.ordinal))
}

/// Sort a pool best-first.
pub fn rank(pool: &mut [Completion]) {
    pool.sort_by(rank_order);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(ordinal: u64, score: f64) -> Completion {
        let mut c = Completion::root(0, 0);
        c.provenance.ordinal = ordinal;
        c.steps = vec!["step".into()];
        c.aggregate = Some(score);
        c
    }

    #[test]
    fn rank_sorts_descending_with_ordinal_tie_break() {
        let mut pool = vec![scored(3, 0.5), scored(1, 0.9), scored(2, 0.5), scored(4, 0.7)];
        rank(&mut pool);

        let ordinals: Vec<u64> = pool.iter().map(|c| c.provenance.ordinal).collect();
        assert_eq!(ordinals, vec![1, 4, 2, 3]);
    }

    #[test]
    fn failed_scores_rank_last() {
        let mut pool = vec![scored(1, f64::NEG_INFINITY), scored(2, 0.01)];
        rank(&mut pool);
        assert_eq!(pool[0].provenance.ordinal, 2);
        assert!(!pool[1].is_scored());
    }

    #[test]
    fn child_extends_history() {
        let seg = StepSegmenter::default();
        let root = Completion::root(1, 0);
        let prov = Provenance { slot: 1, beam: 0, round: 1, ordinal: 7 };

        let child = root.child("first".into(), &seg, prov, 5);
        let grandchild = child.child("second".into(), &seg, prov, 3);

        assert_eq!(grandchild.steps, vec!["first", "second"]);
        assert_eq!(grandchild.text, "first\n\nsecond");
        assert_eq!(grandchild.completion_tokens, 8);
        assert!(grandchild.aggregate.is_none());
    }

    #[test]
    fn from_text_segments_steps() {
        let seg = StepSegmenter::default();
        let c = Completion::from_text("a\n\nb\n\n", &seg, Provenance::default(), 4);
        assert_eq!(c.steps, vec!["a", "b"]);
        assert_eq!(c.text, "a\n\nb");
    }

    #[test]
    fn apply_scores_keeps_own_steps_and_aggregates_trace() {
        let mut c = Completion::root(0, 0);
        c.steps = vec!["a".into()];

        // One own step plus one lookahead step
        c.apply_scores(Ok(vec![0.9, 0.3]), 2, Aggregation::Last).unwrap();

        assert_eq!(c.step_scores, vec![0.9]);
        assert_eq!(c.aggregate, Some(0.3));
    }

    #[test]
    fn apply_scores_failure_yields_neg_infinity() {
        let mut c = Completion::root(0, 0);
        c.steps = vec!["a".into(), "b".into()];

        let err = c.apply_scores(Ok(vec![0.5]), 2, Aggregation::Min).unwrap_err();
        assert!(matches!(err, ArborError::Scoring(_)));
        assert_eq!(c.aggregate, Some(f64::NEG_INFINITY));

        let err = c
            .apply_scores(Err(ArborError::Scoring("down".into())), 2, Aggregation::Min)
            .unwrap_err();
        assert!(err.is_isolated());
        assert!(c.step_scores.is_empty());

        assert!(c.apply_scores(Ok(vec![0.5, f64::NAN]), 2, Aggregation::Min).is_err());
        assert_eq!(c.score(), f64::NEG_INFINITY);
    }

    #[test]
    fn empty_trace_cannot_be_scored() {
        let mut c = Completion::root(0, 0);
        let err = c.apply_scores(Ok(vec![]), 0, Aggregation::Last).unwrap_err();
        assert!(matches!(err, ArborError::EmptyScores));
        assert_eq!(c.score(), f64::NEG_INFINITY);
    }

    #[test]
    fn failed_score_survives_json() {
        let mut failed = Completion::root(0, 0);
        failed.steps = vec!["a".into()];
        failed
            .apply_scores(Err(ArborError::Scoring("timeout".into())), 1, Aggregation::Last)
            .unwrap_err();
        let unscored = Completion::root(0, 1);

        let failed: Completion = serde_json::from_str(&serde_json::to_string(&failed).unwrap()).unwrap();
        let unscored: Completion =
            serde_json::from_str(&serde_json::to_string(&unscored).unwrap()).unwrap();

        assert_eq!(failed.aggregate, None);
        assert!(failed.scoring_failed());
        assert!(failed.score_error.as_deref().unwrap().contains("timeout"));
        assert!(!unscored.scoring_failed());
        assert!(!failed.is_scored() && !unscored.is_scored());
    }

    #[test]
    fn rescoring_clears_failure() {
        let mut c = Completion::root(0, 0);
        c.steps = vec!["a".into()];
        c.apply_scores(Ok(vec![]), 1, Aggregation::Last).unwrap_err();
        assert!(c.scoring_failed());

        c.apply_scores(Ok(vec![0.6]), 1, Aggregation::Last).unwrap();
        assert!(!c.scoring_failed());
        assert!(c.is_scored());
    }
}
