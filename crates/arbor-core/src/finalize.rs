//! Selection, answer extraction and scoring of search results.
//!
//! The [`Finalizer`] turns a strategy's ranked pool into a [`ProblemRecord`]:
//! it selects the best finitely-scored completion, extracts its final answer
//! and grades it with an [`AnswerComparator`]. It also computes voting
//! metrics over the pool for subsample sizes 1, 2, 4, ...:
//!
//! - `naive@k`: answer of the best-scored completion among the first `k` generated
//! - `maj@k`: most frequent answer among the first `k`
//! - `weighted@k`: answer with the highest summed aggregate score among the first `k`
//!
//! Records of a run fold into a [`BatchSummary`].

use crate::completion::{rank, rank_order, Completion};
use crate::config::Approach;
use crate::error::Result;
use crate::problem::{Problem, ProblemId};
use crate::search::{SearchOutcome, SearchStats};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const BOXED: &str = "\\boxed{";

/// Extract the final answer from a completion.
///
/// Returns the content of the last `\boxed{...}` (nested braces allowed),
/// falling back to the last non-empty line.
pub fn extract_answer(text: &str) -> Option<String> {
    if let Some(start) = text.rfind(BOXED) {
        let body = &text[start + BOXED.len()..];
        let mut depth = 1usize;
        for (i, ch) in body.char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let answer = body[..i].trim();
                        if !answer.is_empty() {
                            return Some(answer.to_string());
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}

/// Canonical form of an answer for comparison and voting.
pub fn normalize_answer(answer: &str) -> String {
    let mut normalized: String = answer
        .replace("\\left", "")
        .replace("\\right", "")
        .replace("\\!", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$')
        .collect();

    while normalized.ends_with('.') {
        normalized.pop();
    }
    normalized.to_lowercase()
}

/// Decides whether a predicted answer matches the reference.
pub trait AnswerComparator: Send + Sync {
    /// Whether `predicted` is a correct answer given `reference`.
    fn is_correct(&self, predicted: &str, reference: &str) -> bool;
}

impl<F> AnswerComparator for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn is_correct(&self, predicted: &str, reference: &str) -> bool {
        self(predicted, reference)
    }
}

/// Equality after [`normalize_answer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedMatch;

impl AnswerComparator for NormalizedMatch {
    fn is_correct(&self, predicted: &str, reference: &str) -> bool {
        normalize_answer(predicted) == normalize_answer(reference)
    }
}

/// Voting results for one subsample size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteMetrics {
    /// Number of earliest generated candidates considered.
    pub k: usize,
    /// Answer of the best-scored candidate.
    pub naive: Option<String>,
    /// Most frequent answer.
    pub majority: Option<String>,
    /// Answer with the highest summed score.
    pub weighted: Option<String>,
    /// Grades, present when the problem has a reference answer.
    pub naive_correct: Option<bool>,
    /// See [`naive_correct`](Self::naive_correct).
    pub majority_correct: Option<bool>,
    /// See [`naive_correct`](Self::naive_correct).
    pub weighted_correct: Option<bool>,
}

/// Final result for one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    /// Problem identifier.
    pub id: ProblemId,
    /// Problem text.
    pub problem: String,
    /// Reference answer, if any.
    pub reference: Option<String>,
    /// Strategy that produced the record.
    pub approach: Approach,
    /// Text of the selected completion.
    pub selected: Option<String>,
    /// Answer extracted from the selection.
    pub answer: Option<String>,
    /// Aggregate score of the selection.
    pub score: Option<f64>,
    /// Whether the answer matches the reference.
    pub correct: Option<bool>,
    /// Voting metrics by subsample size.
    #[serde(default)]
    pub votes: Vec<VoteMetrics>,
    /// Ranked candidate pool.
    #[serde(default)]
    pub pool: Vec<Completion>,
    /// Search counters.
    #[serde(default)]
    pub stats: SearchStats,
    /// Why no answer was produced.
    pub error: Option<String>,
}

impl ProblemRecord {
    fn empty(problem: &Problem, approach: Approach) -> Self {
        Self {
            id: problem.id.clone(),
            problem: problem.text.clone(),
            reference: problem.answer.clone(),
            approach,
            selected: None,
            answer: None,
            score: None,
            correct: None,
            votes: Vec::new(),
            pool: Vec::new(),
            stats: SearchStats::default(),
            error: None,
        }
    }

    /// Whether the problem failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Builds [`ProblemRecord`]s from search outcomes.
#[derive(Clone)]
pub struct Finalizer {
    approach: Approach,
    comparator: Arc<dyn AnswerComparator>,
}

impl fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizer")
            .field("approach", &self.approach)
            .finish_non_exhaustive()
    }
}

impl Finalizer {
    /// Create a finalizer grading with [`NormalizedMatch`].
    pub fn new(approach: Approach) -> Self {
        Self {
            approach,
            comparator: Arc::new(NormalizedMatch),
        }
    }

    /// Grade answers with `comparator` instead.
    pub fn with_comparator(mut self, comparator: impl AnswerComparator + 'static) -> Self {
        self.comparator = Arc::new(comparator);
        self
    }

    /// Build the record for one problem.
    pub fn finalize(&self, problem: &Problem, outcome: Result<SearchOutcome>) -> ProblemRecord {
        let mut record = ProblemRecord::empty(problem, self.approach);

        let SearchOutcome { mut pool, stats } = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                record.error = Some(err.to_string());
                return record;
            }
        };

        rank(&mut pool);
        record.stats = stats;

        match pool.iter().find(|c| c.is_scored()) {
            Some(best) => {
                record.selected = Some(best.text.clone());
                record.score = best.aggregate;
                record.answer = extract_answer(&best.text);
                record.correct = self.grade(record.answer.as_deref(), problem.answer.as_deref());
            }
            None => record.error = Some("no candidate received a finite score".into()),
        }

        record.votes = self.vote_metrics(&pool, problem.answer.as_deref());
        record.pool = pool;
        record
    }

    fn grade(&self, answer: Option<&str>, reference: Option<&str>) -> Option<bool> {
        let reference = reference?;
        Some(answer.is_some_and(|answer| self.comparator.is_correct(answer, reference)))
    }

    fn vote_metrics(&self, pool: &[Completion], reference: Option<&str>) -> Vec<VoteMetrics> {
        let mut candidates: Vec<(&Completion, String)> = pool
            .iter()
            .filter(|c| c.is_scored())
            .filter_map(|c| extract_answer(&c.text).map(|answer| (c, answer)))
            .collect();
        candidates.sort_by_key(|(c, _)| c.provenance.ordinal);

        let mut metrics = Vec::new();
        let mut k = 1;
        while k <= candidates.len() {
            let subset = &candidates[..k];

            let naive = subset
                .iter()
                .min_by(|a, b| rank_order(a.0, b.0))
                .map(|(_, answer)| answer.clone());
            let majority = vote(subset, |_| 1.0);
            let weighted = vote(subset, Completion::score);

            metrics.push(VoteMetrics {
                k,
                naive_correct: self.grade(naive.as_deref(), reference),
                majority_correct: self.grade(majority.as_deref(), reference),
                weighted_correct: self.grade(weighted.as_deref(), reference),
                naive,
                majority,
                weighted,
            });
            k *= 2;
        }
        metrics
    }
}

/// Answer with the highest total weight; the earliest answer wins ties.
fn vote(candidates: &[(&Completion, String)], weight: impl Fn(&Completion) -> f64) -> Option<String> {
    let mut order: Vec<(String, &str)> = Vec::new();
    let mut totals: HashMap<String, f64> = HashMap::new();

    for (completion, answer) in candidates {
        let key = normalize_answer(answer);
        if !totals.contains_key(&key) {
            order.push((key.clone(), answer.as_str()));
        }
        *totals.entry(key).or_insert(0.0) += weight(*completion);
    }

    let mut best: Option<(&str, f64)> = None;
    for (key, answer) in &order {
        let total = totals.get(key).copied().unwrap_or(0.0);
        if best.map_or(true, |(_, top)| total > top) {
            best = Some((*answer, total));
        }
    }
    best.map(|(answer, _)| answer.to_string())
}

/// Accuracy counters for one vote size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    /// Subsample size.
    pub k: usize,
    /// Graded problems that reached this size.
    pub graded: usize,
    /// Correct `naive@k` answers.
    pub naive: usize,
    /// Correct `maj@k` answers.
    pub majority: usize,
    /// Correct `weighted@k` answers.
    pub weighted: usize,
}

/// Aggregate results of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records seen.
    pub problems: usize,
    /// Records carrying an error.
    pub errored: usize,
    /// Records with a reference answer to grade against.
    pub graded: usize,
    /// Graded records whose selection is correct.
    pub correct: usize,
    /// Voting tallies by subsample size.
    pub votes: Vec<VoteTally>,
}

impl BatchSummary {
    /// Summarize a set of records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ProblemRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.add(record);
        }
        summary
    }

    /// Fold one record in.
    pub fn add(&mut self, record: &ProblemRecord) {
        self.problems += 1;
        if record.is_error() {
            self.errored += 1;
        }

        // Errored problems with a reference count as wrong
        if record.reference.is_some() {
            self.graded += 1;
            if record.correct == Some(true) {
                self.correct += 1;
            }
        }

        for vote in &record.votes {
            if vote.naive_correct.is_none() {
                continue;
            }
            let i = match self.votes.binary_search_by_key(&vote.k, |t| t.k) {
                Ok(i) => i,
                Err(i) => {
                    let tally = VoteTally {
                        k: vote.k,
                        ..Default::default()
                    };
                    self.votes.insert(i, tally);
                    i
                }
            };
            let tally = &mut self.votes[i];
            tally.graded += 1;
            tally.naive += usize::from(vote.naive_correct == Some(true));
            tally.majority += usize::from(vote.majority_correct == Some(true));
            tally.weighted += usize::from(vote.weighted_correct == Some(true));
        }
    }

    /// Fraction of graded problems answered correctly.
    pub fn accuracy(&self) -> Option<f64> {
        (self.graded > 0).then(|| self.correct as f64 / self.graded as f64)
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problems, {} errored", self.problems, self.errored)?;
        if let Some(accuracy) = self.accuracy() {
            write!(f, ", accuracy {:.3} ({}/{})", accuracy, self.correct, self.graded)?;
        }
        Ok(())
    }
}
