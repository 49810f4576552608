//! The round loop shared by beam search and DVTS.
//!
//! Each round gathers every active beam of every unfinished problem into
//! one expansion batch, scores all resulting children in one reward batch,
//! then prunes each beam independently.

use super::{BeamState, SearchStats};
use crate::completion::{Completion, FinishState, Provenance};
use crate::config::SearchConfig;
use crate::error::{ArborError, Result};
use crate::generator::{expand_steps, ExpandJob, FinishReason, Generator, SamplingParams, StepExpansion};
use crate::problem::Problem;
use crate::prompt::PromptFormat;
use crate::reward::{RewardModel, ScoreRequest};

/// Search state of one problem: one beam per slot.
pub(crate) struct ProblemSearch<'a> {
    pub problem: &'a Problem,
    pub beams: Vec<BeamState>,
    pub stats: SearchStats,
    next_ordinal: u64,
}

impl<'a> ProblemSearch<'a> {
    pub fn new(problem: &'a Problem, beams: Vec<BeamState>) -> Self {
        Self {
            problem,
            beams,
            stats: SearchStats::default(),
            next_ordinal: 0,
        }
    }

    fn next_ordinal(&mut self) -> u64 {
        self.next_ordinal += 1;
        self.next_ordinal
    }

    /// Split into beams and final statistics.
    pub fn into_parts(self) -> (Vec<BeamState>, SearchStats) {
        let mut stats = self.stats;
        stats.retired = self.beams.iter().map(|b| b.retired().len()).sum();
        (self.beams, stats)
    }
}

/// Index of a beam within the batch.
#[derive(Debug, Clone, Copy)]
struct BeamRef {
    search: usize,
    beam: usize,
}

/// A child waiting for its score.
struct ScoredChild {
    at: BeamRef,
    child: Completion,
    lookahead: Vec<String>,
}

/// Run rounds until every beam of every problem is done.
pub(crate) async fn run_rounds(
    searches: &mut [ProblemSearch<'_>],
    config: &SearchConfig,
    format: &PromptFormat,
    generator: &dyn Generator,
    reward: &dyn RewardModel,
) {
    let params = SamplingParams::single_step(config);
    let segmenter = format.segmenter();
    let mut round = 0;

    loop {
        // Collect one job per active survivor
        let mut stepping: Vec<BeamRef> = Vec::new();
        let mut targets: Vec<(BeamRef, usize, u64)> = Vec::new();

        for (s, search) in searches.iter_mut().enumerate() {
            let mut participated = false;
            for (b, beam) in search.beams.iter_mut().enumerate() {
                if beam.is_done() {
                    continue;
                }
                let active: Vec<usize> = beam.active().map(|(i, _)| i).collect();
                search.stats.generation_requests += active.len();
                for parent in active {
                    let seed = beam.next_seed();
                    targets.push((BeamRef { search: s, beam: b }, parent, seed));
                }
                stepping.push(BeamRef { search: s, beam: b });
                participated = true;
            }
            if participated {
                search.stats.rounds += 1;
            }
        }

        if targets.is_empty() {
            break;
        }
        round += 1;

        let jobs: Vec<ExpandJob<'_>> = targets
            .iter()
            .map(|&(at, parent, seed)| {
                let search = &searches[at.search];
                ExpandJob {
                    problem: &search.problem.text,
                    steps: &search.beams[at.beam].survivors()[parent].steps,
                    n: config.branching_factor,
                    seed,
                }
            })
            .collect();

        let expansions = expand_steps(generator, format, &params, &jobs, config.lookahead).await;
        drop(jobs);

        // Turn expansions into children
        let mut children: Vec<ScoredChild> = Vec::new();
        for (&(at, parent, _), result) in targets.iter().zip(expansions) {
            let search = &mut searches[at.search];
            if search.beams[at.beam].failure().is_some() {
                continue;
            }

            match result {
                Err(err) => {
                    tracing::warn!(
                        problem = %search.problem.id,
                        slot = at.beam,
                        error = %err,
                        "generation failed"
                    );
                    search.beams[at.beam].fail(err);
                }
                Ok(samples) => {
                    search.stats.samples += samples.len();
                    for expansion in samples {
                        let provenance = Provenance {
                            slot: search.beams[at.beam].slot(),
                            beam: parent,
                            round,
                            ordinal: search.next_ordinal(),
                        };
                        let tokens = expansion.num_tokens + expansion.lookahead_tokens;
                        search.stats.generated_tokens += tokens;

                        let finish = finish_state(&expansion, config.end_marker.as_deref());
                        let mut child = search.beams[at.beam].survivors()[parent].child(
                            expansion.step,
                            segmenter,
                            provenance,
                            tokens,
                        );
                        child.finish = finish;
                        children.push(ScoredChild {
                            at,
                            child,
                            lookahead: expansion.lookahead,
                        });
                    }
                }
            }
        }

        // Children of beams that failed later in this round are dropped
        children.retain(|c| searches[c.at.search].beams[c.at.beam].failure().is_none());

        let scores = score_children(&children, searches, reward).await;

        for (pending, score) in children.into_iter().zip(scores) {
            let ScoredChild {
                at,
                mut child,
                lookahead,
            } = pending;
            let search = &mut searches[at.search];
            let scored_len = child.steps.len() + lookahead.len();

            if let Err(err) = child.apply_scores(score, scored_len, config.aggregation) {
                if err.is_isolated() {
                    search.stats.scoring_failures += 1;
                    tracing::warn!(
                        problem = %search.problem.id,
                        error = %err,
                        "scoring failed; candidate ranked last"
                    );
                }
            }
            search.beams[at.beam].push_child(child);
        }

        for at in &stepping {
            let beam = &mut searches[at.search].beams[at.beam];
            if beam.failure().is_none() {
                beam.step();
            }
        }

        tracing::debug!(round, expanded = targets.len(), "search round complete");
    }
}

/// Score every child in one batch; children with no steps get no request.
async fn score_children(
    children: &[ScoredChild],
    searches: &[ProblemSearch<'_>],
    reward: &dyn RewardModel,
) -> Vec<Result<Vec<f64>>> {
    let mut requests = Vec::new();
    let mut slots = Vec::with_capacity(children.len());

    for pending in children {
        if pending.child.steps.is_empty() && pending.lookahead.is_empty() {
            slots.push(None);
            continue;
        }
        let trace: Vec<String> = pending
            .child
            .steps
            .iter()
            .chain(&pending.lookahead)
            .cloned()
            .collect();
        slots.push(Some(requests.len()));
        requests.push(ScoreRequest::new(
            searches[pending.at.search].problem.text.clone(),
            trace,
        ));
    }

    let mut responses: Vec<Option<Result<Vec<f64>>>> = if requests.is_empty() {
        Vec::new()
    } else {
        reward.score_batch(&requests).await.into_iter().map(Some).collect()
    };

    slots
        .into_iter()
        .map(|slot| match slot {
            None => Err(ArborError::EmptyScores),
            Some(i) => responses
                .get_mut(i)
                .and_then(Option::take)
                .unwrap_or_else(|| {
                    Err(ArborError::Scoring(
                        "reward model returned fewer results than requests".into(),
                    ))
                }),
        })
        .collect()
}

/// Lifecycle state of a freshly expanded child.
pub(crate) fn finish_state(expansion: &StepExpansion, end_marker: Option<&str>) -> FinishState {
    match expansion.finish_reason {
        FinishReason::Length => FinishState::Truncated,
        FinishReason::EndOfSequence => FinishState::Complete,
        FinishReason::Stop if expansion.step.is_empty() => FinishState::Complete,
        FinishReason::Stop => match end_marker {
            Some(marker) if expansion.step.contains(marker) => FinishState::Complete,
            _ => FinishState::InProgress,
        },
    }
}
