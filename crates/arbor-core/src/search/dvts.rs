//! Diverse verifier tree search.
//!
//! The beam budget is split into `num_diversity_slots` independent beam
//! searches of width `beam_width / num_diversity_slots`. Slots share the
//! batched rounds of their problem but never prune against each other, and
//! each has its own seed stream. The final pool holds the best survivor of
//! every slot.

use super::round::{run_rounds, ProblemSearch};
use super::{problem_rng, BeamConfig, BeamState, SearchOutcome};
use crate::completion::rank;
use crate::config::SearchConfig;
use crate::error::{ArborError, Result};
use crate::generator::Generator;
use crate::problem::Problem;
use crate::prompt::PromptFormat;
use crate::reward::RewardModel;
use rand::RngCore;

/// DVTS strategy.
#[derive(Debug, Clone)]
pub struct Dvts {
    config: SearchConfig,
    format: PromptFormat,
}

impl Dvts {
    /// Create the strategy; `config` is assumed validated.
    pub fn new(config: SearchConfig) -> Self {
        let format = PromptFormat::from_config(&config);
        Self { config, format }
    }

    /// Search a batch of problems.
    pub async fn run(
        &self,
        problems: &[Problem],
        first_index: usize,
        generator: &dyn Generator,
        reward: &dyn RewardModel,
    ) -> Vec<Result<SearchOutcome>> {
        let slot_config = BeamConfig::from_search(&self.config, self.config.slot_width());

        let mut searches: Vec<ProblemSearch<'_>> = problems
            .iter()
            .enumerate()
            .map(|(i, problem)| {
                let mut rng = problem_rng(self.config.seed, first_index + i);
                let slots = (0..self.config.num_diversity_slots)
                    .map(|slot| BeamState::new(slot, slot_config.clone(), rng.next_u64()))
                    .collect();
                ProblemSearch::new(problem, slots)
            })
            .collect();

        run_rounds(&mut searches, &self.config, &self.format, generator, reward).await;

        searches
            .into_iter()
            .map(|search| {
                let problem = search.problem;
                let (slots, mut stats) = search.into_parts();

                let mut pool = Vec::with_capacity(slots.len());
                let mut first_failure = None;

                for slot in slots {
                    let index = slot.slot();
                    match slot.into_result() {
                        Ok(ranked) => match ranked.into_iter().next() {
                            Some(best) if best.is_scored() => pool.push(best),
                            _ => {
                                stats.failed_slots += 1;
                                tracing::debug!(
                                    problem = %problem.id,
                                    slot = index,
                                    "slot has no scored candidate"
                                );
                            }
                        },
                        Err(err) => {
                            stats.failed_slots += 1;
                            first_failure.get_or_insert(err);
                        }
                    }
                }

                if pool.is_empty() {
                    return Err(first_failure.unwrap_or_else(|| {
                        ArborError::Scoring("no diversity slot produced a scored candidate".into())
                    }));
                }

                rank(&mut pool);
                Ok(SearchOutcome { pool, stats })
            })
            .collect()
    }
}
