//! Best-of-N: sample whole solutions, score, rank.

use super::{problem_rng, SearchOutcome, SearchStats};
use crate::completion::{rank, Completion, FinishState, Provenance};
use crate::config::SearchConfig;
use crate::error::{ArborError, Result};
use crate::generator::{FinishReason, GenerationRequest, Generator, SamplingParams};
use crate::problem::Problem;
use crate::prompt::PromptFormat;
use crate::reward::{RewardModel, ScoreRequest};
use rand::RngCore;

/// Best-of-N strategy.
#[derive(Debug, Clone)]
pub struct BestOfN {
    config: SearchConfig,
    format: PromptFormat,
}

impl BestOfN {
    /// Create the strategy; `config` is assumed validated.
    pub fn new(config: SearchConfig) -> Self {
        let format = PromptFormat::from_config(&config);
        Self { config, format }
    }

    /// Search a batch of problems with one generate call and one score call.
    pub async fn run(
        &self,
        problems: &[Problem],
        first_index: usize,
        generator: &dyn Generator,
        reward: &dyn RewardModel,
    ) -> Vec<Result<SearchOutcome>> {
        let params = SamplingParams::full_completion(&self.config);
        let segmenter = self.format.segmenter();

        let requests: Vec<GenerationRequest> = problems
            .iter()
            .enumerate()
            .map(|(i, problem)| {
                let seed = problem_rng(self.config.seed, first_index + i).next_u64();
                let prompt = self.format.render::<&str>(&problem.text, &[]);
                GenerationRequest::new(prompt, params.clone().with_seed(seed))
            })
            .collect();

        let mut responses = generator.generate(&requests).await.into_iter();

        let mut pools: Vec<Result<(Vec<Completion>, SearchStats)>> = Vec::with_capacity(problems.len());
        for problem in problems {
            let response = responses.next().unwrap_or_else(|| {
                Err(ArborError::Generation(
                    "generator returned fewer results than requests".into(),
                ))
            });

            let samples = match response {
                Ok(samples) => samples,
                Err(err) => {
                    tracing::warn!(problem = %problem.id, error = %err, "generation failed");
                    pools.push(Err(err));
                    continue;
                }
            };
            if samples.len() != self.config.n {
                tracing::warn!(
                    problem = %problem.id,
                    requested = self.config.n,
                    received = samples.len(),
                    "generator returned an unexpected number of samples"
                );
            }

            let mut stats = SearchStats {
                rounds: 1,
                generation_requests: 1,
                samples: samples.len(),
                ..Default::default()
            };
            let pool: Vec<Completion> = samples
                .into_iter()
                .enumerate()
                .map(|(i, sample)| {
                    stats.generated_tokens += sample.num_tokens;
                    let provenance = Provenance {
                        slot: 0,
                        beam: i,
                        round: 1,
                        ordinal: i as u64 + 1,
                    };
                    let mut completion =
                        Completion::from_text(&sample.text, segmenter, provenance, sample.num_tokens);
                    completion.finish = match sample.finish_reason {
                        FinishReason::Length => FinishState::Truncated,
                        FinishReason::Stop | FinishReason::EndOfSequence => FinishState::Complete,
                    };
                    completion
                })
                .collect();
            pools.push(Ok((pool, stats)));
        }

        // One reward batch for every non-empty completion
        let mut requests = Vec::new();
        for (problem, pool) in problems.iter().zip(&pools) {
            let Ok((pool, _)) = pool else { continue };
            for completion in pool.iter().filter(|c| !c.steps.is_empty()) {
                requests.push(ScoreRequest::new(problem.text.clone(), completion.steps.clone()));
            }
        }
        let mut scores = if requests.is_empty() {
            Vec::new().into_iter()
        } else {
            reward.score_batch(&requests).await.into_iter()
        };

        pools
            .into_iter()
            .zip(problems)
            .map(|(pool, problem)| {
                let (mut pool, mut stats) = pool?;
                for completion in &mut pool {
                    let scored_len = completion.steps.len();
                    let score = if scored_len == 0 {
                        Err(ArborError::EmptyScores)
                    } else {
                        scores.next().unwrap_or_else(|| {
                            Err(ArborError::Scoring(
                                "reward model returned fewer results than requests".into(),
                            ))
                        })
                    };

                    if let Err(err) = completion.apply_scores(score, scored_len, self.config.aggregation) {
                        if err.is_isolated() {
                            stats.scoring_failures += 1;
                            tracing::warn!(
                                problem = %problem.id,
                                error = %err,
                                "scoring failed; candidate ranked last"
                            );
                        }
                    }
                }
                rank(&mut pool);
                Ok(SearchOutcome { pool, stats })
            })
            .collect()
    }
}
