//! Search strategies for test-time compute.
//!
//! This module spends extra inference per problem to find a better answer:
//! - **Best-of-N**: sample N whole solutions, score them, rank them
//! - **Beam search**: grow solutions one step per round, keeping the best beams
//! - **DVTS**: several independent beam searches whose winners form the pool
//!
//! # Architecture
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Strategy`] | Tagged dispatch chosen once from [`SearchConfig`] |
//! | [`BeamState`] | Survivors, pending children and pruning for one beam |
//! | [`SearchOutcome`] | Ranked pool and statistics for one problem |
//!
//! Every strategy processes a whole batch of problems at once: each round
//! issues a single batched generator call (plus one per lookahead depth)
//! and a single batched reward call for every problem still searching.
//!
//! # Example
//!
//! ```
//! use arbor_core::config::{Approach, SearchConfig};
//! use arbor_core::generator::Sample;
//! use arbor_core::mock::{MockGenerator, MockReward};
//! use arbor_core::problem::Problem;
//! use arbor_core::search::Strategy;
//!
//! # tokio_test_block(async {
//! let config = SearchConfig { approach: Approach::BestOfN, n: 2, ..Default::default() };
//! let strategy = Strategy::from_config(&config).unwrap();
//!
//! let generator = MockGenerator::new(|r| Ok(vec![Sample::eos("4"); r.params.n]));
//! let reward = MockReward::new(|_, steps| Ok(vec![0.9; steps.len()]));
//!
//! let outcome = strategy
//!     .run_one(&Problem::new("p0", "2+2=?"), &generator, &reward)
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.pool.len(), 2);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod beam;
mod best_of_n;
mod dvts;
mod round;

pub use beam::{BeamConfig, BeamSearch, BeamState};
pub use best_of_n::BestOfN;
pub use dvts::Dvts;

use crate::completion::Completion;
use crate::config::{Approach, SearchConfig};
use crate::error::{ArborError, Result};
use crate::generator::Generator;
use crate::problem::Problem;
use crate::reward::RewardModel;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Counters collected while searching one problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Rounds in which the problem issued generation requests.
    pub rounds: usize,
    /// Expansion requests sent to the generator, lookahead excluded.
    pub generation_requests: usize,
    /// Samples received from the generator.
    pub samples: usize,
    /// Tokens generated, lookahead included.
    pub generated_tokens: usize,
    /// Candidates whose scoring failed.
    pub scoring_failures: usize,
    /// Candidates pruned away.
    pub retired: usize,
    /// DVTS slots that contributed nothing: generation failed or no
    /// candidate was scored.
    pub failed_slots: usize,
}

/// Result of searching one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Candidates ranked best-first.
    pub pool: Vec<Completion>,
    /// Search counters.
    pub stats: SearchStats,
}

/// A search strategy selected from configuration.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Independent samples ranked once.
    BestOfN(BestOfN),
    /// Step-wise beam search.
    BeamSearch(BeamSearch),
    /// Diverse verifier tree search.
    Dvts(Dvts),
}

impl Strategy {
    /// Validate `config` and build the strategy it names.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        let config = config.clone();

        Ok(match config.approach {
            Approach::BestOfN => Self::BestOfN(BestOfN::new(config)),
            Approach::BeamSearch => Self::BeamSearch(BeamSearch::new(config)),
            Approach::Dvts => Self::Dvts(Dvts::new(config)),
        })
    }

    /// The approach this strategy implements.
    pub fn approach(&self) -> Approach {
        match self {
            Self::BestOfN(_) => Approach::BestOfN,
            Self::BeamSearch(_) => Approach::BeamSearch,
            Self::Dvts(_) => Approach::Dvts,
        }
    }

    /// Search a batch of problems; one outcome per problem, in order.
    ///
    /// `first_index` is the position of `problems[0]` in the whole run and
    /// feeds the per-problem seeds, so chunking does not change results.
    pub async fn run(
        &self,
        problems: &[Problem],
        first_index: usize,
        generator: &dyn Generator,
        reward: &dyn RewardModel,
    ) -> Vec<Result<SearchOutcome>> {
        match self {
            Self::BestOfN(s) => s.run(problems, first_index, generator, reward).await,
            Self::BeamSearch(s) => s.run(problems, first_index, generator, reward).await,
            Self::Dvts(s) => s.run(problems, first_index, generator, reward).await,
        }
    }

    /// Search a single problem.
    pub async fn run_one(
        &self,
        problem: &Problem,
        generator: &dyn Generator,
        reward: &dyn RewardModel,
    ) -> Result<SearchOutcome> {
        self.run(std::slice::from_ref(problem), 0, generator, reward)
            .await
            .pop()
            .unwrap_or_else(|| Err(ArborError::Generation("strategy returned no outcome".into())))
    }
}

/// Seed stream for the problem at `index` in a run.
pub(crate) fn problem_rng(seed: u64, index: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Sample;
    use crate::mock::{MockGenerator, MockReward};
    use rand::RngCore;

    #[test]
    fn strategy_matches_approach() {
        for approach in [Approach::BestOfN, Approach::BeamSearch, Approach::Dvts] {
            let config = SearchConfig {
                approach,
                ..Default::default()
            };
            assert_eq!(Strategy::from_config(&config).unwrap().approach(), approach);
        }
    }

    #[test]
    fn invalid_config_fails_before_any_work() {
        let config = SearchConfig {
            approach: Approach::Dvts,
            beam_width: 3,
            num_diversity_slots: 2,
            ..Default::default()
        };
        assert!(matches!(Strategy::from_config(&config), Err(ArborError::Config(_))));
    }

    #[test]
    fn problem_seeds_differ_by_index() {
        let a = problem_rng(42, 0).next_u64();
        let b = problem_rng(42, 1).next_u64();
        assert_ne!(a, b);
        assert_eq!(a, problem_rng(42, 0).next_u64());
    }

    #[tokio::test]
    async fn run_one_returns_single_outcome() {
        let config = SearchConfig {
            approach: Approach::BeamSearch,
            beam_width: 2,
            branching_factor: 2,
            ..Default::default()
        };
        let strategy = Strategy::from_config(&config).unwrap();
        let generator = MockGenerator::new(|r| Ok(vec![Sample::eos("done"); r.params.n]));
        let reward = MockReward::new(|_, steps| Ok(vec![0.5; steps.len()]));

        let outcome = strategy
            .run_one(&Problem::new("p", "q"), &generator, &reward)
            .await
            .unwrap();

        assert_eq!(outcome.pool.len(), 2);
        assert_eq!(outcome.stats.rounds, 1);
    }
}
