//! Step-wise beam search over reasoning traces.
//!
//! A [`BeamState`] keeps a fixed-size set of best candidates for one
//! problem (or one DVTS slot) and extends every active one by a single
//! step each round.
//!
//! # Algorithm
//!
//! 1. Start with `beam_width` empty root beams
//! 2. For each round:
//!    a. Expand every active survivor into `branching_factor` children
//!    b. Score all children with the reward model
//!    c. Pool frozen survivors with the children and keep the top
//!       `beam_width` by aggregate score
//! 3. Stop when every survivor is frozen or `max_steps` rounds have run
//!
//! # Example
//!
//! ```
//! use arbor_core::completion::{Completion, Provenance};
//! use arbor_core::search::{BeamConfig, BeamState};
//! use arbor_core::steps::StepSegmenter;
//!
//! let config = BeamConfig { beam_width: 1, ..Default::default() };
//! let mut beam = BeamState::new(0, config, 7);
//! let seg = StepSegmenter::default();
//!
//! while !beam.is_done() {
//!     let parents: Vec<Completion> = beam.active().map(|(_, c)| c.clone()).collect();
//!     for (i, parent) in parents.iter().enumerate() {
//!         let prov = Provenance { beam: i, ordinal: i as u64, ..Default::default() };
//!         let mut child = parent.child("step".into(), &seg, prov, 1);
//!         child.aggregate = Some(0.5);
//!         beam.push_child(child);
//!     }
//!     beam.step();
//! }
//!
//! assert_eq!(beam.survivors()[0].steps.len(), 4);
//! ```

use super::round::{run_rounds, ProblemSearch};
use super::{problem_rng, SearchOutcome};
use crate::completion::{rank, Completion, FinishState};
use crate::config::SearchConfig;
use crate::error::{ArborError, Result};
use crate::generator::Generator;
use crate::problem::Problem;
use crate::prompt::PromptFormat;
use crate::reward::RewardModel;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashSet;

/// Configuration for one beam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeamConfig {
    /// Number of candidates to keep after each round.
    pub beam_width: usize,
    /// Children sampled per active survivor.
    pub branching_factor: usize,
    /// Maximum rounds before remaining beams are truncated.
    pub max_steps: usize,
    /// Drop children whose text duplicates another pool member.
    pub filter_duplicates: bool,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            beam_width: 4,
            branching_factor: 4,
            max_steps: 4,
            filter_duplicates: false,
        }
    }
}

impl BeamConfig {
    /// Beam settings from a search config with the given width.
    pub fn from_search(config: &SearchConfig, beam_width: usize) -> Self {
        Self {
            beam_width,
            branching_factor: config.branching_factor,
            max_steps: config.max_steps,
            filter_duplicates: config.filter_duplicates,
        }
    }
}

/// Survivors, pending children and retired candidates of one beam.
#[derive(Debug)]
pub struct BeamState {
    /// Configuration.
    config: BeamConfig,
    /// DVTS slot index.
    slot: usize,
    /// Current survivors, at most `beam_width`.
    survivors: Vec<Completion>,
    /// Children produced in the current round.
    pending: Vec<Completion>,
    /// Candidates pruned away, kept for the record.
    retired: Vec<Completion>,
    /// Rounds completed.
    step: usize,
    /// Seed stream for expansion requests.
    rng: StdRng,
    /// Generation failure that ended this beam.
    failure: Option<ArborError>,
}

impl BeamState {
    /// Create a beam with `beam_width` empty roots.
    pub fn new(slot: usize, config: BeamConfig, seed: u64) -> Self {
        let survivors = (0..config.beam_width)
            .map(|beam| Completion::root(slot, beam))
            .collect();

        Self {
            config,
            slot,
            survivors,
            pending: Vec::new(),
            retired: Vec::new(),
            step: 0,
            rng: StdRng::seed_from_u64(seed),
            failure: None,
        }
    }

    /// Slot this beam belongs to.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Beam configuration.
    pub fn config(&self) -> &BeamConfig {
        &self.config
    }

    /// Current survivors.
    pub fn survivors(&self) -> &[Completion] {
        &self.survivors
    }

    /// Children awaiting the next [`step`](Self::step).
    pub fn pending(&self) -> &[Completion] {
        &self.pending
    }

    /// Candidates pruned so far.
    pub fn retired(&self) -> &[Completion] {
        &self.retired
    }

    /// Rounds completed.
    pub fn current_step(&self) -> usize {
        self.step
    }

    /// The failure that ended this beam, if any.
    pub fn failure(&self) -> Option<&ArborError> {
        self.failure.as_ref()
    }

    /// End this beam with a generation failure.
    ///
    /// Children already pending are discarded.
    pub fn fail(&mut self, error: ArborError) {
        self.pending.clear();
        if self.failure.is_none() {
            self.failure = Some(error);
        }
    }

    /// Check if search is done.
    pub fn is_done(&self) -> bool {
        self.failure.is_some()
            || self.survivors.is_empty()
            || self.step >= self.config.max_steps
            || self.survivors.iter().all(Completion::is_frozen)
    }

    /// Survivors that still need expanding, with their index.
    pub fn active(&self) -> impl Iterator<Item = (usize, &Completion)> + '_ {
        self.survivors
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_frozen())
    }

    /// Next seed for an expansion request.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Queue a scored child for the next prune.
    pub fn push_child(&mut self, child: Completion) {
        if self.failure.is_none() {
            self.pending.push(child);
        }
    }

    /// Complete the current round, keeping the best `beam_width` candidates.
    ///
    /// Frozen survivors compete with the new children; expanded parents are
    /// replaced by their children.
    pub fn step(&mut self) {
        let mut pool: Vec<Completion> = self
            .survivors
            .drain(..)
            .filter(Completion::is_frozen)
            .collect();
        pool.append(&mut self.pending);

        if self.config.filter_duplicates {
            let mut seen = HashSet::new();
            let (kept, dupes): (Vec<_>, Vec<_>) =
                pool.into_iter().partition(|c| seen.insert(c.text.clone()));
            self.retired.extend(dupes);
            pool = kept;
        }

        rank(&mut pool);
        if pool.len() > self.config.beam_width {
            self.retired.extend(pool.drain(self.config.beam_width..));
        }

        self.survivors = pool;
        self.step += 1;

        if self.step >= self.config.max_steps {
            for survivor in &mut self.survivors {
                if !survivor.is_frozen() {
                    survivor.finish = FinishState::Truncated;
                }
            }
        }
    }

    /// Get the best survivor found.
    pub fn best(&self) -> Option<&Completion> {
        // Survivors are kept ranked by `step`
        self.survivors.first()
    }

    /// Take the survivors ranked best-first, or the failure that ended the beam.
    pub fn into_result(self) -> Result<Vec<Completion>> {
        if let Some(err) = self.failure {
            return Err(err);
        }
        let mut survivors = self.survivors;
        rank(&mut survivors);
        Ok(survivors)
    }
}

/// Beam search strategy.
#[derive(Debug, Clone)]
pub struct BeamSearch {
    config: SearchConfig,
    format: PromptFormat,
}

impl BeamSearch {
    /// Create a beam search; `config` is assumed validated.
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
        let beam_config = BeamConfig::from_search(&self.config, self.config.beam_width);

        let mut searches: Vec<ProblemSearch<'_>> = problems
            .iter()
            .enumerate()
            .map(|(i, problem)| {
                let mut rng = problem_rng(self.config.seed, first_index + i);
                let beam = BeamState::new(0, beam_config.clone(), rng.next_u64());
                ProblemSearch::new(problem, vec![beam])
            })
            .collect();

        run_rounds(&mut searches, &self.config, &self.format, generator, reward).await;

        searches
            .into_iter()
            .map(|search| {
                let (mut beams, stats) = search.into_parts();
                let beam = beams
                    .pop()
                    .ok_or_else(|| ArborError::Generation("beam search has no beam".into()))?;
                Ok(SearchOutcome {
                    pool: beam.into_result()?,
                    stats,
                })
            })
            .collect()
    }
}
