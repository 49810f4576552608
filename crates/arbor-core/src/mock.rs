//! Deterministic in-process services.
//!
//! [`MockGenerator`] and [`MockReward`] wrap closures, which makes scripted
//! scenarios short to write. [`MockGenerator::seeded`] and
//! [`MockReward::seeded`] produce pseudo-random but reproducible step-wise
//! solutions for demos and benchmarks.
//!
//! ```
//! use arbor_core::generator::Sample;
//! use arbor_core::mock::{MockGenerator, MockReward};
//!
//! let generator = MockGenerator::new(|request| {
//!     Ok(vec![Sample::eos("4"); request.params.n])
//! });
//! let reward = MockReward::new(|_, steps| Ok(vec![0.9; steps.len()]));
//! ```

use crate::error::Result;
use crate::generator::{GenerationRequest, Generator, Sample};
use crate::reward::RewardModel;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

type RespondFn = dyn Fn(&GenerationRequest) -> Result<Vec<Sample>> + Send + Sync;
type ScoreFn = dyn Fn(&str, &[String]) -> Result<Vec<f64>> + Send + Sync;

/// Generator backed by a closure.
pub struct MockGenerator {
    respond: Box<RespondFn>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MockGenerator {
    /// Answer every request with `respond`.
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<Vec<Sample>> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Reproducible step-wise solutions, at most `max_depth` steps deep.
    ///
    /// Depth is the number of `## Step` headers after `Solution:`. Output
    /// depends only on the prompt and the request seed.
    pub fn seeded(max_depth: usize) -> Self {
        Self::new(move |request| {
            let seed = request.params.seed.unwrap_or(0);
            let mut rng = StdRng::seed_from_u64(seed ^ fnv1a(request.prompt.as_bytes()));
            let solution = request
                .prompt
                .rsplit_once("Solution:\n")
                .map_or(request.prompt.as_str(), |(_, after)| after);
            let depth = solution.matches("## Step").count();
            let whole = request.params.stop_sequences.is_empty();

            let samples = (0..request.params.n)
                .map(|_| {
                    if whole {
                        let steps = 1 + (rng.next_u64() as usize % max_depth.max(1));
                        let mut text = String::new();
                        for k in 0..steps {
                            text.push_str(&format!("## Step {}: value {}\n\n", k + 1, rng.next_u64() % 100));
                        }
                        text.push_str(&final_answer(rng.next_u64()));
                        Sample::eos(text)
                    } else {
                        let value = rng.next_u64();
                        if depth + 1 >= max_depth || value % 5 == 0 {
                            Sample::eos(final_answer(value))
                        } else {
                            Sample::stop(format!("## Step {}: value {}\n\n", depth + 1, value % 100))
                        }
                    }
                })
                .collect();
            Ok(samples)
        })
    }

    /// Number of generate calls made (batched or single).
    pub fn num_calls(&self) -> usize {
        self.batch_sizes.lock().len()
    }

    /// Size of each batch submitted, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }
}

impl std::fmt::Debug for MockGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGenerator")
            .field("calls", &self.num_calls())
            .finish()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate_one(&self, request: &GenerationRequest) -> Result<Vec<Sample>> {
        self.batch_sizes.lock().push(1);
        (self.respond)(request)
    }

    async fn generate(&self, requests: &[GenerationRequest]) -> Vec<Result<Vec<Sample>>> {
        self.batch_sizes.lock().push(requests.len());
        requests.iter().map(|request| (self.respond)(request)).collect()
    }
}

/// Reward model backed by a closure.
pub struct MockReward {
    score: Box<ScoreFn>,
    calls: Mutex<usize>,
}

impl MockReward {
    /// Score every trace with `score`.
    pub fn new<F>(score: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<Vec<f64>> + Send + Sync + 'static,
    {
        Self {
            score: Box::new(score),
            calls: Mutex::new(0),
        }
    }

    /// Reproducible scores in `[0, 1)` derived from each step's text.
    pub fn seeded() -> Self {
        Self::new(|problem, steps| {
            Ok(steps
                .iter()
                .map(|step| {
                    let h = fnv1a(problem.as_bytes()) ^ fnv1a(step.as_bytes());
                    (h % 1000) as f64 / 1000.0
                })
                .collect())
        })
    }

    /// Number of traces scored.
    pub fn num_scored(&self) -> usize {
        *self.calls.lock()
    }
}

impl std::fmt::Debug for MockReward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockReward")
            .field("scored", &self.num_scored())
            .finish()
    }
}

#[async_trait]
impl RewardModel for MockReward {
    async fn score(&self, problem: &str, steps: &[String]) -> Result<Vec<f64>> {
        *self.calls.lock() += 1;
        (self.score)(problem, steps)
    }
}

fn final_answer(value: u64) -> String {
    format!("Therefore, the final answer is: $\\boxed{{{}}}$.", value % 10)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}
