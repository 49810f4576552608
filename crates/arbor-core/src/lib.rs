//! # Arbor Core
//!
//! Test-time compute search over a text generator and a process reward model.
//!
//! This crate provides:
//! - **Best-of-N** sampling with reward-model reranking
//! - **Beam search** over reasoning steps with cross-beam pruning
//! - **DVTS** (diverse verifier tree search) with independent beam slots
//! - **Batch driver** that groups rounds of many problems into single service calls
//! - **Finalizer** for answer extraction, grading and voting metrics
//!
//! The generator and reward model are external services behind the async
//! [`Generator`](generator::Generator) and [`RewardModel`](reward::RewardModel)
//! traits; [`mock`] has deterministic in-process versions of both.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod aggregate;
pub mod completion;
pub mod config;
pub mod driver;
pub mod error;
pub mod finalize;
pub mod generator;
pub mod mock;
pub mod problem;
pub mod prompt;
pub mod reward;
pub mod search;
pub mod steps;

pub use error::{ArborError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::aggregate::Aggregation;
    pub use crate::completion::{Completion, FinishState};
    pub use crate::config::{Approach, SearchConfig};
    pub use crate::driver::{BatchDriver, ResultSink};
    pub use crate::error::{ArborError, Result};
    pub use crate::finalize::{AnswerComparator, BatchSummary, Finalizer, ProblemRecord};
    pub use crate::generator::{FinishReason, GenerationRequest, Generator, Sample, SamplingParams};
    pub use crate::problem::{Problem, ProblemId};
    pub use crate::reward::{RewardModel, ScoreRequest};
    pub use crate::search::{SearchOutcome, Strategy};
}
