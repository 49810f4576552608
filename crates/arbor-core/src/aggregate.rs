//! Reduction of per-step reward scores to a single candidate score.
//!
//! | Policy | Formula | Interpretation |
//! |--------|---------|----------------|
//! | [`Aggregation::Last`] | `s[n-1]` | Final-step confidence |
//! | [`Aggregation::Min`] | `min(s)` | Weakest link: one bad step sinks the trace |
//! | [`Aggregation::Mean`] | `sum(s) / n` | Average step quality |
//! | [`Aggregation::Product`] | `prod(s)` | Steps as independent probabilities |

use crate::error::{ArborError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy for reducing step scores to one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Score of the most recent step.
    #[default]
    Last,
    /// Minimum over all steps.
    Min,
    /// Arithmetic mean.
    Mean,
    /// Product of all step scores.
    #[serde(alias = "prod")]
    Product,
}

impl Aggregation {
    /// Reduce `scores` to one scalar.
    ///
    /// Fails with [`ArborError::EmptyScores`] when no step has been scored.
    pub fn aggregate(&self, scores: &[f64]) -> Result<f64> {
        let last = *scores.last().ok_or(ArborError::EmptyScores)?;

        let value = match self {
            Self::Last => last,
            Self::Min => scores.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            Self::Product => scores.iter().product(),
        };

        Ok(value)
    }

    /// Name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::Min => "min",
            Self::Mean => "mean",
            Self::Product => "product",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
