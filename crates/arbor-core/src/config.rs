//! Search configuration.
//!
//! [`SearchConfig`] is immutable once validated. Every field has a default,
//! so a configuration file only needs to name what it overrides:
//!
//! ```
//! use arbor_core::config::{Approach, SearchConfig};
//!
//! let config = SearchConfig::from_toml_str(r#"
//!     approach = "beam_search"
//!     beam_width = 8
//!     aggregation = "min"
//! "#).unwrap();
//!
//! assert_eq!(config.approach, Approach::BeamSearch);
//! assert_eq!(config.branching_factor, 4);
//! ```

use crate::aggregate::Aggregation;
use crate::error::{ArborError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default system prompt: step-by-step solutions ending in a boxed answer.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Solve the following math problem efficiently and clearly:\n\n\
- For simple problems (2 steps or fewer):\nProvide a concise solution with minimal explanation.\n\n\
- For complex problems (3 steps or more):\nUse this step-by-step format:\n\n\
## Step 1: [Concise description]\n[Brief explanation and calculations]\n\n\
## Step 2: [Concise description]\n[Brief explanation and calculations]\n\n\
...\n\n\
Regardless of the approach, always conclude with:\n\n\
Therefore, the final answer is: $\\boxed{answer}$. I hope it is correct.\n\n\
Where [answer] is just the final number or expression that solves the problem.";

/// Search strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    /// Independent samples, ranked once.
    #[default]
    BestOfN,
    /// Step-wise beam search with cross-beam pruning.
    BeamSearch,
    /// Diverse verifier tree search: independent beam sub-searches.
    Dvts,
}

impl Approach {
    /// Name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BestOfN => "best_of_n",
            Self::BeamSearch => "beam_search",
            Self::Dvts => "dvts",
        }
    }
}

impl fmt::Display for Approach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Approach {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "best_of_n" => Ok(Self::BestOfN),
            "beam_search" => Ok(Self::BeamSearch),
            "dvts" => Ok(Self::Dvts),
            other => Err(ArborError::Config(format!("unknown approach: {other}"))),
        }
    }
}

/// Configuration for a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Strategy to run.
    pub approach: Approach,
    /// Samples per problem for best-of-N.
    pub n: usize,
    /// Surviving beams per problem (split across slots for DVTS).
    pub beam_width: usize,
    /// Children spawned by each active beam per round.
    pub branching_factor: usize,
    /// Independent sub-searches for DVTS.
    pub num_diversity_slots: usize,
    /// Maximum search rounds (and steps per beam).
    pub max_steps: usize,
    /// Token cap for a full completion (best-of-N).
    pub max_tokens: usize,
    /// Token cap for a single reasoning step.
    pub max_step_tokens: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
    /// Problems processed together per round.
    pub search_batch_size: usize,
    /// Step score aggregation policy.
    pub aggregation: Aggregation,
    /// Base seed for all sampling.
    pub seed: u64,
    /// Greedy steps rolled out past each candidate before scoring.
    pub lookahead: usize,
    /// Drop candidates whose text duplicates an earlier candidate.
    pub filter_duplicates: bool,
    /// Substring that marks a beam as complete.
    pub end_marker: Option<String>,
    /// Delimiter separating reasoning steps.
    pub step_delimiter: String,
    /// Instruction prepended to every prompt.
    pub system_prompt: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            approach: Approach::BestOfN,
            n: 4,
            beam_width: 4,
            branching_factor: 4,
            num_diversity_slots: 4,
            max_steps: 40,
            max_tokens: 2048,
            max_step_tokens: 512,
            temperature: 0.8,
            top_p: 1.0,
            search_batch_size: 25,
            aggregation: Aggregation::Last,
            seed: 42,
            lookahead: 0,
            filter_duplicates: false,
            end_marker: None,
            step_delimiter: "\n\n".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl SearchConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    /// Check numeric ranges and cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("n", self.n),
            ("beam_width", self.beam_width),
            ("branching_factor", self.branching_factor),
            ("num_diversity_slots", self.num_diversity_slots),
            ("max_steps", self.max_steps),
            ("max_tokens", self.max_tokens),
            ("max_step_tokens", self.max_step_tokens),
            ("search_batch_size", self.search_batch_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ArborError::Config(format!("{name} must be at least 1")));
            }
        }

        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ArborError::Config(format!(
                "temperature must be a non-negative number, got {}",
                self.temperature
            )));
        }

        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ArborError::Config(format!(
                "top_p must be in (0, 1], got {}",
                self.top_p
            )));
        }

        if self.step_delimiter.is_empty() {
            return Err(ArborError::Config("step_delimiter must not be empty".into()));
        }

        if self.approach == Approach::Dvts && self.beam_width % self.num_diversity_slots != 0 {
            return Err(ArborError::Config(format!(
                "beam_width ({}) must be divisible by num_diversity_slots ({})",
                self.beam_width, self.num_diversity_slots
            )));
        }

        Ok(())
    }

    /// Beam width inside one DVTS slot.
    pub fn slot_width(&self) -> usize {
        (self.beam_width / self.num_diversity_slots.max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SearchConfig::default();
        config.validate().unwrap();

        assert_eq!(config.approach, Approach::BestOfN);
        assert_eq!(config.n, 4);
        assert_eq!(config.step_delimiter, "\n\n");
        assert_eq!(config.aggregation, Aggregation::Last);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SearchConfig::from_toml_str(
            r#"
            approach = "dvts"
            beam_width = 8
            num_diversity_slots = 2
            aggregation = "prod"
        "#,
        )
        .unwrap();

        assert_eq!(config.approach, Approach::Dvts);
        assert_eq!(config.slot_width(), 4);
        assert_eq!(config.aggregation, Aggregation::Product);
        assert_eq!(config.max_steps, 40);
    }

    #[test]
    fn json_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.json");
        std::fs::write(&path, r#"{"approach": "beam_search", "beam_width": 2}"#).unwrap();

        let config = SearchConfig::from_file(&path).unwrap();
        assert_eq!(config.approach, Approach::BeamSearch);
        assert_eq!(config.beam_width, 2);
    }

    #[test]
    fn unknown_approach_is_rejected() {
        assert!(SearchConfig::from_toml_str("approach = \"mcts\"").is_err());
        assert!(matches!("mcts".parse::<Approach>(), Err(ArborError::Config(_))));
        assert_eq!("dvts".parse::<Approach>().unwrap(), Approach::Dvts);
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(SearchConfig::from_toml_str("beam_widht = 3").is_err());
    }

    #[test]
    fn dvts_requires_divisible_width() {
        let config = SearchConfig {
            approach: Approach::Dvts,
            beam_width: 6,
            num_diversity_slots: 4,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ArborError::Config(_))));

        // Same numbers are fine for plain beam search
        let config = SearchConfig {
            approach: Approach::BeamSearch,
            ..config
        };
        config.validate().unwrap();
    }

    #[test]
    fn zero_and_out_of_range_values_are_rejected() {
        let cases = [
            SearchConfig { beam_width: 0, ..Default::default() },
            SearchConfig { max_steps: 0, ..Default::default() },
            SearchConfig { search_batch_size: 0, ..Default::default() },
            SearchConfig { temperature: -0.1, ..Default::default() },
            SearchConfig { top_p: 0.0, ..Default::default() },
            SearchConfig { top_p: 1.5, ..Default::default() },
            SearchConfig { step_delimiter: String::new(), ..Default::default() },
        ];

        for config in cases {
            assert!(config.validate().is_err(), "{config:?} should be invalid");
        }
    }
}
