//! Generation service boundary.
//!
//! The search core never talks to a model runtime directly. It hands
//! rendered prompts and [`SamplingParams`] to a [`Generator`] and gets back
//! [`Sample`]s with a [`FinishReason`].
//!
//! Implementations should override [`Generator::generate`] to submit the
//! whole batch in one call; the default falls back to one
//! [`Generator::generate_one`] per request.

mod expand;

pub use expand::{expand_steps, ExpandJob, StepExpansion};

use crate::config::SearchConfig;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why a sample stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Hit one of the stop sequences.
    Stop,
    /// Hit the token cap.
    Length,
    /// Model emitted end-of-sequence.
    EndOfSequence,
}

/// One generated continuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Generated text (stop sequence included when one was hit).
    pub text: String,
    /// Tokens generated.
    pub num_tokens: usize,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
}

impl Sample {
    /// Create a sample; token count defaults to whitespace-separated words.
    pub fn new(text: impl Into<String>, finish_reason: FinishReason) -> Self {
        let text = text.into();
        let num_tokens = text.split_whitespace().count();
        Self {
            text,
            num_tokens,
            finish_reason,
        }
    }

    /// A sample that ended on a stop sequence.
    pub fn stop(text: impl Into<String>) -> Self {
        Self::new(text, FinishReason::Stop)
    }

    /// A sample that ended with end-of-sequence.
    pub fn eos(text: impl Into<String>) -> Self {
        Self::new(text, FinishReason::EndOfSequence)
    }

    /// A sample cut off by the token cap.
    pub fn length(text: impl Into<String>) -> Self {
        Self::new(text, FinishReason::Length)
    }
}

/// Sampling parameters for generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    /// Samples to draw for the prompt.
    pub n: usize,
    /// Temperature for sampling.
    pub temperature: f32,
    /// Top-p (nucleus) sampling.
    pub top_p: f32,
    /// Top-k sampling (0 disables).
    pub top_k: usize,
    /// Maximum new tokens.
    pub max_tokens: usize,
    /// Stop sequences.
    pub stop_sequences: Vec<String>,
    /// Seed for reproducible sampling.
    pub seed: Option<u64>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            n: 1,
            temperature: 1.0,
            top_p: 1.0,
            top_k: 0,
            max_tokens: 256,
            stop_sequences: Vec::new(),
            seed: None,
        }
    }
}

impl SamplingParams {
    /// Greedy sampling (temperature=0).
    pub fn greedy() -> Self {
        Self {
            temperature: 0.0,
            ..Default::default()
        }
    }

    /// Sampling with temperature.
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature,
            ..Default::default()
        }
    }

    /// Parameters for whole completions (best-of-N).
    pub fn full_completion(config: &SearchConfig) -> Self {
        Self {
            n: config.n,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            ..Default::default()
        }
    }

    /// Parameters for one reasoning step: stop at the step delimiter.
    pub fn single_step(config: &SearchConfig) -> Self {
        Self {
            n: 1,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_step_tokens,
            stop_sequences: vec![config.step_delimiter.clone()],
            ..Default::default()
        }
    }

    /// Set the number of samples.
    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    /// Set the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A prompt plus how to sample from it.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Rendered prompt text.
    pub prompt: String,
    /// Sampling parameters.
    pub params: SamplingParams,
}

impl GenerationRequest {
    /// Create a request.
    pub fn new(prompt: impl Into<String>, params: SamplingParams) -> Self {
        Self {
            prompt: prompt.into(),
            params,
        }
    }
}

/// Text generation service.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Draw `request.params.n` samples for one prompt.
    async fn generate_one(&self, request: &GenerationRequest) -> Result<Vec<Sample>>;

    /// Draw samples for a batch of prompts, one result per request.
    ///
    /// A failure for one request must not affect the others.
    async fn generate(&self, requests: &[GenerationRequest]) -> Vec<Result<Vec<Sample>>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.generate_one(request).await);
        }
        results
    }
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn generate_one(&self, request: &GenerationRequest) -> Result<Vec<Sample>> {
        (**self).generate_one(request).await
    }

    async fn generate(&self, requests: &[GenerationRequest]) -> Vec<Result<Vec<Sample>>> {
        (**self).generate(requests).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_params_default() {
        let params = SamplingParams::default();
        assert_eq!(params.n, 1);
        assert_eq!(params.temperature, 1.0);
        assert!(params.stop_sequences.is_empty());
        assert!(params.seed.is_none());
    }

    #[test]
    fn single_step_stops_at_delimiter() {
        let config = SearchConfig {
            temperature: 0.6,
            max_step_tokens: 128,
            ..Default::default()
        };
        let params = SamplingParams::single_step(&config).with_n(3).with_seed(9);

        assert_eq!(params.n, 3);
        assert_eq!(params.temperature, 0.6);
        assert_eq!(params.max_tokens, 128);
        assert_eq!(params.stop_sequences, vec!["\n\n".to_string()]);
        assert_eq!(params.seed, Some(9));
    }

    #[test]
    fn full_completion_has_no_stop() {
        let config = SearchConfig {
            n: 8,
            ..Default::default()
        };
        let params = SamplingParams::full_completion(&config);

        assert_eq!(params.n, 8);
        assert_eq!(params.max_tokens, 2048);
        assert!(params.stop_sequences.is_empty());
    }

    #[test]
    fn greedy_is_zero_temperature() {
        assert_eq!(SamplingParams::greedy().temperature, 0.0);
        assert_eq!(SamplingParams::with_temperature(0.3).temperature, 0.3);
    }

    #[test]
    fn sample_counts_tokens() {
        let sample = Sample::stop("two tokens\n\n");
        assert_eq!(sample.num_tokens, 2);
        assert_eq!(sample.finish_reason, FinishReason::Stop);
    }
}
