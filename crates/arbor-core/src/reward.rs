//! Process reward model boundary.
//!
//! A [`RewardModel`] scores a reasoning trace step by step. Scores must be
//! deterministic for identical input, so a retried or repeated request
//! returns the same values.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A trace to score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRequest {
    /// Problem text.
    pub problem: String,
    /// Reasoning steps, oldest first.
    pub steps: Vec<String>,
}

impl ScoreRequest {
    /// Create a request.
    pub fn new(problem: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            problem: problem.into(),
            steps,
        }
    }
}

/// Step-wise scoring service.
#[async_trait]
pub trait RewardModel: Send + Sync {
    /// Score each step of a trace; the result is aligned with `steps`.
    async fn score(&self, problem: &str, steps: &[String]) -> Result<Vec<f64>>;

    /// Score a batch of traces, one result per request.
    async fn score_batch(&self, requests: &[ScoreRequest]) -> Vec<Result<Vec<f64>>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.score(&request.problem, &request.steps).await);
        }
        results
    }
}

#[async_trait]
impl<R: RewardModel + ?Sized> RewardModel for Arc<R> {
    async fn score(&self, problem: &str, steps: &[String]) -> Result<Vec<f64>> {
        (**self).score(problem, steps).await
    }

    async fn score_batch(&self, requests: &[ScoreRequest]) -> Vec<Result<Vec<f64>>> {
        (**self).score_batch(requests).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArborError;
    use crate::mock::MockReward;

    #[tokio::test]
    async fn default_batch_scores_each_request() {
        let reward = MockReward::new(|_, steps| Ok(vec![0.5; steps.len()]));
        let requests = vec![
            ScoreRequest::new("p", vec!["a".into()]),
            ScoreRequest::new("p", vec!["a".into(), "b".into()]),
        ];

        let results = reward.score_batch(&requests).await;

        assert_eq!(results[0].as_ref().unwrap(), &vec![0.5]);
        assert_eq!(results[1].as_ref().unwrap(), &vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn failures_stay_per_request() {
        let reward = MockReward::new(|_, steps| {
            if steps.iter().any(|s| s == "poison") {
                Err(ArborError::Scoring("rejected".into()))
            } else {
                Ok(vec![1.0; steps.len()])
            }
        });
        let requests = vec![
            ScoreRequest::new("p", vec!["poison".into()]),
            ScoreRequest::new("p", vec!["fine".into()]),
        ];

        let results = Arc::new(reward).score_batch(&requests).await;

        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }
}
