//! High-level search engine.

use crate::io::{JsonLinesSink, JsonLinesSource};
use anyhow::{Context, Result};
use arbor_core::{
    config::{Approach, SearchConfig},
    driver::BatchDriver,
    finalize::{AnswerComparator, BatchSummary, ProblemRecord},
    generator::Generator,
    problem::Problem,
    reward::RewardModel,
};
use std::path::Path;
use std::sync::Arc;

/// Builder for creating an Engine.
pub struct EngineBuilder {
    config: SearchConfig,
    generator: Option<Arc<dyn Generator>>,
    reward: Option<Arc<dyn RewardModel>>,
    comparator: Option<Arc<dyn AnswerComparator>>,
}

impl EngineBuilder {
    /// Create a new engine builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
            generator: None,
            reward: None,
            comparator: None,
        }
    }

    /// Replace the whole search configuration.
    pub fn config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the search configuration from a JSON or TOML file.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        self.config = SearchConfig::from_file(path)
            .with_context(|| format!("loading search config from {}", path.display()))?;
        Ok(self)
    }

    /// Set the search approach.
    pub fn approach(mut self, approach: Approach) -> Self {
        self.config.approach = approach;
        self
    }

    /// Set the generation service.
    pub fn generator(mut self, generator: impl Generator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Set the reward model.
    pub fn reward_model(mut self, reward: impl RewardModel + 'static) -> Self {
        self.reward = Some(Arc::new(reward));
        self
    }

    /// Set the answer comparator used for grading.
    pub fn comparator(mut self, comparator: impl AnswerComparator + 'static) -> Self {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    /// Build the engine, validating the configuration.
    pub fn build(self) -> Result<Engine> {
        let generator = self.generator.context("no generator configured")?;
        let reward = self.reward.context("no reward model configured")?;

        let mut driver = BatchDriver::new(&self.config).context("invalid search configuration")?;
        if let Some(comparator) = self.comparator {
            driver = driver.with_comparator(move |predicted: &str, reference: &str| {
                comparator.is_correct(predicted, reference)
            });
        }

        tracing::debug!(approach = %self.config.approach, "engine built");

        Ok(Engine {
            config: self.config,
            driver,
            generator,
            reward,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("has_generator", &self.generator.is_some())
            .field("has_reward", &self.reward.is_some())
            .finish_non_exhaustive()
    }
}

/// High-level search engine.
pub struct Engine {
    config: SearchConfig,
    driver: BatchDriver,
    generator: Arc<dyn Generator>,
    reward: Arc<dyn RewardModel>,
}

impl Engine {
    /// Create a new engine builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Get search configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Get the batch driver.
    pub fn driver(&self) -> &BatchDriver {
        &self.driver
    }

    /// Search one problem.
    pub async fn solve(&self, problem: &Problem) -> Result<ProblemRecord> {
        self.run(std::slice::from_ref(problem))
            .await
            .pop()
            .context("driver returned no record")
    }

    /// Search a batch of problems; one record per problem, in order.
    pub async fn run(&self, problems: &[Problem]) -> Vec<ProblemRecord> {
        self.driver
            .run(problems, self.generator.as_ref(), self.reward.as_ref())
            .await
    }

    /// Search every problem of a JSON-lines file, writing records to another.
    pub async fn run_file(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<BatchSummary> {
        let (input, output) = (input.as_ref(), output.as_ref());
        let source = JsonLinesSource::open(input)
            .with_context(|| format!("opening problems at {}", input.display()))?;
        let sink = JsonLinesSink::create(output)
            .with_context(|| format!("creating results at {}", output.display()))?;

        let summary = self
            .driver
            .run_source(source, self.generator.as_ref(), self.reward.as_ref(), sink)
            .await
            .with_context(|| format!("running problems from {}", input.display()))?;

        tracing::info!(output = %output.display(), %summary, "results written");
        Ok(summary)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::generator::Sample;
    use arbor_core::mock::{MockGenerator, MockReward};

    fn engine(approach: Approach) -> Engine {
        Engine::builder()
            .approach(approach)
            .generator(MockGenerator::seeded(4))
            .reward_model(MockReward::seeded())
            .build()
            .unwrap()
    }

    #[test]
    fn build_requires_services() {
        let err = Engine::builder().build().unwrap_err();
        assert!(err.to_string().contains("generator"));

        let err = Engine::builder()
            .generator(MockGenerator::seeded(2))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("reward"));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let result = Engine::builder()
            .config(SearchConfig {
                beam_width: 0,
                ..Default::default()
            })
            .generator(MockGenerator::seeded(2))
            .reward_model(MockReward::seeded())
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn solves_with_each_approach() {
        for approach in [Approach::BestOfN, Approach::BeamSearch, Approach::Dvts] {
            let record = engine(approach)
                .solve(&Problem::new("p", "Compute 6*7."))
                .await
                .unwrap();
            assert!(!record.is_error(), "{approach}");
            assert_eq!(record.approach, approach);
        }
    }

    #[tokio::test]
    async fn custom_comparator_grades() {
        let engine = Engine::builder()
            .generator(MockGenerator::new(|r| Ok(vec![Sample::eos("\\boxed{four}"); r.params.n])))
            .reward_model(MockReward::new(|_, steps| Ok(vec![1.0; steps.len()])))
            .comparator(|predicted: &str, reference: &str| predicted == "four" && reference == "4")
            .build()
            .unwrap();

        let record = engine
            .solve(&Problem::new("p", "2+2").with_answer("4"))
            .await
            .unwrap();
        assert_eq!(record.correct, Some(true));
    }

    #[test]
    fn config_file_errors_carry_path() {
        let err = EngineBuilder::new()
            .config_file("/nonexistent/search.toml")
            .unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/search.toml"));
    }

    #[test]
    fn builder_debug_shows_configured_services() {
        let builder = Engine::builder()
            .approach(Approach::Dvts)
            .generator(MockGenerator::seeded(2));

        let debug = format!("{builder:?}");
        assert!(debug.starts_with("EngineBuilder"));
        assert!(debug.contains("Dvts"));
        assert!(debug.contains("has_generator: true"));
        assert!(debug.contains("has_reward: false"));
    }
}
