//! Batch driver.
//!
//! Splits a stream of problems into chunks of `search_batch_size`, runs the
//! configured [`Strategy`] over each chunk and finalizes one
//! [`ProblemRecord`] per problem. Service failures stay inside the record of
//! the problem they hit; only source and sink I/O errors stop a run.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::finalize::{AnswerComparator, BatchSummary, Finalizer, ProblemRecord};
use crate::generator::Generator;
use crate::problem::Problem;
use crate::reward::RewardModel;
use crate::search::Strategy;
use tracing::Instrument;

/// Receives finished records.
pub trait ResultSink {
    /// Accept one record.
    fn write(&mut self, record: &ProblemRecord) -> Result<()>;

    /// Flush buffered records.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl ResultSink for Vec<ProblemRecord> {
    fn write(&mut self, record: &ProblemRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn write(&mut self, record: &ProblemRecord) -> Result<()> {
        (**self).write(record)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Runs a strategy over batches of problems.
#[derive(Debug, Clone)]
pub struct BatchDriver {
    strategy: Strategy,
    finalizer: Finalizer,
    batch_size: usize,
}

impl BatchDriver {
    /// Validate `config` and build a driver for it.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let strategy = Strategy::from_config(config)?;
        Ok(Self {
            finalizer: Finalizer::new(strategy.approach()),
            strategy,
            batch_size: config.search_batch_size,
        })
    }

    /// Grade answers with `comparator`.
    pub fn with_comparator(mut self, comparator: impl AnswerComparator + 'static) -> Self {
        self.finalizer = self.finalizer.with_comparator(comparator);
        self
    }

    /// The strategy in use.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Problems searched together.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Search every problem; one record per problem, in input order.
    pub async fn run(
        &self,
        problems: &[Problem],
        generator: &dyn Generator,
        reward: &dyn RewardModel,
    ) -> Vec<ProblemRecord> {
        let mut records = Vec::with_capacity(problems.len());
        for (index, chunk) in problems.chunks(self.batch_size).enumerate() {
            let first = index * self.batch_size;
            records.extend(self.run_chunk(index, first, chunk, generator, reward).await);
        }
        records
    }

    /// Stream problems from `source` into `sink`, returning the run summary.
    ///
    /// Problems are read one chunk at a time, so the source may be larger
    /// than memory. A source error aborts the run once every problem read
    /// before it has been searched and written.
    pub async fn run_source<I, K>(
        &self,
        source: I,
        generator: &dyn Generator,
        reward: &dyn RewardModel,
        mut sink: K,
    ) -> Result<BatchSummary>
    where
        I: IntoIterator<Item = Result<Problem>>,
        K: ResultSink,
    {
        let mut source = source.into_iter();
        let mut summary = BatchSummary::default();
        let mut first = 0;

        for index in 0.. {
            let mut chunk = Vec::with_capacity(self.batch_size);
            let mut source_error = None;
            for problem in source.by_ref().take(self.batch_size) {
                match problem {
                    Ok(problem) => chunk.push(problem),
                    Err(err) => {
                        source_error = Some(err);
                        break;
                    }
                }
            }

            if !chunk.is_empty() {
                for record in self.run_chunk(index, first, &chunk, generator, reward).await {
                    summary.add(&record);
                    sink.write(&record)?;
                }
                sink.flush()?;
                first += chunk.len();
            }

            // Problems read before a source error still get their records
            if let Some(err) = source_error {
                tracing::warn!(%summary, error = %err, "problem source failed");
                return Err(err);
            }
            if chunk.is_empty() {
                break;
            }
        }

        tracing::info!(%summary, "run complete");
        Ok(summary)
    }

    async fn run_chunk(
        &self,
        index: usize,
        first: usize,
        chunk: &[Problem],
        generator: &dyn Generator,
        reward: &dyn RewardModel,
    ) -> Vec<ProblemRecord> {
        let span = tracing::info_span!(
            "chunk",
            index,
            problems = chunk.len(),
            approach = %self.strategy.approach()
        );

        async {
            let outcomes = self.strategy.run(chunk, first, generator, reward).await;

            let records: Vec<ProblemRecord> = chunk
                .iter()
                .zip(outcomes)
                .map(|(problem, outcome)| self.finalizer.finalize(problem, outcome))
                .collect();

            let errored = records.iter().filter(|r| r.is_error()).count();
            tracing::info!(errored, "chunk finished");
            records
        }
        .instrument(span)
        .await
    }
}
