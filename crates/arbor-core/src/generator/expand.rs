//! One-step expansion with optional greedy lookahead.
//!
//! Every job asks for `n` sampled continuations of exactly one step. With
//! `lookahead > 0`, each open continuation is then rolled forward greedily
//! for up to `lookahead` more steps; those steps are only used to score the
//! candidate and never become part of its history.
//!
//! All jobs share one batched generator call per depth, so a round costs
//! `1 + lookahead` calls regardless of how many beams are expanded.

use super::{FinishReason, GenerationRequest, Generator, SamplingParams};
use crate::error::{ArborError, Result};
use crate::prompt::PromptFormat;

/// A beam to expand.
#[derive(Debug, Clone, Copy)]
pub struct ExpandJob<'a> {
    /// Problem text.
    pub problem: &'a str,
    /// Steps generated so far.
    pub steps: &'a [String],
    /// Continuations to sample.
    pub n: usize,
    /// Sampling seed for this job.
    pub seed: u64,
}

/// One sampled step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepExpansion {
    /// Step text without the trailing delimiter.
    pub step: String,
    /// Why the step's generation stopped.
    pub finish_reason: FinishReason,
    /// Tokens spent on the step.
    pub num_tokens: usize,
    /// Greedy continuation used for scoring only.
    pub lookahead: Vec<String>,
    /// Tokens spent on the lookahead.
    pub lookahead_tokens: usize,
    open: bool,
}

impl StepExpansion {
    /// Create an expansion with no lookahead.
    pub fn new(step: impl Into<String>, finish_reason: FinishReason, num_tokens: usize) -> Self {
        let mut expansion = Self {
            step: step.into(),
            finish_reason,
            num_tokens,
            lookahead: Vec::new(),
            lookahead_tokens: 0,
            open: false,
        };
        expansion.open = !expansion.is_terminal();
        expansion
    }

    /// Whether this step ends the solution.
    ///
    /// Only a step that stopped on the delimiter with some text can be
    /// continued.
    pub fn is_terminal(&self) -> bool {
        self.finish_reason != FinishReason::Stop || self.step.is_empty()
    }
}

/// Expand every job by one sampled step, then roll out the lookahead.
pub async fn expand_steps(
    generator: &dyn Generator,
    format: &PromptFormat,
    params: &SamplingParams,
    jobs: &[ExpandJob<'_>],
    lookahead: usize,
) -> Vec<Result<Vec<StepExpansion>>> {
    let segmenter = format.segmenter();

    let requests: Vec<GenerationRequest> = jobs
        .iter()
        .map(|job| {
            GenerationRequest::new(
                format.render(job.problem, job.steps),
                params.clone().with_n(job.n).with_seed(job.seed),
            )
        })
        .collect();

    let mut responses = generator.generate(&requests).await.into_iter();
    let mut results: Vec<Result<Vec<StepExpansion>>> = Vec::with_capacity(jobs.len());

    for job in jobs {
        let result = match responses.next() {
            Some(response) => response.map(|samples| {
                if samples.len() != job.n {
                    tracing::warn!(
                        requested = job.n,
                        received = samples.len(),
                        "generator returned an unexpected number of samples"
                    );
                }
                samples
                    .into_iter()
                    .map(|sample| {
                        StepExpansion::new(
                            segmenter.clean_step(&sample.text),
                            sample.finish_reason,
                            sample.num_tokens,
                        )
                    })
                    .collect()
            }),
            None => Err(ArborError::Generation(
                "generator returned fewer results than requests".into(),
            )),
        };
        results.push(result);
    }

    for depth in 0..lookahead {
        let mut open = Vec::new();
        let mut requests = Vec::new();

        for (j, (job, result)) in jobs.iter().zip(&results).enumerate() {
            let Ok(expansions) = result else { continue };
            for (e, expansion) in expansions.iter().enumerate().filter(|(_, x)| x.open) {
                let trace: Vec<&str> = job
                    .steps
                    .iter()
                    .chain(std::iter::once(&expansion.step))
                    .chain(&expansion.lookahead)
                    .map(String::as_str)
                    .collect();

                let greedy = SamplingParams {
                    n: 1,
                    temperature: 0.0,
                    seed: Some(job.seed),
                    ..params.clone()
                };
                requests.push(GenerationRequest::new(format.render(job.problem, &trace), greedy));
                open.push((j, e));
            }
        }

        if requests.is_empty() {
            break;
        }

        tracing::trace!(depth, rollouts = requests.len(), "lookahead rollout");
        let responses = generator.generate(&requests).await;

        for ((j, e), response) in open.into_iter().zip(responses) {
            let Ok(expansions) = results[j].as_mut() else { continue };
            let expansion = &mut expansions[e];

            match response.map(|samples| samples.into_iter().next()) {
                Ok(Some(sample)) => {
                    let step = segmenter.clean_step(&sample.text);
                    expansion.lookahead_tokens += sample.num_tokens;
                    expansion.open = sample.finish_reason == FinishReason::Stop && !step.is_empty();
                    if !step.is_empty() {
                        expansion.lookahead.push(step);
                    }
                }
                Ok(None) => expansion.open = false,
                Err(err) => {
                    // Lookahead only sharpens the score; keep the step.
                    tracing::debug!(error = %err, "lookahead rollout failed");
                    expansion.open = false;
                }
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Sample;
    use crate::mock::MockGenerator;
    use crate::steps::StepSegmenter;

    fn format() -> PromptFormat {
        PromptFormat::new("", StepSegmenter::default())
    }

    #[tokio::test]
    async fn expands_each_job_with_requested_samples() {
        let generator = MockGenerator::new(|request| {
            Ok((0..request.params.n)
                .map(|i| Sample::stop(format!("step {i}\n\n")))
                .collect())
        });
        let history = vec!["first".to_string()];
        let jobs = [
            ExpandJob { problem: "p", steps: &[], n: 2, seed: 1 },
            ExpandJob { problem: "q", steps: &history, n: 3, seed: 2 },
        ];

        let results = expand_steps(&generator, &format(), &SamplingParams::default(), &jobs, 0).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().len(), 2);
        assert_eq!(results[1].as_ref().unwrap()[2].step, "step 2");
        assert_eq!(generator.num_calls(), 1);
    }

    #[tokio::test]
    async fn one_failed_job_leaves_others_intact() {
        let generator = MockGenerator::new(|request| {
            if request.prompt.contains("bad") {
                Err(ArborError::Generation("boom".into()))
            } else {
                Ok(vec![Sample::eos("done")])
            }
        });
        let jobs = [
            ExpandJob { problem: "bad", steps: &[], n: 1, seed: 0 },
            ExpandJob { problem: "good", steps: &[], n: 1, seed: 0 },
        ];

        let results = expand_steps(&generator, &format(), &SamplingParams::default(), &jobs, 0).await;

        assert!(results[0].is_err());
        let ok = results[1].as_ref().unwrap();
        assert!(ok[0].is_terminal());
    }

    #[tokio::test]
    async fn lookahead_rolls_out_greedily_until_terminal() {
        let generator = MockGenerator::new(|request| {
            if request.params.temperature == 0.0 {
                // Greedy rollout: finish after the second lookahead step
                let depth = request.prompt.matches("look").count();
                if depth == 0 {
                    Ok(vec![Sample::stop("look a\n\n")])
                } else {
                    Ok(vec![Sample::eos("look b")])
                }
            } else {
                Ok(vec![Sample::stop("sampled\n\n"), Sample::eos("final")])
            }
        });
        let jobs = [ExpandJob { problem: "p", steps: &[], n: 2, seed: 5 }];

        let results = expand_steps(&generator, &format(), &SamplingParams::default(), &jobs, 3).await;
        let expansions = results[0].as_ref().unwrap();

        assert_eq!(expansions[0].step, "sampled");
        assert_eq!(expansions[0].lookahead, vec!["look a", "look b"]);
        // Terminal steps are never rolled out
        assert!(expansions[1].lookahead.is_empty());
        // One sampling call plus two lookahead depths
        assert_eq!(generator.num_calls(), 3);
    }

    #[test]
    fn terminal_steps() {
        let step = |text: &str, reason| StepExpansion::new(text, reason, 1);

        assert!(!step("x", FinishReason::Stop).is_terminal());
        assert!(step("", FinishReason::Stop).is_terminal());
        assert!(step("x", FinishReason::Length).is_terminal());
        assert!(step("x", FinishReason::EndOfSequence).is_terminal());
    }
}
