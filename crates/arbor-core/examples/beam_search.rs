//! Beam search example.
//!
//! Drives a single [`BeamState`] by hand: every round each active beam is
//! extended with a few canned steps, scored by a toy reward, and pruned
//! back to the beam width.

use arbor_core::aggregate::Aggregation;
use arbor_core::completion::{Completion, FinishState, Provenance};
use arbor_core::search::{BeamConfig, BeamState};
use arbor_core::steps::StepSegmenter;

/// Candidate next steps, by depth.
const STEPS: &[&[&str]] = &[
    &["Let x be the number.", "Guess x = 5.", "Write 2x + 3 = 13."],
    &["Then 2x = 10.", "So x + 3 = 13.", "Check 2*5 + 3."],
    &["Hence x = 5.", "So x = 10.", "\\boxed{5}"],
];

/// Toy process reward: prefers steps that move toward `x = 5`.
fn reward(step: &str) -> f64 {
    match step {
        s if s.contains("\\boxed{5}") => 0.95,
        s if s.contains("x = 5") || s.contains("2x = 10") => 0.8,
        s if s.contains("2x + 3") => 0.7,
        s if s.contains("x = 10") || s.contains("x + 3") => 0.1,
        _ => 0.4,
    }
}

fn main() {
    println!("=== Beam Search Demo ===\n");

    let config = BeamConfig {
        beam_width: 2,
        branching_factor: 3,
        max_steps: STEPS.len(),
        filter_duplicates: true,
    };
    let segmenter = StepSegmenter::default();

    println!("Configuration:");
    println!("  Beam width: {}", config.beam_width);
    println!("  Branching factor: {}", config.branching_factor);
    println!("  Max steps: {}", config.max_steps);
    println!();

    let mut beam = BeamState::new(0, config, 42);
    let mut ordinal = 0;

    while !beam.is_done() {
        let round = beam.current_step() + 1;
        println!("Round {round}:");

        let parents: Vec<(usize, Completion)> = beam
            .active()
            .map(|(index, parent)| (index, parent.clone()))
            .collect();

        for (index, parent) in parents {
            let depth = parent.steps.len();
            for step in STEPS[depth.min(STEPS.len() - 1)] {
                ordinal += 1;
                let provenance = Provenance {
                    slot: 0,
                    beam: index,
                    round,
                    ordinal,
                };
                let mut child = parent.child(step.to_string(), &segmenter, provenance, 8);
                if step.contains("\\boxed") {
                    child.finish = FinishState::Complete;
                }

                let scores: Vec<f64> = child.steps.iter().map(|s| reward(s)).collect();
                let scored_len = scores.len();
                if let Err(err) = child.apply_scores(Ok(scores), scored_len, Aggregation::Min) {
                    println!("  scoring failed: {err}");
                }
                beam.push_child(child);
            }
        }

        beam.step();

        for survivor in beam.survivors() {
            println!(
                "  [{}] {:.2} {:?} {:?}",
                survivor.provenance.ordinal,
                survivor.score(),
                survivor.finish,
                survivor.steps.last().map(String::as_str).unwrap_or_default(),
            );
        }
        println!("  retired so far: {}", beam.retired().len());
        println!();
    }

    println!("=== Final Results ===\n");
    if let Some(best) = beam.best() {
        println!("Best trace (score {:.2}):", best.score());
        for (i, step) in best.steps.iter().enumerate() {
            println!("  {}. {step}", i + 1);
        }
    }
}
