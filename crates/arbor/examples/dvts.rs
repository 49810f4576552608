//! DVTS example.
//!
//! Runs diverse verifier tree search over a few problems with the seeded
//! in-process services and prints each slot winner.

use anyhow::Result;
use arbor::mock::{MockGenerator, MockReward};
use arbor::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = SearchConfig {
        approach: Approach::Dvts,
        beam_width: 8,
        num_diversity_slots: 4,
        branching_factor: 4,
        max_steps: 6,
        lookahead: 1,
        end_marker: Some("\\boxed{".into()),
        ..Default::default()
    };

    let engine = Engine::builder()
        .config(config)
        .generator(MockGenerator::seeded(5))
        .reward_model(MockReward::seeded())
        .build()?;

    let problems = [
        Problem::new("p0", "What is 6 * 7?").with_answer("2"),
        Problem::new("p1", "Simplify 12 / 4.").with_answer("3"),
        Problem::new("p2", "Find x if x + 5 = 9.").with_answer("4"),
    ];

    for record in engine.run(&problems).await {
        println!("== {} ({} rounds)", record.id, record.stats.rounds);
        if let Some(error) = &record.error {
            println!("   failed: {error}");
            continue;
        }
        for completion in &record.pool {
            println!(
                "   slot {} score {:.3} steps {} -> {:?}",
                completion.provenance.slot,
                completion.score(),
                completion.steps.len(),
                arbor::finalize::extract_answer(&completion.text),
            );
        }
        for vote in &record.votes {
            println!(
                "   @{}: naive {:?} maj {:?} weighted {:?}",
                vote.k, vote.naive, vote.majority, vote.weighted
            );
        }
    }

    Ok(())
}
