//! JSON-lines batch example.
//!
//! Writes a small problem file, searches it with the configuration given
//! on the command line (JSON or TOML, optional) and prints the summary.
//!
//! ```text
//! cargo run --example jsonl_batch -- search.toml
//! ```

use anyhow::{Context, Result};
use arbor::mock::{MockGenerator, MockReward};
use arbor::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    arbor::init_logging();

    let mut builder = Engine::builder()
        .generator(MockGenerator::seeded(4))
        .reward_model(MockReward::seeded());
    if let Some(path) = std::env::args().nth(1) {
        builder = builder.config_file(path)?;
    }
    let engine = builder.build()?;

    let dir = std::env::temp_dir().join("arbor-jsonl-demo");
    std::fs::create_dir_all(&dir).context("creating demo directory")?;
    let input = dir.join("problems.jsonl");
    let output = dir.join("records.jsonl");

    let lines: Vec<String> = (0..10)
        .map(|i| {
            serde_json::json!({
                "id": format!("p{i}"),
                "problem": format!("Compute {i} + {i}."),
                "answer": ((2 * i) % 10).to_string(),
            })
            .to_string()
        })
        .collect();
    std::fs::write(&input, lines.join("\n")).context("writing demo problems")?;

    let summary = engine.run_file(&input, &output).await?;

    println!("approach: {}", engine.config().approach);
    println!("summary:  {summary}");
    for tally in &summary.votes {
        println!(
            "  @{:<3} naive {}/{}  maj {}/{}  weighted {}/{}",
            tally.k,
            tally.naive,
            tally.graded,
            tally.majority,
            tally.graded,
            tally.weighted,
            tally.graded
        );
    }
    println!("records:  {}", output.display());

    Ok(())
}
