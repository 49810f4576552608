//! Engine runs over JSON-lines files.

use arbor::mock::{MockGenerator, MockReward};
use arbor::prelude::*;
use std::io::Write;

fn engine(config: SearchConfig) -> Engine {
    Engine::builder()
        .config(config)
        .generator(MockGenerator::new(|request| {
            if request.prompt.contains("unlucky") {
                Err(ArborError::Generation("backend unavailable".into()))
            } else {
                Ok(vec![Sample::eos("## Step 1: add\n\n\\boxed{4}"); request.params.n])
            }
        }))
        .reward_model(MockReward::new(|_, steps| Ok(vec![0.75; steps.len()])))
        .build()
        .unwrap()
}

#[tokio::test]
async fn writes_one_record_per_problem() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("problems.jsonl");
    let output = dir.path().join("records.jsonl");

    let mut file = std::fs::File::create(&input).unwrap();
    writeln!(file, r#"{{"id": "a", "problem": "2+2=?", "answer": "4"}}"#).unwrap();
    writeln!(file, r#"{{"id": "b", "problem": "unlucky", "answer": "4"}}"#).unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"id": "c", "problem": "1+3=?", "answer": "5"}}"#).unwrap();
    drop(file);

    let config = SearchConfig {
        n: 2,
        search_batch_size: 2,
        ..Default::default()
    };
    let summary = engine(config).run_file(&input, &output).await.unwrap();

    assert_eq!(summary.problems, 3);
    assert_eq!(summary.errored, 1);
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.graded, 3);

    let records: Vec<ProblemRecord> = std::fs::read_to_string(&output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let ids: Vec<&str> = records.iter().map(|r| r.id.0.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(records[1].error.as_deref().unwrap().contains("backend unavailable"));
    assert_eq!(records[0].answer.as_deref(), Some("4"));
}

#[tokio::test]
async fn config_file_drives_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("search.toml");
    std::fs::write(
        &config_path,
        "approach = \"beam_search\"\nbeam_width = 2\nbranching_factor = 2\nmax_steps = 3\n",
    )
    .unwrap();

    let engine = Engine::builder()
        .config_file(&config_path)
        .unwrap()
        .generator(MockGenerator::seeded(3))
        .reward_model(MockReward::seeded())
        .build()
        .unwrap();

    assert_eq!(engine.config().approach, Approach::BeamSearch);
    let record = engine.solve(&Problem::new("p", "q")).await.unwrap();
    assert!(record.pool.len() <= 2);
    assert!(!record.is_error());
}

#[tokio::test]
async fn missing_input_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.jsonl");

    let err = engine(SearchConfig::default())
        .run_file(&missing, dir.path().join("out.jsonl"))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("absent.jsonl"));
}
