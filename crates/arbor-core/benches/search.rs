//! Benchmarks for the search strategies over in-process services.
//!
//! The mock generator and reward model cost almost nothing, so these
//! numbers measure the search bookkeeping itself: prompt rendering,
//! pruning, ranking and finalization.

use arbor_core::config::{Approach, SearchConfig};
use arbor_core::driver::BatchDriver;
use arbor_core::mock::{MockGenerator, MockReward};
use arbor_core::problem::Problem;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

fn problems(count: usize) -> Vec<Problem> {
    (0..count)
        .map(|i| Problem::new(format!("p{i}"), format!("Compute {i} squared.")).with_answer("4"))
        .collect()
}

/// Benchmark: one chunk of problems per strategy.
fn bench_strategies(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let generator = MockGenerator::seeded(6);
    let reward = MockReward::seeded();
    let batch = problems(16);

    let mut group = c.benchmark_group("strategy");
    group.throughput(Throughput::Elements(batch.len() as u64));

    for approach in [Approach::BestOfN, Approach::BeamSearch, Approach::Dvts] {
        let config = SearchConfig {
            approach,
            n: 8,
            beam_width: 8,
            num_diversity_slots: 4,
            branching_factor: 4,
            max_steps: 8,
            ..Default::default()
        };
        let driver = BatchDriver::new(&config).unwrap();

        group.bench_with_input(BenchmarkId::new("approach", approach), &driver, |b, driver| {
            b.to_async(&runtime)
                .iter(|| async { black_box(driver.run(&batch, &generator, &reward).await) })
        });
    }

    group.finish();
}

/// Benchmark: beam search cost as the beam widens.
fn bench_beam_width(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let generator = MockGenerator::seeded(6);
    let reward = MockReward::seeded();
    let batch = problems(4);

    let mut group = c.benchmark_group("beam_width");

    for width in [2, 4, 8, 16] {
        let config = SearchConfig {
            approach: Approach::BeamSearch,
            beam_width: width,
            branching_factor: 4,
            max_steps: 8,
            ..Default::default()
        };
        let driver = BatchDriver::new(&config).unwrap();

        group.bench_with_input(BenchmarkId::new("width", width), &driver, |b, driver| {
            b.to_async(&runtime)
                .iter(|| async { black_box(driver.run(&batch, &generator, &reward).await) })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_strategies, bench_beam_width);
criterion_main!(benches);
