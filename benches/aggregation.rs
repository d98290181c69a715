//! Aggregation benchmarks
//!
//! Measures tag → place → collapse → select → grid over synthetic result
//! streams shaped like a real run: every problem × minimizer × Jacobian,
//! with a share of failures and bounds placeholders.
//!
//! Toyota Way: Genchi Genbutsu (measure, don't guess)
//!
//! Run with: cargo bench --bench aggregation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trueno_fit::aggregate::{collapse, place, ResultAggregator};
use trueno_fit::config::RuntimeMetric;
use trueno_fit::record::{ErrorCode, ResultRecord};

const MINIMIZERS: usize = 8;
const JACOBIANS: [&str; 3] = ["scipy 2-point", "scipy 3-point", "analytic"];

/// One record per (problem, minimizer, Jacobian), some sparse, some failed.
fn synthetic(problems: usize, seed: u64) -> Vec<ResultRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(problems * MINIMIZERS * JACOBIANS.len());
    for p in 0..problems {
        for m in 0..MINIMIZERS {
            let problem = format!("problem_{p:04}");
            let minimizer = format!("min_{m}");
            if rng.gen_bool(0.05) {
                records.push(
                    ResultRecord::builder(problem, "nlls", "bench", minimizer)
                        .runtimes(vec![f64::INFINITY], RuntimeMetric::Mean)
                        .error_code(ErrorCode::BoundsUnsupported)
                        .build(),
                );
                continue;
            }
            for jacobian in JACOBIANS {
                // odd minimizers only ever ran one Jacobian per problem
                if m % 2 == 1 && rng.gen_bool(0.6) {
                    continue;
                }
                let code = if rng.gen_bool(0.1) {
                    ErrorCode::SoftwareException
                } else {
                    ErrorCode::Converged
                };
                let samples: Vec<f64> = (0..5).map(|_| rng.gen_range(1e-4..1e-1)).collect();
                records.push(
                    ResultRecord::builder(problem.as_str(), "nlls", "bench", minimizer.as_str())
                        .jacobian(jacobian)
                        .accuracy(rng.gen_range(1e-8..10.0))
                        .runtimes(samples, RuntimeMetric::Mean)
                        .error_code(code)
                        .build(),
                );
            }
        }
    }
    records
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for problems in [10, 100, 500] {
        let records = synthetic(problems, 42);
        group.bench_with_input(BenchmarkId::new("full", problems), &records, |b, records| {
            b.iter(|| ResultAggregator::new().aggregate(black_box(records.clone())));
        });
    }

    group.finish();
}

fn bench_collapse(c: &mut Criterion) {
    let mut group = c.benchmark_group("collapse");

    for problems in [10, 100] {
        let records = synthetic(problems, 7);
        let placements = place(&records);
        group.bench_with_input(
            BenchmarkId::new("fixpoint", problems),
            &(records, placements),
            |b, (records, placements)| {
                b.iter(|| {
                    let mut placements = placements.clone();
                    collapse(black_box(&mut placements), records)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_collapse);
criterion_main!(benches);
