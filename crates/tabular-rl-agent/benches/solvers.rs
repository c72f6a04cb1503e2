//! Solver benchmarks on square grid worlds
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use tabular_rl_agent::{
    MonteCarloConfig, MonteCarloControl, PolicyIteration, PolicyIterationConfig, TdConfig,
    TdLambda, TdLambdaConfig, TdZero, ValueIteration, ValueIterationConfig,
};
use tabular_rl_env::{GridWorld, GridWorldConfig};

fn grid(size: usize) -> GridWorld {
    GridWorld::new(GridWorldConfig {
        width: size,
        height: size,
        seed: Some(0),
        ..GridWorldConfig::default()
    })
    .unwrap()
}

fn bench_dynamic_programming(c: &mut Criterion) {
    let mut group = c.benchmark_group("Dynamic Programming");

    for size in [4, 8, 16].iter() {
        let env = grid(*size);

        group.bench_with_input(BenchmarkId::new("value_iteration", size), &env, |b, env| {
            b.iter(|| {
                let mut solver = ValueIteration::new(env, ValueIterationConfig::default()).unwrap();
                black_box(solver.solve());
            });
        });

        group.bench_with_input(BenchmarkId::new("policy_iteration", size), &env, |b, env| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(1);
                let mut solver = PolicyIteration::with_random_policy(
                    env,
                    PolicyIterationConfig::default(),
                    &mut rng,
                )
                .unwrap();
                black_box(solver.solve());
            });
        });
    }
    group.finish();
}

fn bench_sample_based(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sample Based (100 episodes)");
    group.sample_size(20);

    group.bench_function("monte_carlo", |b| {
        b.iter_batched(
            || {
                let config = MonteCarloConfig {
                    seed: Some(2),
                    ..MonteCarloConfig::default()
                };
                MonteCarloControl::new(grid(6), config).unwrap()
            },
            |mut agent| black_box(agent.train(100, false).unwrap()),
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("td_zero", |b| {
        b.iter_batched(
            || {
                let config = TdConfig {
                    seed: Some(3),
                    ..TdConfig::default()
                };
                TdZero::new(grid(6), config).unwrap()
            },
            |mut agent| black_box(agent.train(100, false).unwrap()),
            criterion::BatchSize::SmallInput,
        );
    });

    for lambda in [0.0, 0.5, 0.9].iter() {
        group.bench_with_input(BenchmarkId::new("td_lambda", lambda), lambda, |b, &lambda| {
            b.iter_batched(
                || {
                    let config = TdLambdaConfig {
                        base: TdConfig {
                            seed: Some(4),
                            ..TdConfig::default()
                        },
                        lambda,
                    };
                    TdLambda::new(grid(6), config).unwrap()
                },
                |mut agent| black_box(agent.train(100, false).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dynamic_programming, bench_sample_based);
criterion_main!(benches);
