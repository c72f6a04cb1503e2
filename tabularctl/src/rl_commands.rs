// Command implementations for tabularctl

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::info;

use tabular_rl_agent::{
    MonteCarloConfig, MonteCarloControl, PolicyIteration, PolicyIterationConfig, SolveReport,
    TdConfig, TdLambda, TdLambdaConfig, TdZero, TrainingSummary, ValueIteration,
    ValueIterationConfig,
};
use tabular_rl_core::{config, validate_model, Mdp, TabularPolicy, TabularValueFunction};
use tabular_rl_env::{Cell, Direction, GridWorld, GridWorldConfig};

use crate::Algorithm;

/// Episodes averaged in reward reports
const REPORT_WINDOW: usize = 100;

pub struct TrainOptions {
    pub episodes: usize,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub lambda: Option<f64>,
    pub verbose: bool,
}

pub fn load_grid(path: Option<&Path>) -> Result<GridWorldConfig> {
    let grid = match path {
        Some(path) => config::from_json_file(path)
            .with_context(|| format!("Failed to load grid world from {}", path.display()))?,
        None => GridWorldConfig::default(),
    };
    grid.validate().context("Invalid grid world configuration")?;
    Ok(grid)
}

fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => config::from_json_file(path)
            .with_context(|| format!("Failed to load algorithm config from {}", path.display())),
        None => Ok(T::default()),
    }
}

/// Load a sample-based learner config whose `gamma` defaults to the grid's discount
fn load_learner_config<T: DeserializeOwned>(path: Option<&Path>, discount: f64) -> Result<T> {
    let raw = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read algorithm config {}", path.display()))?,
        ),
        None => None,
    };
    learner_config(raw.as_deref(), discount).context("Failed to parse algorithm config")
}

fn learner_config<T: DeserializeOwned>(raw: Option<&str>, discount: f64) -> Result<T> {
    let mut value = match raw {
        Some(raw) => serde_json::from_str(raw)?,
        None => Value::Object(Map::new()),
    };
    if let Value::Object(fields) = &mut value {
        fields.entry("gamma").or_insert_with(|| Value::from(discount));
    }
    Ok(serde_json::from_value(value)?)
}

/// Seed of the `run`-th sweep run; wraps instead of overflowing
fn run_seed(base: u64, run: u64) -> u64 {
    base.wrapping_add(run)
}

fn sweep_config(grid_config: &GridWorldConfig, lambda: f64, seed: u64) -> TdLambdaConfig {
    TdLambdaConfig {
        base: TdConfig {
            gamma: grid_config.discount,
            seed: Some(seed),
            ..TdConfig::default()
        },
        lambda,
    }
}

pub fn train(
    mut grid_config: GridWorldConfig,
    algorithm: Algorithm,
    options: &TrainOptions,
) -> Result<()> {
    if options.seed.is_some() {
        grid_config.seed = options.seed;
    }
    let discount = grid_config.discount;
    let mut grid = GridWorld::new(grid_config).context("Failed to build grid world")?;
    let config_path = options.config.as_deref();

    println!("🤖 Training {algorithm:?}");
    println!("   Grid: {}x{}", grid.config().width, grid.config().height);
    println!("   Budget: {}", options.episodes);

    match algorithm {
        Algorithm::PolicyIteration => {
            let config: PolicyIterationConfig = load_config(config_path)?;
            let mut rng = StdRng::seed_from_u64(options.seed.unwrap_or(0));
            let mut solver = PolicyIteration::with_random_policy(&grid, config, &mut rng)?;
            let (policy, report) = solver.train(options.episodes, options.verbose)?;
            print_report(&report);
            print_tables(&grid, solver.value_function(), &policy);
        }

        Algorithm::ValueIteration => {
            let config: ValueIterationConfig = load_config(config_path)?;
            let mut solver = ValueIteration::new(&grid, config)?;
            let (policy, report) = solver.train(options.episodes, options.verbose)?;
            print_report(&report);
            print_tables(&grid, solver.value_function(), &policy);
        }

        Algorithm::MonteCarlo => {
            let mut config: MonteCarloConfig = load_learner_config(config_path, discount)?;
            config.seed = options.seed.or(config.seed);
            let mut agent = MonteCarloControl::new(&mut grid, config)?;
            let summary = agent.train(options.episodes, options.verbose)?;
            print_summary(&summary);
            print_tables(agent.env(), &agent.value_function(), &summary.policy);
        }

        Algorithm::Td0 => {
            let mut config: TdConfig = load_learner_config(config_path, discount)?;
            config.seed = options.seed.or(config.seed);
            let mut agent = TdZero::new(&mut grid, config)?;
            let summary = agent.train(options.episodes, options.verbose)?;
            print_summary(&summary);
            print_tables(agent.env(), agent.value_function(), &summary.policy);
        }

        Algorithm::TdLambda => {
            let mut config: TdLambdaConfig = load_learner_config(config_path, discount)?;
            config.base.seed = options.seed.or(config.base.seed);
            if let Some(lambda) = options.lambda {
                config.lambda = lambda;
            }
            let mut agent = TdLambda::new(&mut grid, config)?;
            let summary = agent.train(options.episodes, options.verbose)?;
            print_summary(&summary);
            print_tables(agent.env(), agent.value_function(), &summary.policy);
        }
    }

    Ok(())
}

pub fn lambda_sweep(
    grid_config: &GridWorldConfig,
    lambdas: &[f64],
    episodes: usize,
    runs: u64,
    seed: u64,
) -> Result<()> {
    anyhow::ensure!(runs > 0, "runs must be at least 1");

    let reference_grid = GridWorld::new(grid_config.clone())?;
    let mut reference = ValueIteration::new(&reference_grid, ValueIterationConfig::default())?;
    reference.solve();
    let states: Vec<Cell> = reference_grid
        .states()
        .into_iter()
        .filter(|s| !reference_grid.is_goal(s))
        .collect();

    println!("📈 TD(λ) sweep: {episodes} episodes x {runs} runs");
    println!("{:>6} {:>12} {:>12} {:>12}", "lambda", "avg reward", "avg steps", "rms error");

    for &lambda in lambdas {
        let mut reward = 0.0;
        let mut steps = 0.0;
        let mut error = 0.0;

        for run in 0..runs {
            let seed = run_seed(seed, run);
            let grid = GridWorld::new(GridWorldConfig {
                seed: Some(seed),
                ..grid_config.clone()
            })?;

            let mut agent = TdLambda::new(grid, sweep_config(grid_config, lambda, seed))
                .with_context(|| format!("Invalid lambda {lambda}"))?;
            let summary = agent.train(episodes, false)?;

            reward += summary.recent_average(REPORT_WINDOW);
            steps += mean_recent_length(&summary);
            error += rms_error(&states, agent.value_function(), reference.value_function());
        }

        #[allow(clippy::cast_precision_loss)]
        let n = runs as f64;
        info!(lambda, runs, "sweep point finished");
        println!(
            "{lambda:>6.2} {:>12.3} {:>12.1} {:>12.4}",
            reward / n,
            steps / n,
            error / n
        );
    }

    Ok(())
}

pub fn validate(grid_config: &GridWorldConfig) -> Result<()> {
    let grid = GridWorld::new(grid_config.clone())?;
    validate_model(&grid).context("Grid world transition model is malformed")?;
    println!("✅ Transition model is valid");
    println!("   States: {}", grid.states().len());
    println!("   Discount: {}", grid.discount_factor());
    Ok(())
}

fn print_report(report: &SolveReport) {
    if report.converged {
        println!("\n✅ Converged after {} iterations", report.iterations);
    } else {
        println!(
            "\n⚠️  Stopped at the cap of {} iterations without converging",
            report.iterations
        );
    }
}

fn print_summary(summary: &TrainingSummary<Cell, Direction>) {
    println!("\n✅ Trained {} episodes", summary.episode_rewards.len());
    println!(
        "   Avg reward (last {REPORT_WINDOW}): {:.3}",
        summary.recent_average(REPORT_WINDOW)
    );
    println!("   Avg length (last {REPORT_WINDOW}): {:.1}", mean_recent_length(summary));
    if summary.truncated_episodes > 0 {
        println!("   Truncated episodes: {}", summary.truncated_episodes);
    }
}

fn print_tables(
    grid: &GridWorld,
    values: &TabularValueFunction<Cell>,
    policy: &TabularPolicy<Cell, Direction>,
) {
    println!("\n=== Value Function ===");
    print!("{}", grid.render_values(values));
    println!("\n=== Policy ===");
    print!("{}", grid.render_policy(policy));
}

#[allow(clippy::cast_precision_loss)]
fn mean_recent_length(summary: &TrainingSummary<Cell, Direction>) -> f64 {
    let lengths = &summary.episode_lengths;
    let n = REPORT_WINDOW.min(lengths.len());
    if n == 0 {
        return 0.0;
    }
    lengths[lengths.len() - n..].iter().sum::<usize>() as f64 / n as f64
}

#[allow(clippy::cast_precision_loss)]
fn rms_error(
    states: &[Cell],
    values: &TabularValueFunction<Cell>,
    reference: &TabularValueFunction<Cell>,
) -> f64 {
    if states.is_empty() {
        return 0.0;
    }
    let sum: f64 = states
        .iter()
        .map(|s| (values.value(s) - reference.value(s)).powi(2))
        .sum();
    (sum / states.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learner_gamma_follows_the_grid_discount() {
        let config: TdConfig = learner_config(None, 0.5).unwrap();
        assert_eq!(config.gamma, 0.5);
        assert_eq!(config.alpha, TdConfig::default().alpha);

        let config: MonteCarloConfig =
            learner_config(Some(r#"{ "max_steps": 50 }"#), 0.7).unwrap();
        assert_eq!(config.gamma, 0.7);
        assert_eq!(config.max_steps, 50);

        let config: TdLambdaConfig = learner_config(Some(r#"{ "lambda": 0.4 }"#), 0.6).unwrap();
        assert_eq!(config.base.gamma, 0.6);
        assert_eq!(config.lambda, 0.4);
    }

    #[test]
    fn explicit_gamma_wins() {
        let config: TdConfig = learner_config(Some(r#"{ "gamma": 0.99 }"#), 0.5).unwrap();
        assert_eq!(config.gamma, 0.99);
    }

    #[test]
    fn sweep_learners_share_the_reference_discount() {
        let grid = GridWorldConfig {
            discount: 0.5,
            ..GridWorldConfig::default()
        };
        let config = sweep_config(&grid, 0.3, u64::MAX);
        assert_eq!(config.base.gamma, 0.5);
        assert_eq!(config.lambda, 0.3);
        assert_eq!(config.base.seed, Some(u64::MAX));
    }

    #[test]
    fn run_seeds_wrap_at_the_top_of_the_range() {
        assert_eq!(run_seed(7, 2), 9);
        assert_eq!(run_seed(u64::MAX, 1), 0);
    }
}
