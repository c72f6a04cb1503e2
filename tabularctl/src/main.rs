// tabularctl
// Train tabular RL solvers on grid worlds from the command line

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod rl_commands;

#[derive(Parser)]
#[command(name = "tabularctl")]
#[command(about = "Tabular reinforcement learning on grid worlds", version)]
struct Cli {
    /// Grid world configuration (JSON); the default 4x4 grid when omitted
    #[arg(short, long, global = true)]
    grid: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train one algorithm and print its values and policy
    Train {
        /// Algorithm to run
        #[arg(short, long, value_enum, default_value = "value-iteration")]
        algorithm: Algorithm,

        /// Episodes for sample-based methods, iteration cap for dynamic programming
        #[arg(short, long, default_value = "1000")]
        episodes: usize,

        /// Algorithm configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed overriding the configuration's
        #[arg(short, long)]
        seed: Option<u64>,

        /// Trace decay for td-lambda, overriding the configuration's
        #[arg(short, long)]
        lambda: Option<f64>,

        /// Log training progress
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compare TD(λ) over several trace decays
    LambdaSweep {
        /// Trace decays to compare
        #[arg(short, long, value_delimiter = ',', default_value = "0,0.3,0.6,0.9,1")]
        lambdas: Vec<f64>,

        /// Episodes per run
        #[arg(short, long, default_value = "500")]
        episodes: usize,

        /// Independent seeded runs per λ
        #[arg(short, long, default_value = "5")]
        runs: u64,

        /// Base seed; run `i` uses `seed + i`
        #[arg(short, long, default_value = "0")]
        seed: u64,
    },

    /// Check the grid world's transition model
    Validate,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Algorithm {
    PolicyIteration,
    ValueIteration,
    MonteCarlo,
    Td0,
    TdLambda,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let grid = rl_commands::load_grid(cli.grid.as_deref())?;

    match cli.command {
        Commands::Train {
            algorithm,
            episodes,
            config,
            seed,
            lambda,
            verbose,
        } => {
            let options = rl_commands::TrainOptions {
                episodes,
                config,
                seed,
                lambda,
                verbose,
            };
            rl_commands::train(grid, algorithm, &options)?;
        }

        Commands::LambdaSweep {
            lambdas,
            episodes,
            runs,
            seed,
        } => {
            rl_commands::lambda_sweep(&grid, &lambdas, episodes, runs, seed)?;
        }

        Commands::Validate => {
            rl_commands::validate(&grid)?;
        }
    }

    Ok(())
}
