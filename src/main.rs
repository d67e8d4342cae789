//! housing-mlops CLI
//!
//! Each pipeline stage is a subcommand; `run` executes them all in order.
//!
//! # Usage
//!
//! ```bash
//! housing-mlops fetch               # raw dataset -> data.raw_data_path
//! housing-mlops split               # four split tables -> data.processed_data_path
//! housing-mlops train               # one tracked run per candidate model
//! housing-mlops predict             # best run by MAE prices the sample house
//! housing-mlops run                 # all of the above
//! housing-mlops --config other.yaml train
//! ```
//!
//! Logs go to stdout; set `RUST_LOG` (default `info`) to change verbosity.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use housing_mlops::config::{Config, DEFAULT_CONFIG_PATH};
use housing_mlops::pipeline::{self, PRICE_UNIT};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "housing-mlops", version, about = "Housing price regression pipeline")]
struct Cli {
    /// Configuration document
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download (or generate) the raw dataset
    Fetch,
    /// Split the raw dataset into train/test tables
    Split,
    /// Train every configured model and record the runs
    Train,
    /// Load the best model and price the sample house
    Predict,
    /// Run every stage in order
    Run,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Fetch => {
            let table = pipeline::fetch(&config).context("dataset stage")?;
            println!(
                "Dataset loaded: ({}, {})",
                table.num_rows(),
                table.num_columns()
            );
        }
        Command::Split => {
            let split = pipeline::split_dataset(&config).context("split stage")?;
            println!(
                "Train set: ({}, {})",
                split.train_features.num_rows(),
                split.train_features.num_columns()
            );
            println!(
                "Test set: ({}, {})",
                split.test_features.num_rows(),
                split.test_features.num_columns()
            );
        }
        Command::Train => {
            let report = pipeline::train(&config).context("training stage")?;
            for (candidate, outcome) in report.outcomes() {
                match outcome.metrics() {
                    Some(m) => println!(
                        "{candidate} - MAE: {:.2}, RMSE: {:.2}, R2: {:.3}",
                        m.mae, m.rmse, m.r2
                    ),
                    None => println!("{candidate} - failed"),
                }
            }
            if report.trained_count() == 0 {
                anyhow::bail!("no candidate trained successfully");
            }
        }
        Command::Predict => {
            let (loaded, price) = pipeline::predict_sample(&config).context("predict stage")?;
            println!("Loaded model from run: {}", loaded.run_id);
            println!("Model MAE: {:.2}", loaded.value);
            println!("Predicted price: ${:.2}", price * PRICE_UNIT);
        }
        Command::Run => {
            let price = pipeline::run_all(&config).context("pipeline")?;
            println!("Predicted price: ${:.2}", price * PRICE_UNIT);
        }
    }
    Ok(())
}
