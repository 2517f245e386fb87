//! Command-line entry point for running a stochastic valuation job
//!
//! Loads a policy inforce file and a directory of assumption tables, runs
//! `run_valuation` across the requested number of scenarios, and prints
//! (or writes as JSON) the resulting aggregate statistics.

use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use stochastic_valuation::driver::{run_valuation, DriverOptions};
use stochastic_valuation::{Assumptions, Multipliers, ScenarioParams};

#[derive(Parser, Debug)]
#[command(name = "valuation-driver", about = "Run a scenario-parallel stochastic valuation job")]
struct Args {
    /// Path to the policy inforce file (.csv or packed binary)
    #[arg(long)]
    policies: PathBuf,

    /// Directory holding mortality/lapse/expense assumption files
    #[arg(long)]
    assumptions_dir: PathBuf,

    /// Load assumptions as CSV instead of binary
    #[arg(long)]
    csv: bool,

    /// Number of stochastic scenarios to run
    #[arg(long, default_value_t = 1000)]
    scenarios: u32,

    /// Master seed for the scenario generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Initial short rate
    #[arg(long, default_value_t = 0.04)]
    initial_rate: f64,

    /// Annual rate drift
    #[arg(long, default_value_t = 0.0)]
    drift: f64,

    /// Annual rate volatility
    #[arg(long, default_value_t = 0.01)]
    volatility: f64,

    /// Lower bound on the short rate
    #[arg(long, default_value_t = 0.0)]
    min_rate: f64,

    /// Upper bound on the short rate
    #[arg(long, default_value_t = 1.0)]
    max_rate: f64,

    /// Number of worker threads (default: hardware concurrency)
    #[arg(long)]
    workers: Option<usize>,

    /// Scenarios per scheduler task
    #[arg(long, default_value_t = 32)]
    chunk_size: u32,

    /// Retain the full per-scenario NPV distribution in the output
    #[arg(long)]
    retain_distribution: bool,

    /// Disable reproducible (scenario-ordered) aggregation
    #[arg(long)]
    no_reproducible: bool,

    /// Emit the result as JSON instead of a human-readable summary
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    info!("loading policies from {}", args.policies.display());
    let portfolio = match stochastic_valuation::policy::load_policies(&args.policies) {
        Ok(p) => p,
        Err(err) => {
            eprintln!("failed to load policies: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!("loaded {} policies", portfolio.len());

    let assumptions = if args.csv {
        Assumptions::from_csv_dir(&args.assumptions_dir)
    } else {
        Assumptions::from_binary_dir(&args.assumptions_dir)
    };
    let assumptions = match assumptions {
        Ok(a) => a,
        Err(err) => {
            eprintln!("failed to load assumptions: {err}");
            return ExitCode::FAILURE;
        }
    };

    let scenario_params = ScenarioParams {
        initial_rate: args.initial_rate,
        drift: args.drift,
        volatility: args.volatility,
        min_rate: args.min_rate,
        max_rate: args.max_rate,
    };
    let multipliers = Multipliers::default();

    let mut options = DriverOptions {
        chunk_size: args.chunk_size,
        retain_distribution: args.retain_distribution,
        reproducible_mode: !args.no_reproducible,
        ..Default::default()
    };
    if let Some(workers) = args.workers {
        options.worker_count = workers;
    }

    info!(
        "running {} scenarios across {} workers",
        args.scenarios, options.worker_count
    );
    let result = run_valuation(
        &portfolio,
        &assumptions,
        &scenario_params,
        &multipliers,
        args.seed,
        args.scenarios,
        options,
    );

    match result {
        Ok(detail) => {
            if args.json {
                match serde_json::to_string_pretty(&detail.statistics) {
                    Ok(json) => println!("{json}"),
                    Err(err) => {
                        eprintln!("failed to serialize result: {err}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                let stats = &detail.statistics;
                println!("Valuation complete in {} ms", detail.execution_time_ms);
                println!("  scenarios : {}", stats.scenario_count);
                println!("  mean      : {:.2}", stats.mean);
                println!("  stddev    : {:.2}", stats.stddev);
                println!("  P50       : {:.2}", stats.p50);
                println!("  P75       : {:.2}", stats.p75);
                println!("  P90       : {:.2}", stats.p90);
                println!("  P95       : {:.2}", stats.p95);
                println!("  P99       : {:.2}", stats.p99);
                println!("  CTE95     : {:.2}", stats.cte95);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("valuation failed: {err}");
            ExitCode::FAILURE
        }
    }
}
