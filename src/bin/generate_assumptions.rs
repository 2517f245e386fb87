//! Generates a default set of assumption table files (binary and CSV)
//!
//! Useful for smoke-testing `valuation-driver` without hand-building
//! mortality/lapse/expense files first.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use stochastic_valuation::assumptions::loader;

#[derive(Parser, Debug)]
#[command(name = "generate_assumptions", about = "Write a flat default assumption set to a directory")]
struct Args {
    /// Output directory (created if missing)
    #[arg(long, default_value = "assumptions_out")]
    out_dir: PathBuf,

    /// Flat mortality rate applied at every age
    #[arg(long, default_value_t = 0.005)]
    mortality_rate: f64,

    /// Flat lapse rate applied in every policy year
    #[arg(long, default_value_t = 0.03)]
    lapse_rate: f64,

    #[arg(long, default_value_t = 500.0)]
    acquisition_expense: f64,

    #[arg(long, default_value_t = 50.0)]
    maintenance_expense: f64,

    #[arg(long, default_value_t = 0.02)]
    percent_of_premium_expense: f64,

    #[arg(long, default_value_t = 100.0)]
    claim_expense: f64,

    /// Also write CSV variants alongside the binary files
    #[arg(long)]
    csv: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = std::fs::create_dir_all(&args.out_dir) {
        eprintln!("failed to create {}: {err}", args.out_dir.display());
        return ExitCode::FAILURE;
    }

    let mortality_rates: Vec<(f64, f64)> =
        vec![(args.mortality_rate, args.mortality_rate); 121];
    let lapse_rates: Vec<f64> = vec![args.lapse_rate; 50];
    let expenses = match stochastic_valuation::ExpenseAssumptions::new(
        args.acquisition_expense,
        args.maintenance_expense,
        args.percent_of_premium_expense,
        args.claim_expense,
    ) {
        Ok(e) => e,
        Err(err) => {
            eprintln!("invalid expense assumptions: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = (|| -> stochastic_valuation::ValuationResult<()> {
        loader::save_mortality_binary(&args.out_dir.join("mortality.bin"), &mortality_rates)?;
        loader::save_lapse_binary(&args.out_dir.join("lapse.bin"), &lapse_rates)?;
        loader::save_expense_binary(&args.out_dir.join("expenses.bin"), &expenses)?;
        if args.csv {
            loader::save_mortality_csv(&args.out_dir.join("mortality.csv"), &mortality_rates)?;
            loader::save_lapse_csv(&args.out_dir.join("lapse.csv"), &lapse_rates)?;
            loader::save_expense_csv(&args.out_dir.join("expenses.csv"), &expenses)?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            println!("wrote assumption tables to {}", args.out_dir.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to write assumption tables: {err}");
            ExitCode::FAILURE
        }
    }
}
