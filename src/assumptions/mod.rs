//! Actuarial assumption tables: mortality, lapse, expenses

mod expense;
mod lapse;
pub mod loader;
mod mortality;

pub use expense::ExpenseAssumptions;
pub use lapse::{LapseTable, MAX_POLICY_YEAR};
pub use mortality::{MortalityTable, MAX_AGE};

use crate::error::ValuationResult;
use std::path::Path;

/// Container for all assumption tables used in a valuation job.
#[derive(Debug, Clone)]
pub struct Assumptions {
    pub mortality: MortalityTable,
    pub lapse: LapseTable,
    pub expenses: ExpenseAssumptions,
}

impl Assumptions {
    pub fn new(mortality: MortalityTable, lapse: LapseTable, expenses: ExpenseAssumptions) -> Self {
        Self {
            mortality,
            lapse,
            expenses,
        }
    }

    /// Load all three tables from a directory of binary files
    /// (`mortality.bin`, `lapse.bin`, `expenses.bin`).
    pub fn from_binary_dir(dir: &Path) -> ValuationResult<Self> {
        Ok(Self {
            mortality: loader::load_mortality_binary(&dir.join("mortality.bin"))?,
            lapse: loader::load_lapse_binary(&dir.join("lapse.bin"))?,
            expenses: loader::load_expense_binary(&dir.join("expenses.bin"))?,
        })
    }

    /// Load all three tables from a directory of CSV files
    /// (`mortality.csv`, `lapse.csv`, `expenses.csv`).
    pub fn from_csv_dir(dir: &Path) -> ValuationResult<Self> {
        Ok(Self {
            mortality: loader::load_mortality_csv(&dir.join("mortality.csv"))?,
            lapse: loader::load_lapse_csv(&dir.join("lapse.csv"))?,
            expenses: loader::load_expense_csv(&dir.join("expenses.csv"))?,
        })
    }

    /// A small flat set of assumptions useful for tests and demos.
    pub fn flat(mortality_rate: f64, lapse_rate: f64, expenses: ExpenseAssumptions) -> Self {
        Self {
            mortality: MortalityTable::flat(mortality_rate),
            lapse: LapseTable::flat(lapse_rate),
            expenses,
        }
    }
}
