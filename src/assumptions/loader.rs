//! Binary and CSV loaders for assumption tables
//!
//! Binary layouts are fixed-size arrays of little-endian f64 (§6); CSV
//! variants carry the same values with a header row. Both paths must
//! produce identical in-memory state.

use super::{ExpenseAssumptions, LapseTable, MortalityTable};
use crate::error::{ValuationError, ValuationResult};
use std::io::{Read, Write};
use std::path::Path;

const MORTALITY_ROWS: usize = 121;
const LAPSE_ROWS: usize = 50;
const EXPENSE_FIELDS: usize = 4;

fn read_f64_le(bytes: &[u8]) -> f64 {
    f64::from_le_bytes(bytes.try_into().unwrap())
}

/// Load a binary mortality table: 121 rows × 2 (male, female) doubles,
/// row-major by age, per §6. `MortalityTable`'s own in-memory
/// representation is (female, male) (see `mortality.rs`); the swap happens
/// here at the binary boundary, not internally.
pub fn load_mortality_binary(path: &Path) -> ValuationResult<MortalityTable> {
    let mut file = std::fs::File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let expected = MORTALITY_ROWS * 2 * 8;
    if data.len() != expected {
        return Err(ValuationError::InvalidInput(format!(
            "mortality binary file must be {expected} bytes, got {}",
            data.len()
        )));
    }

    let mut rates = Vec::with_capacity(MORTALITY_ROWS);
    for row in data.chunks_exact(16) {
        let male = read_f64_le(&row[0..8]);
        let female = read_f64_le(&row[8..16]);
        rates.push((female, male));
    }
    MortalityTable::new(rates).map_err(ValuationError::InvalidInput)
}

/// Write a binary mortality table: 121 rows × 2 (male, female) doubles, per
/// §6. `rates` is (female, male) per row, matching `MortalityTable`'s
/// in-memory order; the swap happens here at the binary boundary.
pub fn save_mortality_binary(path: &Path, rates: &[(f64, f64)]) -> ValuationResult<()> {
    let mut file = std::fs::File::create(path)?;
    for (female, male) in rates {
        file.write_all(&male.to_le_bytes())?;
        file.write_all(&female.to_le_bytes())?;
    }
    Ok(())
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct MortalityCsvRow {
    age: usize,
    female: f64,
    male: f64,
}

/// Load a mortality table from CSV (columns: age, female, male).
pub fn load_mortality_csv(path: &Path) -> ValuationResult<MortalityTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rates = vec![(0.0, 0.0); MORTALITY_ROWS];
    for row in reader.deserialize::<MortalityCsvRow>() {
        let row = row?;
        if row.age >= MORTALITY_ROWS {
            return Err(ValuationError::InvalidInput(format!(
                "mortality csv age {} out of range",
                row.age
            )));
        }
        rates[row.age] = (row.female, row.male);
    }
    MortalityTable::new(rates).map_err(ValuationError::InvalidInput)
}

/// Write a mortality table to CSV.
pub fn save_mortality_csv(path: &Path, rates: &[(f64, f64)]) -> ValuationResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for (age, (female, male)) in rates.iter().enumerate() {
        writer.serialize(MortalityCsvRow {
            age,
            female: *female,
            male: *male,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a binary lapse table: 50 doubles, index 0 = policy-year 1.
pub fn load_lapse_binary(path: &Path) -> ValuationResult<LapseTable> {
    let mut file = std::fs::File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let expected = LAPSE_ROWS * 8;
    if data.len() != expected {
        return Err(ValuationError::InvalidInput(format!(
            "lapse binary file must be {expected} bytes, got {}",
            data.len()
        )));
    }

    let rates: Vec<f64> = data.chunks_exact(8).map(read_f64_le).collect();
    LapseTable::new(rates).map_err(ValuationError::InvalidInput)
}

/// Write a binary lapse table.
pub fn save_lapse_binary(path: &Path, rates: &[f64]) -> ValuationResult<()> {
    let mut file = std::fs::File::create(path)?;
    for rate in rates {
        file.write_all(&rate.to_le_bytes())?;
    }
    Ok(())
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct LapseCsvRow {
    policy_year: u32,
    rate: f64,
}

/// Load a lapse table from CSV (columns: policy_year, rate).
pub fn load_lapse_csv(path: &Path) -> ValuationResult<LapseTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows: Vec<(u32, f64)> = Vec::new();
    for row in reader.deserialize::<LapseCsvRow>() {
        let row = row?;
        rows.push((row.policy_year, row.rate));
    }
    rows.sort_by_key(|(year, _)| *year);
    let rates: Vec<f64> = rows.into_iter().map(|(_, rate)| rate).collect();
    LapseTable::new(rates).map_err(ValuationError::InvalidInput)
}

/// Write a lapse table to CSV.
pub fn save_lapse_csv(path: &Path, rates: &[f64]) -> ValuationResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for (i, rate) in rates.iter().enumerate() {
        writer.serialize(LapseCsvRow {
            policy_year: (i + 1) as u32,
            rate: *rate,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a binary expense record: four doubles, acquisition, maintenance,
/// percent_of_premium, claim_expense.
pub fn load_expense_binary(path: &Path) -> ValuationResult<ExpenseAssumptions> {
    let mut file = std::fs::File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let expected = EXPENSE_FIELDS * 8;
    if data.len() != expected {
        return Err(ValuationError::InvalidInput(format!(
            "expense binary file must be {expected} bytes, got {}",
            data.len()
        )));
    }

    let acquisition = read_f64_le(&data[0..8]);
    let maintenance = read_f64_le(&data[8..16]);
    let percent_of_premium = read_f64_le(&data[16..24]);
    let claim_expense = read_f64_le(&data[24..32]);

    ExpenseAssumptions::new(acquisition, maintenance, percent_of_premium, claim_expense)
        .map_err(ValuationError::InvalidInput)
}

/// Write a binary expense record.
pub fn save_expense_binary(path: &Path, expenses: &ExpenseAssumptions) -> ValuationResult<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(&expenses.acquisition.to_le_bytes())?;
    file.write_all(&expenses.maintenance.to_le_bytes())?;
    file.write_all(&expenses.percent_of_premium.to_le_bytes())?;
    file.write_all(&expenses.claim_expense.to_le_bytes())?;
    Ok(())
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct ExpenseCsvRow {
    acquisition: f64,
    maintenance: f64,
    percent_of_premium: f64,
    claim_expense: f64,
}

/// Load an expense record from CSV (single data row).
pub fn load_expense_csv(path: &Path) -> ValuationResult<ExpenseAssumptions> {
    let mut reader = csv::Reader::from_path(path)?;
    let row: ExpenseCsvRow = reader
        .deserialize()
        .next()
        .ok_or_else(|| ValuationError::InvalidInput("expense csv has no data row".to_string()))??;
    ExpenseAssumptions::new(
        row.acquisition,
        row.maintenance,
        row.percent_of_premium,
        row.claim_expense,
    )
    .map_err(ValuationError::InvalidInput)
}

/// Write an expense record to CSV.
pub fn save_expense_csv(path: &Path, expenses: &ExpenseAssumptions) -> ValuationResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.serialize(ExpenseCsvRow {
        acquisition: expenses.acquisition,
        maintenance: expenses.maintenance,
        percent_of_premium: expenses.percent_of_premium,
        claim_expense: expenses.claim_expense,
    })?;
    writer.flush()?;
    Ok(())
}
