//! Binary and CSV loaders for the policy inforce file
//!
//! The binary format is the packed 32-byte little-endian record from §6;
//! the CSV format carries the same fields with a header row. Both paths
//! must produce identical in-memory [`Policy`] values (the round-trip law
//! in §8).

use super::{Gender, Policy, ProductTag, UnderwritingClass};
use crate::error::{ValuationError, ValuationResult};
use std::io::{Read, Write};
use std::path::Path;

/// Size in bytes of one packed policy record.
pub const RECORD_SIZE: usize = 32;

/// Decode one 32-byte packed record into a [`Policy`].
pub fn decode_record(bytes: &[u8; RECORD_SIZE]) -> ValuationResult<Policy> {
    let policy_id = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let issue_age = bytes[4];
    let gender = Gender::from_code(bytes[5])
        .ok_or_else(|| ValuationError::InvalidInput(format!("unknown gender code {}", bytes[5])))?;
    let product = ProductTag::from_code(bytes[6])
        .ok_or_else(|| ValuationError::InvalidInput(format!("unknown product code {}", bytes[6])))?;
    let underwriting = UnderwritingClass::from_code(bytes[7]).ok_or_else(|| {
        ValuationError::InvalidInput(format!("unknown underwriting code {}", bytes[7]))
    })?;
    let sum_assured = f32::from_le_bytes(bytes[8..12].try_into().unwrap()) as f64;
    let premium = f32::from_le_bytes(bytes[12..16].try_into().unwrap()) as f64;
    let term = u16::from_le_bytes(bytes[16..18].try_into().unwrap());
    // bytes[18..20] reserved, bytes[20..32] padding[3] f32 — ignored.

    Ok(Policy {
        policy_id,
        issue_age,
        gender,
        product,
        underwriting,
        sum_assured,
        premium,
        term,
    })
}

/// Encode a [`Policy`] into its packed 32-byte representation.
pub fn encode_record(policy: &Policy) -> [u8; RECORD_SIZE] {
    let mut bytes = [0u8; RECORD_SIZE];
    bytes[0..4].copy_from_slice(&policy.policy_id.to_le_bytes());
    bytes[4] = policy.issue_age;
    bytes[5] = policy.gender.code();
    bytes[6] = policy.product.code();
    bytes[7] = policy.underwriting.code();
    bytes[8..12].copy_from_slice(&(policy.sum_assured as f32).to_le_bytes());
    bytes[12..16].copy_from_slice(&(policy.premium as f32).to_le_bytes());
    bytes[16..18].copy_from_slice(&policy.term.to_le_bytes());
    // bytes[18..32] stay zeroed (reserved + padding).
    bytes
}

/// Load policies from a packed binary file.
pub fn load_binary(path: &Path) -> ValuationResult<Vec<Policy>> {
    let mut file = std::fs::File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    if data.len() % RECORD_SIZE != 0 {
        return Err(ValuationError::InvalidInput(format!(
            "binary policy file size {} is not a multiple of {}",
            data.len(),
            RECORD_SIZE
        )));
    }

    data.chunks_exact(RECORD_SIZE)
        .map(|chunk| decode_record(chunk.try_into().unwrap()))
        .collect()
}

/// Write policies to a packed binary file.
pub fn save_binary(path: &Path, policies: &[Policy]) -> ValuationResult<()> {
    let mut file = std::fs::File::create(path)?;
    for policy in policies {
        file.write_all(&encode_record(policy))?;
    }
    Ok(())
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CsvRow {
    policy_id: u32,
    issue_age: u8,
    gender: String,
    product: String,
    underwriting: String,
    sum_assured: f64,
    premium: f64,
    term: u16,
}

impl CsvRow {
    fn from_policy(p: &Policy) -> Self {
        Self {
            policy_id: p.policy_id,
            issue_age: p.issue_age,
            gender: match p.gender {
                Gender::Male => "male".to_string(),
                Gender::Female => "female".to_string(),
            },
            product: match p.product {
                ProductTag::Term => "term".to_string(),
                ProductTag::WholeLife => "whole_life".to_string(),
                ProductTag::Endowment => "endowment".to_string(),
                ProductTag::Annuity => "annuity".to_string(),
            },
            underwriting: match p.underwriting {
                UnderwritingClass::Standard => "standard".to_string(),
                UnderwritingClass::Preferred => "preferred".to_string(),
                UnderwritingClass::Smoker => "smoker".to_string(),
                UnderwritingClass::Substandard => "substandard".to_string(),
            },
            sum_assured: p.sum_assured,
            premium: p.premium,
            term: p.term,
        }
    }

    fn into_policy(self) -> ValuationResult<Policy> {
        let gender = match self.gender.to_lowercase().as_str() {
            "male" => Gender::Male,
            "female" => Gender::Female,
            other => return Err(ValuationError::InvalidInput(format!("unknown gender {other}"))),
        };
        let product = match self.product.to_lowercase().as_str() {
            "term" => ProductTag::Term,
            "whole_life" | "wholelife" => ProductTag::WholeLife,
            "endowment" => ProductTag::Endowment,
            "annuity" => ProductTag::Annuity,
            other => return Err(ValuationError::InvalidInput(format!("unknown product {other}"))),
        };
        let underwriting = match self.underwriting.to_lowercase().as_str() {
            "standard" => UnderwritingClass::Standard,
            "preferred" => UnderwritingClass::Preferred,
            "smoker" => UnderwritingClass::Smoker,
            "substandard" => UnderwritingClass::Substandard,
            other => {
                return Err(ValuationError::InvalidInput(format!(
                    "unknown underwriting class {other}"
                )))
            }
        };

        Ok(Policy {
            policy_id: self.policy_id,
            issue_age: self.issue_age,
            gender,
            product,
            underwriting,
            sum_assured: self.sum_assured,
            premium: self.premium,
            term: self.term,
        })
    }
}

/// Load policies from a CSV file with a header row.
pub fn load_csv(path: &Path) -> ValuationResult<Vec<Policy>> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize::<CsvRow>()
        .map(|row| row.map_err(ValuationError::from).and_then(CsvRow::into_policy))
        .collect()
}

/// Write policies to a CSV file with a header row.
pub fn save_csv(path: &Path, policies: &[Policy]) -> ValuationResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for policy in policies {
        writer.serialize(CsvRow::from_policy(policy))?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a policy inforce file, dispatching on extension (`.csv` vs
/// anything else treated as the packed binary format).
pub fn load_policies(path: &Path) -> ValuationResult<Vec<Policy>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => load_csv(path),
        _ => load_binary(path),
    }
}
