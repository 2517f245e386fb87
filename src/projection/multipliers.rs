//! Scenario-level adjustment multipliers

use serde::{Deserialize, Serialize};

/// Uniform multiplicative adjustments applied at lookup time. All default
/// to 1.0 (no adjustment).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Multipliers {
    pub mortality_mult: f64,
    pub lapse_mult: f64,
    pub expense_mult: f64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            mortality_mult: 1.0,
            lapse_mult: 1.0,
            expense_mult: 1.0,
        }
    }
}

impl Multipliers {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("mortality_mult", self.mortality_mult),
            ("lapse_mult", self.lapse_mult),
            ("expense_mult", self.expense_mult),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("multiplier {name} must be finite and non-negative, got {value}"));
            }
        }
        Ok(())
    }
}
