//! Expense assumptions: acquisition, maintenance, percent-of-premium, claim

/// Per-policy expense loads. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpenseAssumptions {
    /// One-off expense charged in year 1.
    pub acquisition: f64,
    /// Per-policy, per-year maintenance expense.
    pub maintenance: f64,
    /// Fraction of premium charged as an expense.
    pub percent_of_premium: f64,
    /// Per-death claim expense.
    pub claim_expense: f64,
}

impl ExpenseAssumptions {
    pub fn new(
        acquisition: f64,
        maintenance: f64,
        percent_of_premium: f64,
        claim_expense: f64,
    ) -> Result<Self, String> {
        for (name, value) in [
            ("acquisition", acquisition),
            ("maintenance", maintenance),
            ("percent_of_premium", percent_of_premium),
            ("claim_expense", claim_expense),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("expense assumption {name} must be finite and non-negative, got {value}"));
            }
        }
        Ok(Self {
            acquisition,
            maintenance,
            percent_of_premium,
            claim_expense,
        })
    }
}
