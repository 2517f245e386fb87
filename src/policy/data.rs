//! Policy data structures matching the valuation inforce format

use serde::{Deserialize, Serialize};

/// Gender of the policyholder, used for mortality table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Gender::Male),
            1 => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }
}

/// Product tag selecting the cashflow variation applied by the projection
/// kernel (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductTag {
    Term,
    WholeLife,
    Endowment,
    Annuity,
}

impl ProductTag {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ProductTag::Term),
            1 => Some(ProductTag::WholeLife),
            2 => Some(ProductTag::Endowment),
            3 => Some(ProductTag::Annuity),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ProductTag::Term => 0,
            ProductTag::WholeLife => 1,
            ProductTag::Endowment => 2,
            ProductTag::Annuity => 3,
        }
    }
}

/// Underwriting class. Stored and round-tripped per §3's data model; the
/// kernel's mortality lookup is exactly `qx(age,gender) * mortality_mult`
/// per spec.md §4.4 — underwriting class carries no separate multiplier of
/// its own (see DESIGN.md's Open Question decision on per-policy hooks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnderwritingClass {
    Standard,
    Preferred,
    Smoker,
    Substandard,
}

impl UnderwritingClass {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(UnderwritingClass::Standard),
            1 => Some(UnderwritingClass::Preferred),
            2 => Some(UnderwritingClass::Smoker),
            3 => Some(UnderwritingClass::Substandard),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            UnderwritingClass::Standard => 0,
            UnderwritingClass::Preferred => 1,
            UnderwritingClass::Smoker => 2,
            UnderwritingClass::Substandard => 3,
        }
    }
}

/// A single policy in the valuation portfolio.
///
/// Immutable for the duration of a job; the in-force array is stored
/// 16-byte aligned (see [`crate::buffer`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: u32,
    pub issue_age: u8,
    pub gender: Gender,
    pub product: ProductTag,
    pub underwriting: UnderwritingClass,
    pub sum_assured: f64,
    pub premium: f64,
    pub term: u16,
}

impl Policy {
    pub fn new(
        policy_id: u32,
        issue_age: u8,
        gender: Gender,
        product: ProductTag,
        underwriting: UnderwritingClass,
        sum_assured: f64,
        premium: f64,
        term: u16,
    ) -> Self {
        Self {
            policy_id,
            issue_age,
            gender,
            product,
            underwriting,
            sum_assured,
            premium,
            term,
        }
    }

    /// Attained age in projection year `y` (1-indexed), clamped to the
    /// mortality table's maximum age of 120.
    pub fn attained_age(&self, y: u32) -> u8 {
        let age = self.issue_age as u32 + y.saturating_sub(1);
        age.min(120) as u8
    }

    /// Whether the policy record's fields are within the ranges §3
    /// requires. Does not validate against assumption tables.
    pub fn validate(&self) -> Result<(), String> {
        if self.issue_age as u32 > 120 {
            return Err(format!(
                "policy {}: issue_age {} out of [0,120]",
                self.policy_id, self.issue_age
            ));
        }
        // NaN/Inf in sum_assured or premium is not rejected here: per the
        // error taxonomy, a non-finite cashflow input is an execution-time
        // fault attributable to a specific (scenario, policy) pair, so it
        // surfaces as `ExecutionError` out of the projection kernel rather
        // than `InvalidInput` at load time.
        if self.sum_assured < 0.0 {
            return Err(format!(
                "policy {}: sum_assured {} must be non-negative",
                self.policy_id, self.sum_assured
            ));
        }
        if self.premium < 0.0 {
            return Err(format!(
                "policy {}: premium {} must be non-negative",
                self.policy_id, self.premium
            ));
        }
        if self.term == 0 || self.term > 50 {
            return Err(format!(
                "policy {}: term {} out of [1,50]",
                self.policy_id, self.term
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Policy {
        Policy::new(
            1,
            40,
            Gender::Male,
            ProductTag::Term,
            UnderwritingClass::Standard,
            100_000.0,
            1_200.0,
            20,
        )
    }

    #[test]
    fn attained_age_clamps_at_120() {
        let p = Policy::new(
            2,
            115,
            Gender::Female,
            ProductTag::WholeLife,
            UnderwritingClass::Standard,
            1.0,
            1.0,
            50,
        );
        assert_eq!(p.attained_age(1), 115);
        assert_eq!(p.attained_age(10), 120); // 115+9=124 clamped to 120
    }

    #[test]
    fn validate_accepts_sample() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_term() {
        let mut p = sample();
        p.term = 0;
        assert!(p.validate().is_err());
        p.term = 51;
        assert!(p.validate().is_err());
    }

    #[test]
    fn underwriting_class_round_trips_through_code() {
        for class in [
            UnderwritingClass::Standard,
            UnderwritingClass::Preferred,
            UnderwritingClass::Smoker,
            UnderwritingClass::Substandard,
        ] {
            assert_eq!(UnderwritingClass::from_code(class.code()), Some(class));
        }
    }
}
