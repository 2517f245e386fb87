//! Mortality table: qx(age, gender) lookup with endpoint clamping

use crate::policy::Gender;

/// qx(age, gender) ∈ [0, 0.999] for age ∈ [0, 120].
///
/// Lookups outside the table range clamp to the endpoint, as required by
/// §3. Immutable once built.
#[derive(Debug, Clone)]
pub struct MortalityTable {
    /// (female, male) annual mortality rate by age, index = age.
    rates: Vec<(f64, f64)>,
}

pub const MAX_AGE: usize = 120;
const MAX_PROBABILITY: f64 = 0.999;

impl MortalityTable {
    /// Build a table from 121 (female, male) rate pairs, validating that
    /// every entry is finite and within [0, 1].
    pub fn new(rates: Vec<(f64, f64)>) -> Result<Self, String> {
        if rates.len() != MAX_AGE + 1 {
            return Err(format!(
                "mortality table must have {} rows, got {}",
                MAX_AGE + 1,
                rates.len()
            ));
        }
        for (age, (female, male)) in rates.iter().enumerate() {
            if !female.is_finite() || !(0.0..=1.0).contains(female) {
                return Err(format!("female qx at age {age} out of [0,1]: {female}"));
            }
            if !male.is_finite() || !(0.0..=1.0).contains(male) {
                return Err(format!("male qx at age {age} out of [0,1]: {male}"));
            }
        }
        Ok(Self { rates })
    }

    /// qx at `age` for `gender`, clamped into [0, 0.999]. Ages beyond 120
    /// clamp to the rate at 120.
    pub fn qx(&self, age: u8, gender: Gender) -> f64 {
        let idx = (age as usize).min(MAX_AGE);
        let (female, male) = self.rates[idx];
        let raw = match gender {
            Gender::Female => female,
            Gender::Male => male,
        };
        raw.clamp(0.0, MAX_PROBABILITY)
    }

    /// A flat table for testing/demonstration: the same rate at every age
    /// and for both genders.
    pub fn flat(rate: f64) -> Self {
        Self {
            rates: vec![(rate, rate); MAX_AGE + 1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_probability() {
        let mut rates = vec![(0.01, 0.01); MAX_AGE + 1];
        rates[50] = (1.1, 0.01);
        assert!(MortalityTable::new(rates).is_err());
    }

    #[test]
    fn rejects_wrong_row_count() {
        assert!(MortalityTable::new(vec![(0.01, 0.01); 10]).is_err());
    }

    #[test]
    fn clamps_beyond_120() {
        let table = MortalityTable::flat(0.5);
        assert_eq!(table.qx(120, Gender::Male), table.qx(200, Gender::Male));
    }

    #[test]
    fn clamps_into_0_999() {
        let mut rates = vec![(0.0, 0.0); MAX_AGE + 1];
        rates[10] = (1.0, 1.0);
        let table = MortalityTable::new(rates).unwrap();
        assert_eq!(table.qx(10, Gender::Female), 0.999);
    }
}
