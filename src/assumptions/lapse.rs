//! Lapse table: rate by policy-year with endpoint clamping

/// Lapse rate by policy-year y ∈ [1, 50]. Outside that range clamps to
/// the last defined year. Immutable once built.
#[derive(Debug, Clone)]
pub struct LapseTable {
    /// Rate by policy year, index 0 = policy-year 1.
    rates: Vec<f64>,
}

pub const MAX_POLICY_YEAR: usize = 50;
const MAX_PROBABILITY: f64 = 0.999;

impl LapseTable {
    /// Build a table from up to 50 rates (fewer rates pad with the last
    /// given value; zero rates are rejected as malformed input).
    pub fn new(rates: Vec<f64>) -> Result<Self, String> {
        if rates.is_empty() {
            return Err("lapse table must have at least one entry".to_string());
        }
        if rates.len() > MAX_POLICY_YEAR {
            return Err(format!(
                "lapse table has {} entries, max is {}",
                rates.len(),
                MAX_POLICY_YEAR
            ));
        }
        for (i, rate) in rates.iter().enumerate() {
            if !rate.is_finite() || !(0.0..=1.0).contains(rate) {
                return Err(format!("lapse rate at year {} out of [0,1]: {rate}", i + 1));
            }
        }
        Ok(Self { rates })
    }

    /// Rate in policy year `y` (1-indexed), clamped to [0, 0.999]. Years
    /// beyond the table's last defined year clamp to that year's rate.
    pub fn rate(&self, y: u32) -> f64 {
        let idx = (y.max(1) as usize - 1).min(self.rates.len() - 1);
        self.rates[idx].clamp(0.0, MAX_PROBABILITY)
    }

    /// A flat table: the same rate in every policy year.
    pub fn flat(rate: f64) -> Self {
        Self {
            rates: vec![rate; MAX_POLICY_YEAR],
        }
    }
}
