//! Stochastic interest-rate scenario generator
//!
//! Turns a scenario index and master seed into a deterministic short-rate
//! path plus cumulative discount factors, reproducible from
//! `(master_seed, s)` alone. Each worker generates and holds a path only
//! for the scenario it currently owns; paths are never shared across
//! workers.

use crate::rng::Rng;
use serde::{Deserialize, Serialize};

/// Bounds and starting point for the short-rate random walk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScenarioParams {
    pub initial_rate: f64,
    pub drift: f64,
    pub volatility: f64,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl ScenarioParams {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("initial_rate", self.initial_rate),
            ("drift", self.drift),
            ("volatility", self.volatility),
            ("min_rate", self.min_rate),
            ("max_rate", self.max_rate),
        ] {
            if !value.is_finite() {
                return Err(format!("scenario param {name} must be finite, got {value}"));
            }
        }
        if self.volatility < 0.0 {
            return Err(format!("volatility must be non-negative, got {}", self.volatility));
        }
        if self.min_rate > self.max_rate {
            return Err(format!(
                "min_rate {} must be <= max_rate {}",
                self.min_rate, self.max_rate
            ));
        }
        Ok(())
    }
}

/// Golden-ratio-derived constant from §4.3 used to decorrelate per-scenario seeds.
const SEED_MULTIPLIER: u64 = 2654435761;

/// Derive the per-scenario seed from the master seed and scenario index.
pub fn scenario_seed(master_seed: u64, scenario: u32) -> u64 {
    master_seed ^ (scenario as u64).wrapping_mul(SEED_MULTIPLIER)
}

/// One scenario's short-rate path and cumulative discount factors,
/// indexed by projection year (`rate(y)`/`discount(y)` are 1-indexed;
/// `discount(0)` is always 1.0).
#[derive(Debug, Clone)]
pub struct ScenarioPath {
    rates: Vec<f64>,
    discounts: Vec<f64>,
}

impl ScenarioPath {
    /// Generate the path for scenario `s` over `max_term` years.
    pub fn generate(master_seed: u64, s: u32, max_term: u32, params: &ScenarioParams) -> Self {
        let mut rng = Rng::new(scenario_seed(master_seed, s));

        let mut rates = Vec::with_capacity(max_term as usize + 1);
        let mut discounts = Vec::with_capacity(max_term as usize + 1);
        rates.push(0.0); // unused index 0 placeholder, years are 1-indexed
        discounts.push(1.0);

        // r(s,1) = initial_rate, unclamped per §4.3's pseudocode — only the
        // y>=2 random-walk step clamps into [min_rate, max_rate].
        let mut r = params.initial_rate;
        for y in 1..=max_term {
            if y > 1 {
                let z = rng.next_normal();
                r = (r + params.drift + params.volatility * z)
                    .clamp(params.min_rate, params.max_rate);
            }
            rates.push(r);
            let prior_discount = discounts[(y - 1) as usize];
            discounts.push(prior_discount / (1.0 + r));
        }

        Self { rates, discounts }
    }

    /// Short rate in year `y` (1-indexed).
    pub fn rate(&self, y: u32) -> f64 {
        self.rates[y as usize]
    }

    /// Cumulative discount factor through year `y` (0-indexed at 1.0).
    pub fn discount(&self, y: u32) -> f64 {
        self.discounts[y as usize]
    }

    pub fn max_term(&self) -> u32 {
        (self.rates.len() - 1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_params(rate: f64) -> ScenarioParams {
        ScenarioParams {
            initial_rate: rate,
            drift: 0.0,
            volatility: 0.0,
            min_rate: 0.0,
            max_rate: 1.0,
        }
    }

    #[test]
    fn zero_vol_is_constant_rate() {
        let path = ScenarioPath::generate(42, 0, 10, &flat_params(0.04));
        for y in 1..=10 {
            assert!((path.rate(y) - 0.04).abs() < 1e-12);
        }
    }

    #[test]
    fn discount_factor_matches_formula() {
        let path = ScenarioPath::generate(42, 0, 5, &flat_params(0.05));
        assert_eq!(path.discount(0), 1.0);
        let mut expected = 1.0;
        for y in 1..=5 {
            expected /= 1.0 + 0.05;
            assert!((path.discount(y) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn same_seed_and_scenario_reproduce_path() {
        let params = ScenarioParams {
            initial_rate: 0.03,
            drift: 0.0,
            volatility: 0.01,
            min_rate: 0.0,
            max_rate: 0.2,
        };
        let a = ScenarioPath::generate(7, 3, 20, &params);
        let b = ScenarioPath::generate(7, 3, 20, &params);
        for y in 1..=20 {
            assert_eq!(a.rate(y).to_bits(), b.rate(y).to_bits());
            assert_eq!(a.discount(y).to_bits(), b.discount(y).to_bits());
        }
    }

    #[test]
    fn different_scenarios_decorrelate() {
        let params = ScenarioParams {
            initial_rate: 0.03,
            drift: 0.0,
            volatility: 0.02,
            min_rate: 0.0,
            max_rate: 0.2,
        };
        let a = ScenarioPath::generate(7, 1, 20, &params);
        let b = ScenarioPath::generate(7, 2, 20, &params);
        assert_ne!(a.rate(10), b.rate(10));
    }

    #[test]
    fn rate_path_respects_bounds() {
        let params = ScenarioParams {
            initial_rate: 0.19,
            drift: 0.05,
            volatility: 0.05,
            min_rate: 0.0,
            max_rate: 0.2,
        };
        let path = ScenarioPath::generate(1, 0, 50, &params);
        for y in 1..=50 {
            assert!(path.rate(y) >= 0.0 && path.rate(y) <= 0.2);
        }
    }
}
