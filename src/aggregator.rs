//! Reduces N per-scenario NPVs into portfolio-level statistics
//!
//! The scheduler fills a dense, scenario-indexed result array (one slot per
//! scenario, written exactly once by whichever worker owned that scenario).
//! This module turns that array into the scalars reported to the caller:
//! mean, sample standard deviation, percentiles, and CTE95 (the expected
//! value of the worst 5% of outcomes).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Below this sample size, percentiles use nearest-rank rather than linear
/// interpolation, and CTE95 is just the single worst value.
const SMALL_SAMPLE_THRESHOLD: usize = 20;

/// Samples beyond this size are sorted with rayon's parallel sort; this is
/// an embarrassingly parallel post-hoc reduction over an already-complete
/// array, unrelated to the scheduler's scenario dispatch.
const PARALLEL_SORT_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    pub scenario_count: usize,
    pub mean: f64,
    pub stddev: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub cte95: f64,
    pub distribution: Option<Vec<f64>>,
}

pub struct Aggregator {
    retain_distribution: bool,
}

impl Aggregator {
    pub fn new(retain_distribution: bool) -> Self {
        Self { retain_distribution }
    }

    /// Reduce `npvs` (must already be in scenario order when
    /// `reproducible_mode` is in effect — callers guarantee this by reading
    /// the result slots in index order) into aggregate statistics.
    pub fn aggregate(&self, npvs: &[f64]) -> AggregateStatistics {
        let n = npvs.len();
        assert!(n > 0, "cannot aggregate an empty scenario set");

        let mean = npvs.iter().sum::<f64>() / n as f64;
        let stddev = sample_stddev(npvs, mean);

        let mut sorted = npvs.to_vec();
        if sorted.len() >= PARALLEL_SORT_THRESHOLD {
            sorted.par_sort_by(|a, b| a.partial_cmp(b).unwrap());
        } else {
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        }

        let small = n < SMALL_SAMPLE_THRESHOLD;
        let p50 = percentile(&sorted, 50.0, small);
        let p75 = percentile(&sorted, 75.0, small);
        let p90 = percentile(&sorted, 90.0, small);
        let p95 = percentile(&sorted, 95.0, small);
        let p99 = percentile(&sorted, 99.0, small);
        let cte95 = if small {
            sorted[0]
        } else {
            let tail: Vec<f64> = sorted.iter().copied().filter(|&x| x <= p5(&sorted)).collect();
            tail.iter().sum::<f64>() / tail.len() as f64
        };

        AggregateStatistics {
            scenario_count: n,
            mean,
            stddev,
            p50,
            p75,
            p90,
            p95,
            p99,
            cte95,
            distribution: if self.retain_distribution {
                Some(npvs.to_vec())
            } else {
                None
            },
        }
    }
}

fn sample_stddev(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|&x| (x - mean) * (x - mean)).sum();
    (sum_sq / (n - 1) as f64).sqrt()
}

fn p5(sorted: &[f64]) -> f64 {
    percentile(sorted, 5.0, false)
}

/// `sorted` must already be ascending. `small` selects nearest-rank instead
/// of linear interpolation, per §4.5.
fn percentile(sorted: &[f64], p: f64, small: bool) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    if small {
        let rank = ((p / 100.0) * (n as f64 - 1.0)).round() as usize;
        return sorted[rank.min(n - 1)];
    }
    let idx = (p / 100.0) * (n as f64 - 1.0);
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = idx - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}
