//! End-to-end seed scenarios (spec §8) run through the public
//! `run_valuation` entry point rather than internal unit tests, using
//! `approx` for the floating-point comparisons.

use approx::assert_relative_eq;
use stochastic_valuation::{
    run_valuation, Assumptions, DriverOptions, ExpenseAssumptions, Gender, Multipliers, Policy,
    ProductTag, ScenarioParams, UnderwritingClass,
};

fn flat_portfolio(count: usize) -> Vec<Policy> {
    (0..count)
        .map(|i| {
            Policy::new(
                i as u32 + 1,
                40,
                Gender::Male,
                ProductTag::Term,
                UnderwritingClass::Standard,
                100_000.0,
                1_200.0,
                20,
            )
        })
        .collect()
}

fn standard_assumptions() -> Assumptions {
    Assumptions::flat(0.001, 0.02, ExpenseAssumptions::new(500.0, 50.0, 0.02, 100.0).unwrap())
}

/// Seed scenario 1: vol=0 collapses every scenario's rate path to the same
/// constant, so the portfolio NPV is identical across all 1,000 scenarios
/// and stddev must be (numerically) zero.
#[test]
fn seed_scenario_1_zero_volatility_gives_zero_stddev() {
    let portfolio = flat_portfolio(100);
    let params = ScenarioParams {
        initial_rate: 0.04,
        drift: 0.0,
        volatility: 0.0,
        min_rate: 0.0,
        max_rate: 1.0,
    };
    let options = DriverOptions {
        worker_count: 4,
        ..Default::default()
    };

    let result = run_valuation(
        &portfolio,
        &standard_assumptions(),
        &params,
        &Multipliers::default(),
        42,
        1_000,
        options,
    )
    .unwrap();

    assert_relative_eq!(result.statistics.stddev, 0.0, epsilon = 1e-6);
    assert_eq!(result.statistics.scenario_count, 1_000);
}

/// Seed scenario 2: with vol > 0, the aggregate must be exactly reproducible
/// (bit-identical mean) across worker counts, since `reproducible_mode`
/// defaults to true and result slots are scenario-indexed regardless of
/// completion order.
#[test]
fn seed_scenario_2_volatility_run_reproducible_across_worker_counts() {
    let portfolio = flat_portfolio(100);
    let params = ScenarioParams {
        initial_rate: 0.04,
        drift: 0.0,
        volatility: 0.01,
        min_rate: 0.0,
        max_rate: 1.0,
    };

    let mut means = Vec::new();
    let mut cte95s = Vec::new();
    for worker_count in [1, 2, 4, 8] {
        let options = DriverOptions {
            worker_count,
            ..Default::default()
        };
        let result = run_valuation(
            &portfolio,
            &standard_assumptions(),
            &params,
            &Multipliers::default(),
            42,
            1_000,
            options,
        )
        .unwrap();
        means.push(result.statistics.mean);
        cte95s.push(result.statistics.cte95);
    }

    for w in means.windows(2) {
        assert_eq!(w[0].to_bits(), w[1].to_bits(), "mean must be bit-identical across worker counts");
    }
    for w in cte95s.windows(2) {
        assert_eq!(w[0].to_bits(), w[1].to_bits(), "CTE95 must be bit-identical across worker counts");
    }
    assert!(cte95s[0] <= means[0], "CTE95 is a left-tail expectation, must not exceed the mean");
}

/// Seed scenario 3: single policy, term=1, zero volatility. NPV has a
/// closed form: (premium - sum_assured*qx) / (1 + r).
#[test]
fn seed_scenario_3_single_policy_term_one_matches_closed_form() {
    let portfolio = vec![Policy::new(
        1,
        40,
        Gender::Male,
        ProductTag::Term,
        UnderwritingClass::Standard,
        100_000.0,
        1_200.0,
        1,
    )];
    let assumptions = Assumptions::flat(0.01, 0.0, ExpenseAssumptions::new(0.0, 0.0, 0.0, 0.0).unwrap());
    let params = ScenarioParams {
        initial_rate: 0.05,
        drift: 0.0,
        volatility: 0.0,
        min_rate: 0.0,
        max_rate: 1.0,
    };
    let options = DriverOptions {
        worker_count: 1,
        ..Default::default()
    };

    let result = run_valuation(
        &portfolio,
        &assumptions,
        &params,
        &Multipliers::default(),
        42,
        1,
        options,
    )
    .unwrap();

    let expected = (1_200.0 - 100_000.0 * 0.01) / 1.05;
    assert_relative_eq!(result.statistics.mean, expected, epsilon = 1e-9);
}

/// Seed scenario 4: a mortality table entry above 1.0 must be rejected as
/// `InvalidInput` before any scenario runs.
#[test]
fn seed_scenario_4_pathological_mortality_table_rejected() {
    use stochastic_valuation::MortalityTable;

    let mut rows = vec![(0.001, 0.001); 121];
    rows[50] = (1.1, 0.001);
    let err = MortalityTable::new(rows).unwrap_err();
    assert!(err.contains("1.1") || err.to_lowercase().contains("range") || err.to_lowercase().contains("probability"));
}
