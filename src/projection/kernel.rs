//! Per-policy, per-scenario projection kernel
//!
//! Computes the NPV of a single policy under one scenario's rate path by
//! rolling a year-by-year survival/lapse decrement forward. The portfolio
//! NPV for a scenario is the sum of this kernel's output across all
//! policies; the caller (the worker loop in [`crate::scheduler`]) performs
//! that sum, keeping one scenario's rate path in a small hot array while
//! streaming through the policy array once (scenario-major, policy-minor).

use crate::assumptions::Assumptions;
use crate::error::{ValuationError, ValuationResult};
use crate::policy::{Policy, ProductTag};
use crate::projection::Multipliers;
use crate::scenario::ScenarioPath;

const MAX_PROBABILITY: f64 = 0.999;
const SURVIVAL_FLOOR: f64 = 1e-12;

/// Project a single policy under `path`, returning its NPV.
///
/// `scenario` is only used to label a NaN/Inf failure per §7; it plays no
/// role in the arithmetic.
pub fn project_policy(
    policy: &Policy,
    assumptions: &Assumptions,
    multipliers: &Multipliers,
    path: &ScenarioPath,
    scenario: u32,
) -> ValuationResult<f64> {
    let mut survival = 1.0_f64;
    let mut cumulative_npv = 0.0_f64;

    for y in 1..=(policy.term as u32) {
        let age = policy.attained_age(y);
        let base_qx = assumptions.mortality.qx(age, policy.gender);
        let q = (base_qx * multipliers.mortality_mult).clamp(0.0, MAX_PROBABILITY);

        let lapse_rate =
            (assumptions.lapse.rate(y) * multipliers.lapse_mult).clamp(0.0, MAX_PROBABILITY);

        let deaths = survival * q;
        let lapses = (survival - deaths) * lapse_rate;
        let survival_end = survival - deaths - lapses;

        let is_final_year = y == policy.term as u32;

        let (prem_cf, claim_cf) = match policy.product {
            ProductTag::Term | ProductTag::WholeLife => {
                let prem_cf = policy.premium * survival;
                let claim_cf = (policy.sum_assured + assumptions.expenses.claim_expense) * deaths;
                (prem_cf, claim_cf)
            }
            ProductTag::Endowment => {
                let prem_cf = policy.premium * survival;
                let mut claim_cf = (policy.sum_assured + assumptions.expenses.claim_expense) * deaths;
                if is_final_year {
                    // Survival benefit paid to policyholders still in force
                    // at maturity, resolving the Open Question in spec.md §9.
                    claim_cf += policy.sum_assured * survival_end;
                }
                (prem_cf, claim_cf)
            }
            ProductTag::Annuity => {
                // Annuity reverses the premium/claim roles: the insurer
                // pays an annual benefit out of the pool and death simply
                // stops future payments, so there is no claim cashflow.
                let prem_cf = -policy.sum_assured * survival;
                (prem_cf, 0.0)
            }
        };

        let exp_cf = {
            let base = assumptions.expenses.maintenance * survival
                + assumptions.expenses.percent_of_premium * policy.premium * survival;
            let acquisition = if y == 1 {
                assumptions.expenses.acquisition
            } else {
                0.0
            };
            (base + acquisition) * multipliers.expense_mult
        };

        let net = prem_cf - claim_cf - exp_cf;
        let discounted = net * path.discount(y);

        if !discounted.is_finite() {
            return Err(ValuationError::ExecutionError {
                scenario,
                policy_id: policy.policy_id,
                detail: format!("non-finite cashflow at year {y}: net={net}, discount={}", path.discount(y)),
            });
        }

        cumulative_npv += discounted;

        survival = survival_end;
        if survival < SURVIVAL_FLOOR {
            break;
        }
    }

    if !cumulative_npv.is_finite() {
        return Err(ValuationError::ExecutionError {
            scenario,
            policy_id: policy.policy_id,
            detail: format!("non-finite NPV: {cumulative_npv}"),
        });
    }

    Ok(cumulative_npv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::ExpenseAssumptions;
    use crate::policy::{Gender, UnderwritingClass};
    use crate::scenario::ScenarioParams;

    fn flat_assumptions(qx: f64, lapse: f64, expenses: ExpenseAssumptions) -> Assumptions {
        Assumptions::flat(qx, lapse, expenses)
    }

    fn flat_path(rate: f64, years: u32) -> ScenarioPath {
        ScenarioPath::generate(
            1,
            0,
            years,
            &ScenarioParams {
                initial_rate: rate,
                drift: 0.0,
                volatility: 0.0,
                min_rate: 0.0,
                max_rate: 1.0,
            },
        )
    }

    #[test]
    fn seed_scenario_3_single_policy_term_1() {
        // term=1, SA=100k, premium=1200, qx=0.01, lapse=0, expenses zero,
        // r=0.05, vol=0 => NPV = (1200 - 100000*0.01)/1.05 = 190.476190...
        let policy = Policy::new(
            1,
            40,
            Gender::Male,
            ProductTag::Term,
            UnderwritingClass::Standard,
            100_000.0,
            1_200.0,
            1,
        );
        let assumptions = flat_assumptions(0.01, 0.0, ExpenseAssumptions::new(0.0, 0.0, 0.0, 0.0).unwrap());
        let multipliers = Multipliers::default();
        let path = flat_path(0.05, 1);

        let npv = project_policy(&policy, &assumptions, &multipliers, &path, 0).unwrap();
        assert!((npv - 190.476190476).abs() < 1e-6);
    }

    #[test]
    fn lapse_mult_zero_means_only_mortality_governs_decline() {
        let policy = Policy::new(
            1,
            40,
            Gender::Male,
            ProductTag::Term,
            UnderwritingClass::Standard,
            100_000.0,
            1_200.0,
            5,
        );
        let assumptions = flat_assumptions(0.01, 0.5, ExpenseAssumptions::new(0.0, 0.0, 0.0, 0.0).unwrap());
        let multipliers = Multipliers {
            lapse_mult: 0.0,
            ..Default::default()
        };
        let path = flat_path(0.03, 5);

        // With lapse_mult=0, survival after year 1 should equal (1-qx).
        let npv = project_policy(&policy, &assumptions, &multipliers, &path, 0).unwrap();
        assert!(npv.is_finite());
    }

    #[test]
    fn multipliers_above_one_clamp_to_0_999() {
        let policy = Policy::new(
            1,
            40,
            Gender::Male,
            ProductTag::Term,
            UnderwritingClass::Standard,
            100_000.0,
            1_200.0,
            2,
        );
        let assumptions = flat_assumptions(0.9, 0.9, ExpenseAssumptions::new(0.0, 0.0, 0.0, 0.0).unwrap());
        let multipliers = Multipliers {
            mortality_mult: 10.0,
            lapse_mult: 10.0,
            expense_mult: 1.0,
        };
        let path = flat_path(0.03, 2);

        // Should not panic/overflow; clamped probabilities keep survival >= 0.
        let npv = project_policy(&policy, &assumptions, &multipliers, &path, 0).unwrap();
        assert!(npv.is_finite());
    }

    #[test]
    fn nan_premium_produces_execution_error() {
        let mut policy = Policy::new(
            1,
            40,
            Gender::Male,
            ProductTag::Term,
            UnderwritingClass::Standard,
            100_000.0,
            1_200.0,
            5,
        );
        policy.premium = f64::NAN;
        let assumptions = flat_assumptions(0.01, 0.02, ExpenseAssumptions::new(0.0, 0.0, 0.0, 0.0).unwrap());
        let multipliers = Multipliers::default();
        let path = flat_path(0.03, 5);

        let err = project_policy(&policy, &assumptions, &multipliers, &path, 7).unwrap_err();
        match err {
            ValuationError::ExecutionError { scenario, policy_id, .. } => {
                assert_eq!(scenario, 7);
                assert_eq!(policy_id, 1);
            }
            other => panic!("expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn endowment_pays_survival_benefit_at_maturity() {
        let term_policy = Policy::new(
            1,
            40,
            Gender::Male,
            ProductTag::Term,
            UnderwritingClass::Standard,
            100_000.0,
            1_200.0,
            5,
        );
        let endowment_policy = Policy {
            product: ProductTag::Endowment,
            ..term_policy
        };
        let assumptions = flat_assumptions(0.01, 0.02, ExpenseAssumptions::new(0.0, 0.0, 0.0, 0.0).unwrap());
        let multipliers = Multipliers::default();
        let path = flat_path(0.03, 5);

        let term_npv = project_policy(&term_policy, &assumptions, &multipliers, &path, 0).unwrap();
        let endowment_npv = project_policy(&endowment_policy, &assumptions, &multipliers, &path, 0).unwrap();

        // Endowment pays an additional survival benefit, so its NPV (net
        // cashflow to the insurer) must be lower than the term policy's.
        assert!(endowment_npv < term_npv);
    }

    #[test]
    fn annuity_is_a_net_outflow() {
        let policy = Policy::new(
            1,
            65,
            Gender::Male,
            ProductTag::Annuity,
            UnderwritingClass::Standard,
            10_000.0,
            0.0,
            10,
        );
        let assumptions = flat_assumptions(0.02, 0.0, ExpenseAssumptions::new(0.0, 10.0, 0.0, 0.0).unwrap());
        let multipliers = Multipliers::default();
        let path = flat_path(0.03, 10);

        let npv = project_policy(&policy, &assumptions, &multipliers, &path, 0).unwrap();
        assert!(npv < 0.0);
    }

    #[test]
    fn term_one_year_uses_discount_factor_year_1() {
        let policy = Policy::new(
            1,
            40,
            Gender::Male,
            ProductTag::Term,
            UnderwritingClass::Standard,
            100_000.0,
            1_200.0,
            1,
        );
        let assumptions = flat_assumptions(0.0, 0.0, ExpenseAssumptions::new(0.0, 0.0, 0.0, 0.0).unwrap());
        let multipliers = Multipliers::default();
        let path = flat_path(0.1, 1);

        let npv = project_policy(&policy, &assumptions, &multipliers, &path, 0).unwrap();
        let expected = 1_200.0 / 1.1;
        assert!((npv - expected).abs() < 1e-9);
    }
}
