//! Growth reconciliation
//!
//! The critical numeric loop: given a starting headcount and a growth
//! target, solve for exact hire and new-hire-termination counts so the
//! resulting headcount lands within tolerance of the target, every year,
//! with no compounding drift.

use crate::error::SimError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// The resolved counts for one year's reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub experienced_terms: i64,
    pub target_end: i64,
    pub net_needed: i64,
    pub hires: i64,
    pub new_hire_terms: i64,
    pub active_end: i64,
}

fn round_decimal_to_i64(d: Decimal) -> i64 {
    d.round().to_i64().expect("rounded decimal fits in i64")
}

/// Solve the five numbered steps of the growth reconciliation algorithm.
///
/// `active_start` is `W = active_end(Y-1)`. `growth_target` is `g`.
/// `p_term` is the experienced termination rate already applied by the
/// termination generator to produce `experienced_terms`; it is passed here
/// (rather than re-derived) because step 1 is owned by the termination
/// generator, not this function — this function consumes that count.
pub fn reconcile(
    year: i32,
    active_start: i64,
    experienced_terms: i64,
    growth_target: Decimal,
    p_nh_term: Decimal,
) -> Result<ReconciliationResult, SimError> {
    if p_nh_term >= Decimal::ONE {
        return Err(SimError::Config {
            message: "p_nh_term must be < 1 (p_nh_term = 1 implies infinite hires)".to_string(),
        });
    }

    let w = Decimal::from(active_start);
    let target_end = round_decimal_to_i64(w * (Decimal::ONE + growth_target));

    let net_needed = target_end - (active_start - experienced_terms);

    let hires = solve_hires(net_needed, p_nh_term);
    let new_hire_terms = round_decimal_to_i64(Decimal::from(hires) * p_nh_term);
    let active_end = active_start - experienced_terms + hires - new_hire_terms;

    let drift = (active_end - target_end).abs();
    if drift > 1 {
        return Err(SimError::GrowthReconciliationFailure {
            year,
            active_end,
            target_end,
            drift,
        });
    }

    Ok(ReconciliationResult {
        experienced_terms,
        target_end,
        net_needed,
        hires,
        new_hire_terms,
        active_end,
    })
}

/// `hires = ceil(net_needed / (1 - p_nh_term))`, then nudge by +/-1 toward
/// whichever integer candidate minimizes `|net_achieved - net_needed|`,
/// tying toward fewer hires.
fn solve_hires(net_needed: i64, p_nh_term: Decimal) -> i64 {
    if net_needed <= 0 {
        return 0;
    }

    let denom = Decimal::ONE - p_nh_term;
    let raw = Decimal::from(net_needed) / denom;
    let base = raw.ceil().to_i64().expect("hire count fits in i64");

    let mut best = base;
    let mut best_residual = net_achieved_residual(base, net_needed, p_nh_term);

    for candidate in [base - 1, base + 1] {
        if candidate < 0 {
            continue;
        }
        let residual = net_achieved_residual(candidate, net_needed, p_nh_term);
        if residual < best_residual || (residual == best_residual && candidate < best) {
            best = candidate;
            best_residual = residual;
        }
    }

    best
}

fn net_achieved_residual(hires: i64, net_needed: i64, p_nh_term: Decimal) -> i64 {
    let nh_term = round_decimal_to_i64(Decimal::from(hires) * p_nh_term);
    let net_achieved = hires - nh_term;
    (net_achieved - net_needed).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec scenario A.
    #[test]
    fn scenario_a_baseline_small_census() {
        let result = reconcile(2025, 1000, 120, Decimal::new(3, 2), Decimal::new(25, 2)).unwrap();
        assert_eq!(result.experienced_terms, 120);
        assert_eq!(result.target_end, 1030);
        assert_eq!(result.net_needed, 150);
        assert_eq!(result.hires, 200);
        assert_eq!(result.new_hire_terms, 50);
        assert_eq!(result.active_end, 1030);
    }

    /// Spec scenario B.
    #[test]
    fn scenario_b_growth_target_with_rounding_residue() {
        let result = reconcile(2025, 1001, 120, Decimal::new(3, 2), Decimal::new(25, 2)).unwrap();
        assert_eq!(result.target_end, 1031);
        assert_eq!(result.net_needed, 150);
        assert_eq!(result.hires, 200);
        assert_eq!(result.new_hire_terms, 50);
        assert_eq!(result.active_end, 1031);
    }

    /// Invariant 9: p_nh_term = 0 makes hires exactly net_needed.
    #[test]
    fn p_nh_term_zero_makes_hires_exactly_net_needed() {
        let result = reconcile(2025, 1000, 100, Decimal::new(5, 2), Decimal::ZERO).unwrap();
        assert_eq!(result.hires, result.net_needed);
        assert_eq!(result.new_hire_terms, 0);
    }

    /// Invariant 10: p_nh_term = 1 is a ConfigError.
    #[test]
    fn p_nh_term_one_is_config_error() {
        let err = reconcile(2025, 1000, 100, Decimal::new(5, 2), Decimal::ONE).unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
    }

    /// Invariant 11: g = 0 with p_term = 0 produces 0 hires and 0 terminations.
    #[test]
    fn zero_growth_zero_termination_is_a_no_op_year() {
        let result = reconcile(2025, 1000, 0, Decimal::ZERO, Decimal::new(25, 2)).unwrap();
        assert_eq!(result.experienced_terms, 0);
        assert_eq!(result.hires, 0);
        assert_eq!(result.new_hire_terms, 0);
        assert_eq!(result.active_end, 1000);
    }

    #[test]
    fn post_condition_drift_never_exceeds_one() {
        for w in 900..1100 {
            for term_pct in [5, 8, 12, 20] {
                let terms = round_decimal_to_i64(Decimal::from(w) * Decimal::new(term_pct, 2));
                let result = reconcile(2025, w, terms, Decimal::new(3, 2), Decimal::new(25, 2)).unwrap();
                assert!((result.active_end - result.target_end).abs() <= 1);
            }
        }
    }
}
