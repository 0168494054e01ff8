//! Contribution generator
//!
//! Per pay period: employee contribution = deferral rate × eligible
//! compensation, capped by IRS 402(g)/414(v) limits; employer match per the
//! plan's formula; employer annual-additions capped by 415(c).

use crate::accumulators::ContributionState;
use crate::employee::Employee;
use crate::error::SimError;
use crate::events::{build_event, CommonFields, ContributionSource, Event, EventPayload};
use crate::generators::YearContext;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// One pay-period contribution instruction for an enrolled, eligible
/// employee: deferral rates plus the pay period's eligible compensation.
pub struct PayPeriodInput<'a> {
    pub employee: &'a Employee,
    pub pre_tax_rate: Decimal,
    pub roth_rate: Decimal,
    pub eligible_compensation: Decimal,
    pub pay_period_end: NaiveDate,
    pub payroll_id: String,
}

fn catch_up_eligible(employee: &Employee, irs_catch_up_age: u32, as_of: NaiveDate) -> bool {
    employee.age_years(as_of) >= irs_catch_up_age
}

/// Generate the employee pre-tax/roth deferral plus employer match
/// contribution events for one pay period, honoring 402(g)/414(v)/415(c).
pub fn generate_pay_period_contributions(
    inputs: &[PayPeriodInput],
    ytd: &std::collections::HashMap<String, ContributionState>,
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    let mut events = Vec::new();
    let plan = ctx.plan_design;

    for input in inputs {
        let employee = input.employee;
        let state = ytd.get(&employee.employee_id).cloned().unwrap_or_default();

        let deferral_limit = if catch_up_eligible(employee, plan.irs_catch_up_age, input.pay_period_end) {
            plan.irs_deferral_limit + plan.irs_catch_up_limit
        } else {
            plan.irs_deferral_limit
        };

        let requested = input.eligible_compensation * (input.pre_tax_rate + input.roth_rate);
        let employee_ytd = state.employee_ytd_total();
        let remaining_room = (deferral_limit - employee_ytd).max(Decimal::ZERO);
        let applied = requested.min(remaining_room);
        let irs_limit_applied = applied < requested;

        if applied > Decimal::ZERO {
            let pre_tax_share = if input.pre_tax_rate + input.roth_rate > Decimal::ZERO {
                applied * input.pre_tax_rate / (input.pre_tax_rate + input.roth_rate)
            } else {
                Decimal::ZERO
            };
            let roth_share = applied - pre_tax_share;

            if pre_tax_share > Decimal::ZERO {
                events.push(contribution_event(
                    employee,
                    ContributionSource::EmployeePreTax,
                    pre_tax_share,
                    input,
                    employee_ytd + pre_tax_share,
                    irs_limit_applied,
                    ctx,
                    created_at,
                )?);
            }
            if roth_share > Decimal::ZERO {
                events.push(contribution_event(
                    employee,
                    ContributionSource::EmployeeRoth,
                    roth_share,
                    input,
                    employee_ytd + pre_tax_share + roth_share,
                    irs_limit_applied,
                    ctx,
                    created_at,
                )?);
            }
        }

        let match_rate = plan.match_formula.match_rate_for(input.pre_tax_rate + input.roth_rate);
        let employer_match = input.eligible_compensation * match_rate;
        if employer_match > Decimal::ZERO {
            // `applied` is this period's own employee contribution, not yet
            // folded into `state` (the orchestrator only accumulates events
            // after this whole call returns), so it has to be subtracted by
            // hand or the match gets sized against room that doesn't yet
            // account for the deferral it's being paired with.
            let annual_additions_room =
                (plan.irs_annual_additions_limit - state.ytd_total() - applied).max(Decimal::ZERO);
            let applied_match = employer_match.min(annual_additions_room);
            let match_limited = applied_match < employer_match;
            if applied_match > Decimal::ZERO {
                events.push(contribution_event(
                    employee,
                    ContributionSource::EmployerMatch,
                    applied_match,
                    input,
                    state.ytd_by_source.get(&ContributionSource::EmployerMatch).copied().unwrap_or(Decimal::ZERO) + applied_match,
                    match_limited,
                    ctx,
                    created_at,
                )?);
            }
        }
    }

    Ok(events)
}

#[allow(clippy::too_many_arguments)]
fn contribution_event(
    employee: &Employee,
    source: ContributionSource,
    amount: Decimal,
    input: &PayPeriodInput,
    ytd_amount: Decimal,
    irs_limit_applied: bool,
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Event, SimError> {
    let payload = EventPayload::Contribution {
        plan_id: ctx.plan_design.plan_design_id.clone(),
        source,
        amount,
        pay_period_end: input.pay_period_end,
        contribution_date: input.pay_period_end,
        ytd_amount,
        payroll_id: input.payroll_id.clone(),
        irs_limit_applied,
        inferred_value: false,
    };
    let common = CommonFields {
        employee_id: employee.employee_id.clone(),
        scenario_id: ctx.scenario_id.to_string(),
        plan_design_id: ctx.plan_design.plan_design_id.clone(),
        source_system: "simulation_engine".to_string(),
        effective_date: input.pay_period_end,
        correlation_id: None,
        hire_date: employee.hire_date,
        year_end: ctx.year_end,
    };
    build_event(payload, common, created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazards::HazardTable;
    use crate::parameters::EffectiveParameters;
    use crate::scenario::{AutoEnrollmentConfig, EligibilityRules, MatchFormula, MatchTier, PlanDesign, VestingSchedule, VestingScheduleKind};
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn plan_design() -> PlanDesign {
        PlanDesign {
            plan_design_id: "P1".into(),
            eligibility: EligibilityRules { minimum_age: 21, minimum_service_months: 0, immediate_eligibility: true },
            match_formula: MatchFormula { tiers: vec![MatchTier { deferral_rate_up_to: Decimal::new(3, 2), match_rate: Decimal::ONE }] },
            nonelective_rate: Decimal::ZERO,
            vesting_schedule: VestingSchedule { kind: VestingScheduleKind::Immediate, entries: vec![] },
            auto_enrollment: AutoEnrollmentConfig {
                enabled: true,
                default_deferral_rate: Decimal::new(3, 2),
                opt_out_window_days: 45,
                escalation_enabled: true,
                escalation_rate_step: Decimal::new(1, 2),
                escalation_cap: Decimal::new(10, 2),
            },
            irs_deferral_limit: Decimal::new(23000_00, 2),
            irs_catch_up_limit: Decimal::new(7500_00, 2),
            irs_catch_up_age: 50,
            irs_annual_additions_limit: Decimal::new(69000_00, 2),
            irs_compensation_limit: Decimal::new(345000_00, 2),
            hce_compensation_threshold: Decimal::new(155000_00, 2),
        }
    }

    #[test]
    fn employee_deferral_caps_at_402g_limit() {
        let employee = Employee {
            employee_id: "E1".into(),
            hire_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            birth_date: NaiveDate::from_ymd_opt(1985, 1, 1).unwrap(),
            department: "Engineering".into(),
            level: 3,
            annual_compensation: Decimal::new(500_000_00, 2),
            status: crate::employee::EmploymentStatus::Active,
            termination_date: None,
            termination_reason: None,
        };

        let plan = plan_design();
        let params = EffectiveParameters::default();
        let term = HazardTable::from_rows(vec![]).unwrap();
        let promo = HazardTable::from_rows(vec![]).unwrap();
        let ctx = YearContext {
            scenario_id: "S1",
            year: 2025,
            year_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            year_end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            params: &params,
            termination_hazards: &term,
            promotion_hazards: &promo,
            plan_design: &plan,
        };

        let mut ytd = HashMap::new();
        let mut state = ContributionState::default();
        state.ytd_by_source.insert(ContributionSource::EmployeePreTax, Decimal::new(22900_00, 2));
        ytd.insert("E1".to_string(), state);

        let input = PayPeriodInput {
            employee: &employee,
            pre_tax_rate: Decimal::new(10, 2),
            roth_rate: Decimal::ZERO,
            eligible_compensation: Decimal::new(40_000_00, 2),
            pay_period_end: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            payroll_id: "PP12".into(),
        };

        let created_at = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        let events = generate_pay_period_contributions(&[input], &ytd, &ctx, created_at).unwrap();

        let pre_tax = events.iter().find(|e| matches!(&e.payload, EventPayload::Contribution { source: ContributionSource::EmployeePreTax, .. }));
        let pre_tax = pre_tax.expect("pre-tax contribution event present");
        if let EventPayload::Contribution { amount, irs_limit_applied, .. } = &pre_tax.payload {
            assert_eq!(*amount, Decimal::new(100_00, 2));
            assert!(*irs_limit_applied);
        }
    }
}
