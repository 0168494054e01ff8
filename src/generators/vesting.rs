//! Vesting and forfeiture generators
//!
//! Vesting is a deterministic evaluation of the plan's schedule against
//! service at period end. On termination before full vesting, unvested
//! employer-source balances are forfeited (Invariant 4: employee
//! contributions are always 100% vested).

use crate::accumulators::ContributionState;
use crate::employee::Employee;
use crate::error::SimError;
use crate::events::{build_event, CommonFields, Event, EventPayload, ForfeitureReason, VestingScheduleType};
use crate::generators::YearContext;
use crate::scenario::{VestingSchedule, VestingScheduleKind};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

fn schedule_type_of(kind: VestingScheduleKind) -> VestingScheduleType {
    match kind {
        VestingScheduleKind::Immediate => VestingScheduleType::Immediate,
        VestingScheduleKind::Cliff => VestingScheduleType::Cliff,
        VestingScheduleKind::Graded => VestingScheduleType::Graded,
    }
}

pub fn generate_vesting_events(
    active: &[&Employee],
    schedule: &VestingSchedule,
    period_end: NaiveDate,
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    let mut events = Vec::with_capacity(active.len());

    for employee in active {
        let tenure = employee.tenure_years(period_end);
        let vested_percentage = schedule.vested_percentage_at(tenure);

        let payload = EventPayload::Vesting {
            plan_id: ctx.plan_design.plan_design_id.clone(),
            vested_percentage,
            source_balances_vested: HashMap::new(),
            vesting_schedule_type: schedule_type_of(schedule.kind),
            service_computation_date: employee.hire_date,
            service_credited_hours: Decimal::new(2080, 0),
            service_period_end_date: period_end,
        };
        let common = CommonFields {
            employee_id: employee.employee_id.clone(),
            scenario_id: ctx.scenario_id.to_string(),
            plan_design_id: ctx.plan_design.plan_design_id.clone(),
            source_system: "simulation_engine".to_string(),
            effective_date: period_end,
            correlation_id: None,
            hire_date: employee.hire_date,
            year_end: ctx.year_end,
        };
        events.push(build_event(payload, common, created_at)?);
    }

    Ok(events)
}

/// On termination, forfeit each employer-source balance by
/// `(1 - vested_percentage)`. Employee sources are never touched
/// (Invariant 4).
pub fn generate_forfeitures(
    terminated_employee: &Employee,
    vested_percentage: Decimal,
    employer_balances: &ContributionState,
    termination_date: NaiveDate,
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    if vested_percentage >= Decimal::ONE {
        return Ok(Vec::new());
    }

    let forfeiture_fraction = Decimal::ONE - vested_percentage;
    let mut events = Vec::new();

    for (source, balance) in &employer_balances.ytd_by_source {
        if !source.is_employer_source() {
            continue;
        }
        let amount = *balance * forfeiture_fraction;
        if amount <= Decimal::ZERO {
            continue;
        }

        let payload = EventPayload::Forfeiture {
            plan_id: ctx.plan_design.plan_design_id.clone(),
            forfeited_from_source: *source,
            amount,
            reason: ForfeitureReason::UnvestedTermination,
            vested_percentage,
        };
        let common = CommonFields {
            employee_id: terminated_employee.employee_id.clone(),
            scenario_id: ctx.scenario_id.to_string(),
            plan_design_id: ctx.plan_design.plan_design_id.clone(),
            source_system: "simulation_engine".to_string(),
            effective_date: termination_date,
            correlation_id: None,
            hire_date: terminated_employee.hire_date,
            year_end: ctx.year_end,
        };
        events.push(build_event(payload, common, created_at)?);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ContributionSource;
    use crate::scenario::VestingScheduleEntry;
    use chrono::TimeZone;

    fn graded_six_year_schedule() -> VestingSchedule {
        VestingSchedule {
            kind: VestingScheduleKind::Graded,
            entries: vec![
                VestingScheduleEntry { years_of_service: 0, vested_percentage: Decimal::ZERO },
                VestingScheduleEntry { years_of_service: 2, vested_percentage: Decimal::new(20, 2) },
                VestingScheduleEntry { years_of_service: 3, vested_percentage: Decimal::new(40, 2) },
                VestingScheduleEntry { years_of_service: 4, vested_percentage: Decimal::new(60, 2) },
                VestingScheduleEntry { years_of_service: 5, vested_percentage: Decimal::new(80, 2) },
                VestingScheduleEntry { years_of_service: 6, vested_percentage: Decimal::ONE },
            ],
        }
    }

    /// Spec scenario E.
    #[test]
    fn scenario_e_vesting_and_forfeiture() {
        let schedule = graded_six_year_schedule();
        let employee = Employee {
            employee_id: "E1".into(),
            hire_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            department: "Engineering".into(),
            level: 3,
            annual_compensation: Decimal::new(100_000_00, 2),
            status: crate::employee::EmploymentStatus::Terminated,
            termination_date: Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            termination_reason: None,
        };

        let tenure = employee.tenure_years(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(tenure, 2);
        let vested = schedule.vested_percentage_at(tenure);
        assert_eq!(vested, Decimal::new(20, 2));

        let mut balances = ContributionState::default();
        balances.ytd_by_source.insert(ContributionSource::EmployerMatch, Decimal::new(10_000_00, 2));

        let plan = crate::scenario::PlanDesign {
            plan_design_id: "P1".into(),
            eligibility: crate::scenario::EligibilityRules { minimum_age: 21, minimum_service_months: 0, immediate_eligibility: true },
            match_formula: crate::scenario::MatchFormula { tiers: vec![] },
            nonelective_rate: Decimal::ZERO,
            vesting_schedule: schedule.clone(),
            auto_enrollment: crate::scenario::AutoEnrollmentConfig {
                enabled: true,
                default_deferral_rate: Decimal::new(3, 2),
                opt_out_window_days: 45,
                escalation_enabled: true,
                escalation_rate_step: Decimal::new(1, 2),
                escalation_cap: Decimal::new(10, 2),
            },
            irs_deferral_limit: Decimal::new(23000, 0),
            irs_catch_up_limit: Decimal::new(7500, 0),
            irs_catch_up_age: 50,
            irs_annual_additions_limit: Decimal::new(69000, 0),
            irs_compensation_limit: Decimal::new(345000, 0),
            hce_compensation_threshold: Decimal::new(155000, 0),
        };
        let params = crate::parameters::EffectiveParameters::default();
        let term_table = crate::hazards::HazardTable::from_rows(vec![]).unwrap();
        let promo_table = crate::hazards::HazardTable::from_rows(vec![]).unwrap();
        let ctx = YearContext {
            scenario_id: "S1",
            year: 2025,
            year_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            year_end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            params: &params,
            termination_hazards: &term_table,
            promotion_hazards: &promo_table,
            plan_design: &plan,
        };

        let created_at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let forfeitures = generate_forfeitures(
            &employee,
            vested,
            &balances,
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            &ctx,
            created_at,
        )
        .unwrap();

        assert_eq!(forfeitures.len(), 1);
        if let EventPayload::Forfeiture { amount, .. } = &forfeitures[0].payload {
            assert_eq!(*amount, Decimal::new(8_000_00, 2));
        } else {
            panic!("expected forfeiture payload");
        }
    }
}
