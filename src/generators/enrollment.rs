//! Eligibility, enrollment, auto-enrollment window, and enrollment-change
//! generators

use crate::employee::Employee;
use crate::error::SimError;
use crate::events::{
    build_event, CommonFields, EligibilityReason, EnrollmentChangeReason, EnrollmentChangeType,
    EnrollmentSource, Event, EventPayload, WindowAction,
};
use crate::generators::YearContext;
use crate::rng::{u, Stream};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// An employee becomes eligible once both the minimum age and minimum
/// service conditions hold, or immediately if the plan grants immediate
/// eligibility.
pub fn eligibility_date_for(employee: &Employee, ctx: &YearContext) -> Option<NaiveDate> {
    let rules = &ctx.plan_design.eligibility;
    if rules.immediate_eligibility {
        return Some(employee.hire_date);
    }

    let service_date = employee.hire_date + months(rules.minimum_service_months);
    let age_date = birthday_reaching(employee.birth_date, rules.minimum_age);
    Some(service_date.max(age_date))
}

fn months(n: u32) -> Duration {
    Duration::days(30 * n as i64)
}

fn birthday_reaching(birth_date: NaiveDate, age: u32) -> NaiveDate {
    use chrono::Datelike;
    birth_date
        .with_year(birth_date.year() + age as i32)
        .unwrap_or(birth_date)
}

pub fn generate_eligibility_events(
    active: &[&Employee],
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    let mut events = Vec::new();

    for employee in active {
        let Some(eligibility_date) = eligibility_date_for(employee, ctx) else {
            continue;
        };
        if eligibility_date < ctx.year_start || eligibility_date > ctx.year_end {
            continue;
        }

        let payload = EventPayload::Eligibility {
            plan_id: ctx.plan_design.plan_design_id.clone(),
            eligible: true,
            eligibility_date,
            reason: if ctx.plan_design.eligibility.immediate_eligibility {
                EligibilityReason::Immediate
            } else {
                EligibilityReason::AgeAndService
            },
        };
        let common = CommonFields {
            employee_id: employee.employee_id.clone(),
            scenario_id: ctx.scenario_id.to_string(),
            plan_design_id: ctx.plan_design.plan_design_id.clone(),
            source_system: "simulation_engine".to_string(),
            effective_date: eligibility_date,
            correlation_id: None,
            hire_date: employee.hire_date,
            year_end: ctx.year_end,
        };
        events.push(build_event(payload, common, created_at)?);
    }

    Ok(events)
}

/// Auto-enrollment window: opens at eligibility, closes after the
/// configured number of days (default 45).
pub fn generate_auto_enrollment_windows(
    eligibility_events: &[Event],
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    if !ctx.plan_design.auto_enrollment.enabled {
        return Ok(Vec::new());
    }

    let mut events = Vec::new();
    for event in eligibility_events {
        let EventPayload::Eligibility { eligibility_date, .. } = &event.payload else {
            continue;
        };
        let window_start = *eligibility_date;
        let window_end = window_start + Duration::days(ctx.plan_design.auto_enrollment.opt_out_window_days);

        let payload = EventPayload::AutoEnrollmentWindow {
            plan_id: ctx.plan_design.plan_design_id.clone(),
            window_action: WindowAction::Opened,
            window_start_date: window_start,
            window_end_date: window_end,
            window_duration_days: ctx.plan_design.auto_enrollment.opt_out_window_days,
            default_deferral_rate: ctx.plan_design.auto_enrollment.default_deferral_rate,
            eligible_for_proactive: true,
            proactive_window_end: Some(window_end),
        };
        let common = CommonFields {
            employee_id: event.employee_id.clone(),
            scenario_id: ctx.scenario_id.to_string(),
            plan_design_id: ctx.plan_design.plan_design_id.clone(),
            source_system: "simulation_engine".to_string(),
            effective_date: window_start,
            correlation_id: None,
            hire_date: window_start,
            year_end: ctx.year_end,
        };
        events.push(build_event(payload, common, created_at)?);
    }

    Ok(events)
}

/// Demographic-conditioned opt-out probability. Banded by age and income;
/// `base_rate` is adjusted `+age_adjustment` and `+income_adjustment`,
/// clamped to `[0,1]`.
pub fn opt_out_probability(age: u32, annual_compensation: Decimal, base_rate: Decimal) -> Decimal {
    let age_adjustment = if age >= 50 {
        Decimal::new(-5, 2)
    } else if age < 30 {
        Decimal::new(5, 2)
    } else {
        Decimal::ZERO
    };
    let income_adjustment = if annual_compensation >= Decimal::new(120_000_00, 2) {
        Decimal::new(-3, 2)
    } else {
        Decimal::ZERO
    };
    (base_rate + age_adjustment + income_adjustment)
        .max(Decimal::ZERO)
        .min(Decimal::ONE)
}

/// Auto-enroll every eligible, non-proactively-enrolled employee at window
/// close, unless they opt out within the grace period.
pub fn generate_auto_enrollments_and_opt_outs(
    windows: &[Event],
    employees_by_id: &std::collections::HashMap<String, &Employee>,
    opt_out_base_rate: Decimal,
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    let mut events = Vec::new();

    for window in windows {
        let EventPayload::AutoEnrollmentWindow {
            window_start_date,
            window_end_date,
            default_deferral_rate,
            ..
        } = &window.payload
        else {
            continue;
        };

        let Some(employee) = employees_by_id.get(&window.employee_id) else {
            continue;
        };

        let opt_out_draw = u(ctx.scenario_id, ctx.year, Stream::OptOut, &window.employee_id);
        let age = employee.age_years(*window_start_date);
        let p_opt_out = opt_out_probability(age, employee.annual_compensation, opt_out_base_rate);

        if opt_out_draw < p_opt_out.to_f64().unwrap_or(0.0) {
            let payload = EventPayload::EnrollmentChange {
                plan_id: ctx.plan_design.plan_design_id.clone(),
                change_type: EnrollmentChangeType::OptOut,
                change_reason: EnrollmentChangeReason::EmployeeOptOut,
                previous_enrollment_date: Some(*window_start_date),
                new_pre_tax_rate: Decimal::ZERO,
                new_roth_rate: Decimal::ZERO,
                previous_pre_tax_rate: Some(*default_deferral_rate),
                previous_roth_rate: Some(Decimal::ZERO),
                within_opt_out_window: true,
                penalty_applied: false,
            };
            let common = CommonFields {
                employee_id: window.employee_id.clone(),
                scenario_id: ctx.scenario_id.to_string(),
                plan_design_id: ctx.plan_design.plan_design_id.clone(),
                source_system: "simulation_engine".to_string(),
                effective_date: *window_end_date,
                correlation_id: None,
                hire_date: employee.hire_date,
                year_end: ctx.year_end,
            };
            events.push(build_event(payload, common, created_at)?);
            continue;
        }

        let payload = EventPayload::Enrollment {
            plan_id: ctx.plan_design.plan_design_id.clone(),
            enrollment_date: *window_end_date,
            pre_tax_rate: *default_deferral_rate,
            roth_rate: Decimal::ZERO,
            after_tax_rate: Decimal::ZERO,
            auto_enrollment: true,
            opt_out_window_expires: Some(*window_end_date),
            enrollment_source: EnrollmentSource::Auto,
            auto_enrollment_window_start: Some(*window_start_date),
            auto_enrollment_window_end: Some(*window_end_date),
            proactive_enrollment_eligible: false,
            window_timing_compliant: true,
        };
        let common = CommonFields {
            employee_id: window.employee_id.clone(),
            scenario_id: ctx.scenario_id.to_string(),
            plan_design_id: ctx.plan_design.plan_design_id.clone(),
            source_system: "simulation_engine".to_string(),
            effective_date: *window_end_date,
            correlation_id: None,
            hire_date: employee.hire_date,
            year_end: ctx.year_end,
        };
        events.push(build_event(payload, common, created_at)?);
    }

    Ok(events)
}

/// Auto-escalation: each enrolled employee's deferral rate increases by
/// `escalation_rate_step` on the configured effective date, capped at
/// `escalation_cap`, skipping the first `first_escalation_delay_years` after
/// enrollment.
pub fn generate_auto_escalations(
    enrolled: &[(&Employee, Decimal, NaiveDate)],
    first_escalation_delay_years: u32,
    effective_date: NaiveDate,
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    if !ctx.plan_design.auto_enrollment.escalation_enabled {
        return Ok(Vec::new());
    }

    let mut events = Vec::new();
    for (employee, current_rate, enrollment_date) in enrolled {
        let years_enrolled = employee.tenure_years(*enrollment_date).min(employee.tenure_years(effective_date));
        let eligible_years = (effective_date.year() - enrollment_date.year()).max(0) as u32;
        if eligible_years < first_escalation_delay_years {
            continue;
        }
        let _ = years_enrolled;

        let new_rate = (*current_rate + ctx.plan_design.auto_enrollment.escalation_rate_step)
            .min(ctx.plan_design.auto_enrollment.escalation_cap);
        if new_rate <= *current_rate {
            continue;
        }

        let payload = EventPayload::EnrollmentChange {
            plan_id: ctx.plan_design.plan_design_id.clone(),
            change_type: EnrollmentChangeType::RateChange,
            change_reason: EnrollmentChangeReason::PlanAmendment,
            previous_enrollment_date: Some(*enrollment_date),
            new_pre_tax_rate: new_rate,
            new_roth_rate: Decimal::ZERO,
            previous_pre_tax_rate: Some(*current_rate),
            previous_roth_rate: Some(Decimal::ZERO),
            within_opt_out_window: false,
            penalty_applied: false,
        };
        let common = CommonFields {
            employee_id: employee.employee_id.clone(),
            scenario_id: ctx.scenario_id.to_string(),
            plan_design_id: ctx.plan_design.plan_design_id.clone(),
            source_system: "simulation_engine".to_string(),
            effective_date,
            correlation_id: None,
            hire_date: employee.hire_date,
            year_end: ctx.year_end,
        };
        events.push(build_event(payload, common, created_at)?);
    }
    Ok(events)
}

use chrono::Datelike;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn immediate_eligibility_matches_hire_date() {
        let employee = Employee {
            employee_id: "E1".into(),
            hire_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            department: "Engineering".into(),
            level: 3,
            annual_compensation: Decimal::new(100_000_00, 2),
            status: crate::employee::EmploymentStatus::Active,
            termination_date: None,
            termination_reason: None,
        };
        let date = eligibility_date_for(
            &employee,
            &YearContext {
                scenario_id: "S1",
                year: 2025,
                year_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                year_end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
                params: &crate::parameters::EffectiveParameters::default(),
                termination_hazards: &crate::hazards::HazardTable::from_rows(vec![]).unwrap(),
                promotion_hazards: &crate::hazards::HazardTable::from_rows(vec![]).unwrap(),
                plan_design: &crate::scenario::PlanDesign {
                    plan_design_id: "P1".into(),
                    eligibility: crate::scenario::EligibilityRules {
                        minimum_age: 21,
                        minimum_service_months: 0,
                        immediate_eligibility: true,
                    },
                    match_formula: crate::scenario::MatchFormula { tiers: vec![] },
                    nonelective_rate: Decimal::ZERO,
                    vesting_schedule: crate::scenario::VestingSchedule {
                        kind: crate::scenario::VestingScheduleKind::Immediate,
                        entries: vec![],
                    },
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
                },
            },
        );
        assert_eq!(date, Some(employee.hire_date));
    }

    #[test]
    fn opt_out_probability_is_clamped_to_unit_interval() {
        let p = opt_out_probability(22, Decimal::new(50_000_00, 2), Decimal::new(90, 2));
        assert!(p >= Decimal::ZERO && p <= Decimal::ONE);
    }

    fn plan_design_with_window(opt_out_window_days: i64) -> crate::scenario::PlanDesign {
        crate::scenario::PlanDesign {
            plan_design_id: "P1".into(),
            eligibility: crate::scenario::EligibilityRules {
                minimum_age: 21,
                minimum_service_months: 0,
                immediate_eligibility: true,
            },
            match_formula: crate::scenario::MatchFormula { tiers: vec![] },
            nonelective_rate: Decimal::ZERO,
            vesting_schedule: crate::scenario::VestingSchedule {
                kind: crate::scenario::VestingScheduleKind::Immediate,
                entries: vec![],
            },
            auto_enrollment: crate::scenario::AutoEnrollmentConfig {
                enabled: true,
                default_deferral_rate: Decimal::new(3, 2),
                opt_out_window_days,
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
        }
    }

    /// Scenario D: hire 2025-06-01, 45-day auto-enrollment window closes
    /// 2025-07-16; an employee who opts out within the window gets
    /// `within_opt_out_window=true, penalty_applied=false`.
    #[test]
    fn scenario_d_auto_enrollment_window() {
        let employee = Employee {
            employee_id: "E1".into(),
            hire_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            department: "Engineering".into(),
            level: 3,
            annual_compensation: Decimal::new(100_000_00, 2),
            status: crate::employee::EmploymentStatus::Active,
            termination_date: None,
            termination_reason: None,
        };
        let refs = vec![&employee];

        let plan = plan_design_with_window(45);
        let params = crate::parameters::EffectiveParameters::default();
        let term = crate::hazards::HazardTable::from_rows(vec![]).unwrap();
        let promo = crate::hazards::HazardTable::from_rows(vec![]).unwrap();
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
        let created_at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        let eligibility_events = generate_eligibility_events(&refs, &ctx, created_at).unwrap();
        assert_eq!(eligibility_events.len(), 1);

        let windows = generate_auto_enrollment_windows(&eligibility_events, &ctx, created_at).unwrap();
        assert_eq!(windows.len(), 1);
        let EventPayload::AutoEnrollmentWindow { window_end_date, .. } = &windows[0].payload else {
            panic!("expected auto-enrollment window payload");
        };
        assert_eq!(*window_end_date, NaiveDate::from_ymd_opt(2025, 7, 16).unwrap());

        // opt_out_base_rate of 1.0 clamps to certainty, forcing the
        // opt-out branch deterministically regardless of the RNG draw.
        let mut employees_by_id = std::collections::HashMap::new();
        employees_by_id.insert(employee.employee_id.clone(), &employee);
        let changes = generate_auto_enrollments_and_opt_outs(
            &windows,
            &employees_by_id,
            Decimal::ONE,
            &ctx,
            created_at,
        )
        .unwrap();

        assert_eq!(changes.len(), 1);
        let EventPayload::EnrollmentChange {
            change_type,
            within_opt_out_window,
            penalty_applied,
            ..
        } = &changes[0].payload
        else {
            panic!("expected enrollment-change payload");
        };
        assert_eq!(*change_type, EnrollmentChangeType::OptOut);
        assert!(*within_opt_out_window);
        assert!(!*penalty_applied);
    }
}
