//! Experienced termination generator
//!
//! Hybrid deterministic count: `target = round(band_size * base_rate(band))`
//! per hazard band; the `target` smallest `u(termination_selection)` draws
//! within the band are selected, ties broken by employee_id ascending. No
//! probabilistic `draw < p` filtering — counts are exact to the rounded
//! target, favoring determinism over per-row coin flips.

use crate::employee::Employee;
use crate::error::SimError;
use crate::events::{build_event, CommonFields, EventPayload, TerminationReason};
use crate::generators::{date_within_year, YearContext};
use crate::rng::{u, Stream};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// The employee ids selected for experienced termination this year, already
/// resolved to dates; the orchestrator turns these into events and feeds the
/// count into growth reconciliation (4.H).
pub struct TerminationSelection {
    pub employee_ids: Vec<String>,
}

pub fn select_experienced_terminations(
    active: &[&Employee],
    ctx: &YearContext,
) -> Result<TerminationSelection, SimError> {
    let mut by_band: HashMap<(u8, String, String), Vec<&Employee>> = HashMap::new();

    for employee in active {
        let age = employee.age_years(ctx.year_start);
        let tenure = employee.tenure_years(ctx.year_start);
        let rate = ctx
            .termination_hazards
            .rate_for(employee.level, age, tenure)?;
        let band = (
            employee.level,
            crate::hazards::AgeBand::from_age(age).as_str().to_string(),
            crate::hazards::TenureBand::from_tenure(tenure).as_str().to_string(),
        );
        let _ = rate;
        by_band.entry(band).or_default().push(employee);
    }

    let mut selected = Vec::new();

    for (band, members) in &by_band {
        let (level, _, _) = band;
        let sample_age = members[0].age_years(ctx.year_start);
        let sample_tenure = members[0].tenure_years(ctx.year_start);
        let rate = ctx
            .termination_hazards
            .rate_for(*level, sample_age, sample_tenure)?;
        let target = (Decimal::from(members.len() as i64) * rate)
            .round()
            .to_i64()
            .unwrap_or(0)
            .max(0) as usize;

        let mut ranked: Vec<(f64, &str)> = members
            .iter()
            .map(|e| {
                (
                    u(ctx.scenario_id, ctx.year, Stream::TerminationSelection, &e.employee_id),
                    e.employee_id.as_str(),
                )
            })
            .collect();
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then_with(|| a.1.cmp(b.1)));

        for (_, employee_id) in ranked.into_iter().take(target) {
            selected.push(employee_id.to_string());
        }
    }

    selected.sort();
    Ok(TerminationSelection { employee_ids: selected })
}

/// Build the actual termination events for a resolved selection.
pub fn build_termination_events(
    selection: &TerminationSelection,
    employees_by_id: &HashMap<String, &Employee>,
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<crate::events::Event>, SimError> {
    let mut events = Vec::with_capacity(selection.employee_ids.len());
    for employee_id in &selection.employee_ids {
        let employee = employees_by_id
            .get(employee_id)
            .expect("selected employee exists in active set");
        let draw = u(ctx.scenario_id, ctx.year, Stream::TerminationDate, employee_id);
        let effective_date = date_within_year(ctx, draw);

        let payload = EventPayload::Termination {
            plan_id: None,
            reason: TerminationReason::Involuntary,
            final_pay_date: effective_date,
        };
        let common = CommonFields {
            employee_id: employee_id.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazards::{AgeBand, HazardTable, TenureBand};
    use crate::parameters::EffectiveParameters;
    use crate::scenario::{AutoEnrollmentConfig, EligibilityRules, MatchFormula, PlanDesign, VestingSchedule, VestingScheduleKind};
    use chrono::NaiveDate;

    fn plan_design() -> PlanDesign {
        PlanDesign {
            plan_design_id: "P1".into(),
            eligibility: EligibilityRules { minimum_age: 21, minimum_service_months: 12, immediate_eligibility: false },
            match_formula: MatchFormula { tiers: vec![] },
            nonelective_rate: Decimal::ZERO,
            vesting_schedule: VestingSchedule { kind: VestingScheduleKind::Graded, entries: vec![] },
            auto_enrollment: AutoEnrollmentConfig {
                enabled: true,
                default_deferral_rate: Decimal::new(3, 2),
                opt_out_window_days: 30,
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

    fn employee(id: &str, level: u8, hire: &str, birth: &str) -> Employee {
        Employee {
            employee_id: id.to_string(),
            hire_date: NaiveDate::parse_from_str(hire, "%Y-%m-%d").unwrap(),
            birth_date: NaiveDate::parse_from_str(birth, "%Y-%m-%d").unwrap(),
            department: "Engineering".into(),
            level,
            annual_compensation: Decimal::new(90_000_00, 2),
            status: crate::employee::EmploymentStatus::Active,
            termination_date: None,
            termination_reason: None,
        }
    }

    #[test]
    fn selection_count_matches_rounded_band_target() {
        let employees: Vec<Employee> = (0..100)
            .map(|i| employee(&format!("E{i}"), 3, "2015-01-01", "1985-01-01"))
            .collect();
        let refs: Vec<&Employee> = employees.iter().collect();

        let age_band = AgeBand::from_age(40);
        let tenure_band = TenureBand::from_tenure(10);
        let table = HazardTable::from_rows(vec![(3, age_band, tenure_band, Decimal::new(12, 2))]).unwrap();
        let promo_table = HazardTable::from_rows(vec![]).unwrap();
        let params = EffectiveParameters::default();
        let plan = plan_design();

        let ctx = YearContext {
            scenario_id: "S1",
            year: 2025,
            year_start: NaiveDate::parse_from_str("2025-01-01", "%Y-%m-%d").unwrap(),
            year_end: NaiveDate::parse_from_str("2025-12-31", "%Y-%m-%d").unwrap(),
            params: &params,
            termination_hazards: &table,
            promotion_hazards: &promo_table,
            plan_design: &plan,
        };

        let selection = select_experienced_terminations(&refs, &ctx).unwrap();
        assert_eq!(selection.employee_ids.len(), 12);
    }
}
