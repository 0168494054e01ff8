//! Hire and new-hire-termination generators

use crate::error::SimError;
use crate::events::{build_event, CommonFields, Event, EventPayload};
use crate::generators::{date_within_range, date_within_year, YearContext};
use crate::rng::{u, Stream};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Categorical department distribution, e.g. `{"Engineering": 0.4, "Sales": 0.35, ...}`.
#[derive(Debug, Clone)]
pub struct DepartmentDistribution {
    pub weights: Vec<(String, Decimal)>,
}

impl DepartmentDistribution {
    fn sample(&self, draw: f64) -> &str {
        let total: Decimal = self.weights.iter().map(|(_, w)| *w).sum();
        let target = Decimal::try_from(draw).unwrap_or(Decimal::ZERO) * total;
        let mut cumulative = Decimal::ZERO;
        for (name, weight) in &self.weights {
            cumulative += *weight;
            if target <= cumulative {
                return name;
            }
        }
        self.weights.last().map(|(n, _)| n.as_str()).unwrap_or("Unassigned")
    }
}

/// Job-level percentile overrides for new hires: fraction of hires assigned
/// to each level, cumulative same as `DepartmentDistribution`.
#[derive(Debug, Clone)]
pub struct JobLevelDistribution {
    pub weights: Vec<(u8, Decimal)>,
}

impl JobLevelDistribution {
    fn sample(&self, draw: f64) -> u8 {
        let total: Decimal = self.weights.iter().map(|(_, w)| *w).sum();
        let target = Decimal::try_from(draw).unwrap_or(Decimal::ZERO) * total;
        let mut cumulative = Decimal::ZERO;
        for (level, weight) in &self.weights {
            cumulative += *weight;
            if target <= cumulative {
                return *level;
            }
        }
        self.weights.last().map(|(l, _)| *l).unwrap_or(1)
    }
}

/// New-hire compensation strategy.
#[derive(Debug, Clone)]
pub enum NewHireCompensationStrategy {
    Percentile {
        band_floor_by_level: HashMap<u8, Decimal>,
        band_ceiling_by_level: HashMap<u8, Decimal>,
        new_hire_salary_adjustment: Decimal,
    },
    Fixed {
        amount_by_level: HashMap<u8, Decimal>,
    },
}

impl NewHireCompensationStrategy {
    fn compensation_for(&self, level: u8, percentile_draw: f64) -> Decimal {
        match self {
            NewHireCompensationStrategy::Percentile {
                band_floor_by_level,
                band_ceiling_by_level,
                new_hire_salary_adjustment,
            } => {
                let floor = band_floor_by_level.get(&level).copied().unwrap_or(Decimal::ZERO);
                let ceiling = band_ceiling_by_level.get(&level).copied().unwrap_or(floor);
                let pct = Decimal::try_from(percentile_draw).unwrap_or(Decimal::ZERO);
                let base = floor + (ceiling - floor) * pct;
                base * (Decimal::ONE + new_hire_salary_adjustment)
            }
            NewHireCompensationStrategy::Fixed { amount_by_level } => {
                amount_by_level.get(&level).copied().unwrap_or(Decimal::ZERO)
            }
        }
    }
}

/// Build exactly `hire_count` hire events for the year.
#[allow(clippy::too_many_arguments)]
pub fn generate_hires(
    hire_count: i64,
    ctx: &YearContext,
    departments: &DepartmentDistribution,
    job_levels: &JobLevelDistribution,
    compensation: &NewHireCompensationStrategy,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    let mut events = Vec::with_capacity(hire_count.max(0) as usize);

    for i in 0..hire_count.max(0) {
        let synthetic_id = format!("HIRE-{}-{}", ctx.year, i);

        let hire_date = date_within_year(ctx, u(ctx.scenario_id, ctx.year, Stream::HireDate, &synthetic_id));
        let department = departments
            .sample(u(ctx.scenario_id, ctx.year, Stream::HireDepartment, &synthetic_id))
            .to_string();
        let job_level = job_levels.sample(u(ctx.scenario_id, ctx.year, Stream::HireJobLevel, &synthetic_id));
        let annual_compensation = compensation.compensation_for(
            job_level,
            u(ctx.scenario_id, ctx.year, Stream::HireCompensation, &synthetic_id),
        );

        let payload = EventPayload::Hire {
            plan_id: None,
            hire_date,
            department,
            job_level,
            annual_compensation,
        };
        let common = CommonFields {
            employee_id: synthetic_id,
            scenario_id: ctx.scenario_id.to_string(),
            plan_design_id: ctx.plan_design.plan_design_id.clone(),
            source_system: "simulation_engine".to_string(),
            effective_date: hire_date,
            correlation_id: None,
            hire_date,
            year_end: ctx.year_end,
        };
        events.push(build_event(payload, common, created_at)?);
    }

    Ok(events)
}

/// Select `nh_term_count` hires for new-hire termination, by smallest
/// `u(nh_term_selection)`, and emit their termination events.
pub fn generate_new_hire_terminations(
    hires: &[Event],
    nh_term_count: i64,
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    let mut ranked: Vec<(f64, &Event)> = hires
        .iter()
        .map(|e| {
            (
                u(ctx.scenario_id, ctx.year, Stream::NewHireTerminationSelection, &e.employee_id),
                e,
            )
        })
        .collect();
    ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then_with(|| a.1.employee_id.cmp(&b.1.employee_id)));

    let mut events = Vec::with_capacity(nh_term_count.max(0) as usize);
    for (_, hire_event) in ranked.into_iter().take(nh_term_count.max(0) as usize) {
        let hire_date = match &hire_event.payload {
            EventPayload::Hire { hire_date, .. } => *hire_date,
            _ => unreachable!("new-hire termination selection only draws from hire events"),
        };
        let draw = u(ctx.scenario_id, ctx.year, Stream::NewHireTerminationDate, &hire_event.employee_id);
        let window_start = hire_date + chrono::Duration::days(1);
        let effective_date = if window_start > ctx.year_end {
            ctx.year_end
        } else {
            date_within_range(window_start, ctx.year_end, draw)
        };

        let payload = EventPayload::Termination {
            plan_id: None,
            reason: crate::events::TerminationReason::Involuntary,
            final_pay_date: effective_date,
        };
        let common = CommonFields {
            employee_id: hire_event.employee_id.clone(),
            scenario_id: ctx.scenario_id.to_string(),
            plan_design_id: ctx.plan_design.plan_design_id.clone(),
            source_system: "simulation_engine".to_string(),
            effective_date,
            correlation_id: None,
            hire_date,
            year_end: ctx.year_end,
        };
        events.push(build_event(payload, common, created_at)?);
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazards::HazardTable;
    use crate::parameters::EffectiveParameters;
    use crate::scenario::{AutoEnrollmentConfig, EligibilityRules, MatchFormula, PlanDesign, VestingSchedule, VestingScheduleKind};
    use chrono::{NaiveDate, TimeZone};

    fn ctx<'a>(params: &'a EffectiveParameters, term: &'a HazardTable, promo: &'a HazardTable, plan: &'a PlanDesign) -> YearContext<'a> {
        YearContext {
            scenario_id: "S1",
            year: 2025,
            year_start: NaiveDate::parse_from_str("2025-01-01", "%Y-%m-%d").unwrap(),
            year_end: NaiveDate::parse_from_str("2025-12-31", "%Y-%m-%d").unwrap(),
            params,
            termination_hazards: term,
            promotion_hazards: promo,
            plan_design: plan,
        }
    }

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

    #[test]
    fn generates_exactly_requested_hire_count() {
        let params = EffectiveParameters::default();
        let term = HazardTable::from_rows(vec![]).unwrap();
        let promo = HazardTable::from_rows(vec![]).unwrap();
        let plan = plan_design();
        let c = ctx(&params, &term, &promo, &plan);

        let departments = DepartmentDistribution { weights: vec![("Engineering".into(), Decimal::ONE)] };
        let levels = JobLevelDistribution { weights: vec![(1, Decimal::ONE)] };
        let mut floor = HashMap::new();
        floor.insert(1u8, Decimal::new(60_000_00, 2));
        let mut ceiling = HashMap::new();
        ceiling.insert(1u8, Decimal::new(80_000_00, 2));
        let comp = NewHireCompensationStrategy::Percentile {
            band_floor_by_level: floor,
            band_ceiling_by_level: ceiling,
            new_hire_salary_adjustment: Decimal::ZERO,
        };

        let created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let hires = generate_hires(200, &c, &departments, &levels, &comp, created_at).unwrap();
        assert_eq!(hires.len(), 200);
    }

    #[test]
    fn new_hire_termination_dates_follow_hire_date() {
        let params = EffectiveParameters::default();
        let term = HazardTable::from_rows(vec![]).unwrap();
        let promo = HazardTable::from_rows(vec![]).unwrap();
        let plan = plan_design();
        let c = ctx(&params, &term, &promo, &plan);

        let departments = DepartmentDistribution { weights: vec![("Engineering".into(), Decimal::ONE)] };
        let levels = JobLevelDistribution { weights: vec![(1, Decimal::ONE)] };
        let comp = NewHireCompensationStrategy::Fixed { amount_by_level: HashMap::from([(1u8, Decimal::new(70_000_00, 2))]) };

        let created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let hires = generate_hires(50, &c, &departments, &levels, &comp, created_at).unwrap();
        let terms = generate_new_hire_terminations(&hires, 12, &c, created_at).unwrap();
        assert_eq!(terms.len(), 12);

        for term_event in &terms {
            let hire = hires.iter().find(|h| h.employee_id == term_event.employee_id).unwrap();
            let (hire_date, term_date) = match (&hire.payload, &term_event.payload) {
                (EventPayload::Hire { hire_date, .. }, EventPayload::Termination { final_pay_date, .. }) => {
                    (*hire_date, *final_pay_date)
                }
                _ => panic!("unexpected payload shapes"),
            };
            assert!(term_date >= hire_date);
        }
    }
}
