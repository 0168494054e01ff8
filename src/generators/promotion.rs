//! Promotion generator
//!
//! For each employee at year start, draw `u(promotion)`; promote if
//! `u < promotion_hazard(level, age, tenure)` and `level < 10`.

use crate::employee::Employee;
use crate::error::SimError;
use crate::events::{build_event, CommonFields, Event, EventPayload};
use crate::generators::{date_within_year, YearContext};
use crate::rng::{u, Stream};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const MAX_JOB_LEVEL: u8 = 10;

pub struct PromotionConfig {
    pub base_increase: Decimal,
    pub jitter_range: Decimal,
    pub max_cap_pct: Decimal,
    pub max_cap_amount: Decimal,
}

pub fn generate_promotions(
    active: &[&Employee],
    config: &PromotionConfig,
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    let mut events = Vec::new();

    for employee in active {
        if employee.level >= MAX_JOB_LEVEL {
            continue;
        }
        let age = employee.age_years(ctx.year_start);
        let tenure = employee.tenure_years(ctx.year_start);
        let hazard = ctx.promotion_hazards.rate_for(employee.level, age, tenure)?;

        let draw = u(ctx.scenario_id, ctx.year, Stream::PromotionDraw, &employee.employee_id);
        if draw >= hazard.to_f64().unwrap_or(1.0) {
            continue;
        }

        let jitter_draw = u(ctx.scenario_id, ctx.year, Stream::PromotionJitter, &employee.employee_id);
        let centered = (Decimal::try_from(jitter_draw).unwrap_or(Decimal::ZERO) - Decimal::new(5, 1))
            * Decimal::TWO
            * config.jitter_range;

        let mut raw_increase = config.base_increase + centered;
        let cap = config.max_cap_pct;
        if raw_increase > cap {
            raw_increase = cap;
        }

        let mut new_compensation = employee.annual_compensation * (Decimal::ONE + raw_increase);
        let amount_increase = new_compensation - employee.annual_compensation;
        if amount_increase > config.max_cap_amount {
            new_compensation = employee.annual_compensation + config.max_cap_amount;
        }

        let effective_date_draw = u(ctx.scenario_id, ctx.year, Stream::PromotionEffectiveDate, &employee.employee_id);
        let effective_date = date_within_year(ctx, effective_date_draw);

        let payload = EventPayload::Promotion {
            plan_id: None,
            new_job_level: employee.level + 1,
            new_annual_compensation: new_compensation,
            effective_date,
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
