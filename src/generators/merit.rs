//! Merit (raise) generator
//!
//! `new_comp = prior * (1 + merit_rate(level) + cola_rate)`. Effective date
//! depends on the configured methodology: `legacy` (regression parity only)
//! or `realistic` (inverse-CDF month sampling, default for new scenarios).

use crate::employee::Employee;
use crate::error::SimError;
use crate::events::{build_event, CommonFields, Event, EventPayload};
use crate::generators::YearContext;
use crate::rng::{u, Stream};
use chrono::{Datelike, DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseTimingMethodology {
    /// Deterministic regression-parity tie-break: `len(employee_id)` even →
    /// Jan 1, else Jul 1. Kept only behind this flag, never the default.
    Legacy,
    Realistic,
}

/// A 12-bucket month distribution for `realistic` timing, e.g.
/// `{1: 0.10, 2: 0.05, ...}` summing to 1.
#[derive(Debug, Clone)]
pub struct MonthDistribution {
    pub weights: [Decimal; 12],
}

impl MonthDistribution {
    fn sample_month(&self, draw: f64) -> u32 {
        let total: Decimal = self.weights.iter().copied().sum();
        let target = Decimal::try_from(draw).unwrap_or(Decimal::ZERO) * total;
        let mut cumulative = Decimal::ZERO;
        for (idx, weight) in self.weights.iter().enumerate() {
            cumulative += *weight;
            if target <= cumulative {
                return (idx + 1) as u32;
            }
        }
        12
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .unwrap();
    let this = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    (next - this).num_days() as u32
}

fn legacy_effective_date(employee_id: &str, year: i32) -> NaiveDate {
    if employee_id.len() % 2 == 0 {
        NaiveDate::from_ymd_opt(year, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, 7, 1).unwrap()
    }
}

fn realistic_effective_date(
    scenario_id: &str,
    year: i32,
    employee_id: &str,
    distribution: &MonthDistribution,
) -> NaiveDate {
    let month_draw = u(scenario_id, year, Stream::RaiseMonth, employee_id);
    let month = distribution.sample_month(month_draw);
    let day_draw = u(scenario_id, year, Stream::RaiseDay, employee_id);
    let days = days_in_month(year, month);
    let day = (((days as f64) * day_draw).floor() as u32 + 1).min(days);
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn generate_merit_raises(
    active: &[&Employee],
    merit_rate_by_level: &HashMap<u8, Decimal>,
    cola_rate: Decimal,
    methodology: RaiseTimingMethodology,
    month_distribution: &MonthDistribution,
    ctx: &YearContext,
    created_at: DateTime<Utc>,
) -> Result<Vec<Event>, SimError> {
    let mut events = Vec::with_capacity(active.len());

    for employee in active {
        let merit_rate = merit_rate_by_level.get(&employee.level).copied().unwrap_or(Decimal::ZERO);
        let new_compensation = employee.annual_compensation * (Decimal::ONE + merit_rate + cola_rate);

        let effective_date = match methodology {
            RaiseTimingMethodology::Legacy => legacy_effective_date(&employee.employee_id, ctx.year),
            RaiseTimingMethodology::Realistic => {
                realistic_effective_date(ctx.scenario_id, ctx.year, &employee.employee_id, month_distribution)
            }
        };
        let effective_date = effective_date.max(ctx.year_start).min(ctx.year_end);

        let payload = EventPayload::Merit {
            plan_id: None,
            new_compensation,
            merit_percentage: merit_rate + cola_rate,
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
