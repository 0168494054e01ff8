//! Event generators
//!
//! One function per generator, each a pure `fn(prior_state, effective_params,
//! rng, year) -> Result<Vec<Event>, SimError>`. Promotion, merit, and
//! DC-plan generators are headcount-neutral and may run in parallel with
//! rayon; termination and hire are sequenced because hire targeting depends
//! on the termination count.

pub mod contribution;
pub mod enrollment;
pub mod hire;
pub mod merit;
pub mod promotion;
pub mod termination;
pub mod vesting;

use crate::employee::Employee;
use crate::hazards::HazardTable;
use crate::parameters::EffectiveParameters;
use crate::scenario::PlanDesign;
use chrono::NaiveDate;

/// Everything a generator needs about "when" and "under what rules" for one
/// year, independent of prior employee state.
pub struct YearContext<'a> {
    pub scenario_id: &'a str,
    pub year: i32,
    pub year_start: NaiveDate,
    pub year_end: NaiveDate,
    pub params: &'a EffectiveParameters,
    pub termination_hazards: &'a HazardTable,
    pub promotion_hazards: &'a HazardTable,
    pub plan_design: &'a PlanDesign,
}

/// Spread a uniform draw `u` across the days of the year.
pub fn date_within_year(ctx: &YearContext, u: f64) -> NaiveDate {
    let span = (ctx.year_end - ctx.year_start).num_days().max(0);
    let offset = ((span + 1) as f64 * u).floor() as i64;
    ctx.year_start + chrono::Duration::days(offset.min(span))
}

/// Spread a uniform draw `u` across the days strictly after `start`, up to
/// and including `end` (used for new-hire termination dates).
pub fn date_within_range(start: NaiveDate, end: NaiveDate, u: f64) -> NaiveDate {
    let span = (end - start).num_days().max(0);
    let offset = ((span + 1) as f64 * u).floor() as i64;
    start + chrono::Duration::days(offset.min(span))
}

/// `&Employee` slice helper: active employees only.
pub fn active_employees(employees: &[Employee]) -> Vec<&Employee> {
    employees.iter().filter(|e| e.is_active()).collect()
}
