//! Batch/scenario runner
//!
//! Pre-loads the shared, immutable tables once (hazards, seed defaults,
//! levers, plan designs), then runs each scenario's full year range to
//! completion in parallel via rayon. Each scenario gets its own orchestrator
//! state; nothing mutable is shared across scenarios.

use crate::accumulators::AccumulatorTable;
use crate::employee::Employee;
use crate::error::SimError;
use crate::orchestrator::{run_year, ProgressEvent, YearInputs};
use crate::scenario::Scenario;
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::mpsc::Sender;

/// One row of the cross-scenario comparison matrix.
#[derive(Debug, Clone)]
pub struct ScenarioSummary {
    pub scenario_id: String,
    pub final_year: i32,
    pub final_headcount: i64,
    pub average_compensation: Decimal,
    pub enrollment_rate: Decimal,
    pub turnover_events: i64,
}

/// The outcome of running one scenario end to end.
pub struct ScenarioOutcome {
    pub scenario_id: String,
    pub summary: ScenarioSummary,
    pub final_active: Vec<Employee>,
    pub final_accumulators: AccumulatorTable,
}

/// Everything needed to run one scenario's full year range, built once per
/// scenario from the batch's shared immutable tables. The orchestrator
/// builds one `YearInputs` per year from this plus the resolved parameters
/// for that year; this runner owns only the sequencing and aggregation.
pub trait ScenarioYearInputsFactory: Sync {
    fn year_inputs(&self, scenario: &Scenario, year: i32) -> Result<YearInputs<'_>, SimError>;
}

/// Run one scenario's full year range, seeded from an empty population (a
/// fresh scenario) or a checkpoint-resumed population supplied by the
/// caller.
pub fn run_scenario(
    scenario: &Scenario,
    factory: &dyn ScenarioYearInputsFactory,
    initial_active: Vec<Employee>,
    initial_accumulators: AccumulatorTable,
    progress: &Sender<ProgressEvent>,
) -> Result<ScenarioOutcome, SimError> {
    let mut active = initial_active;
    let mut accumulators = initial_accumulators;
    let mut turnover_events = 0i64;

    for year in scenario.years() {
        let inputs = factory.year_inputs(scenario, year)?;
        let result = run_year(&inputs, &active, &accumulators, chrono_year_start(year), progress)?;
        turnover_events += result.events.iter().filter(|e| matches!(e.payload, crate::events::EventPayload::Termination { .. })).count() as i64;
        active = result.active_employees;
        accumulators = result.accumulators;
    }

    let summary = summarize(scenario, &active, &accumulators, turnover_events);
    Ok(ScenarioOutcome { scenario_id: scenario.scenario_id.clone(), summary, final_active: active, final_accumulators: accumulators })
}

fn chrono_year_start(year: i32) -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;
    chrono::Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single().expect("valid calendar year")
}

fn summarize(scenario: &Scenario, active: &[Employee], accumulators: &AccumulatorTable, turnover_events: i64) -> ScenarioSummary {
    let headcount = active.len() as i64;
    let total_compensation: Decimal = active.iter().map(|e| e.annual_compensation).sum();
    let average_compensation = if headcount > 0 { total_compensation / Decimal::from(headcount) } else { Decimal::ZERO };

    let enrolled = active
        .iter()
        .filter(|e| accumulators.get(&e.employee_id).map(|r| r.enrollment.enrolled).unwrap_or(false))
        .count() as i64;
    let enrollment_rate = if headcount > 0 { Decimal::from(enrolled) / Decimal::from(headcount) } else { Decimal::ZERO };

    ScenarioSummary {
        scenario_id: scenario.scenario_id.clone(),
        final_year: scenario.end_year,
        final_headcount: headcount,
        average_compensation,
        enrollment_rate,
        turnover_events,
    }
}

/// Run a bounded pool of scenarios in parallel. Each scenario runs against
/// its own progress channel so a consumer can multiplex per-scenario
/// progress without cross-scenario interleaving corrupting a single stream.
pub fn run_batch(
    scenarios: &[Scenario],
    factory: &(dyn ScenarioYearInputsFactory + Sync),
    initial_active: &[Employee],
    progress_for: impl Fn(&str) -> Sender<ProgressEvent> + Sync,
) -> Vec<Result<ScenarioOutcome, SimError>> {
    scenarios
        .par_iter()
        .map(|scenario| {
            let progress = progress_for(&scenario.scenario_id);
            run_scenario(scenario, factory, initial_active.to_vec(), AccumulatorTable::new(), &progress)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn summarize_computes_average_compensation_and_enrollment_rate() {
        let scenario = Scenario {
            scenario_id: "S1".into(),
            seed_label: "base".into(),
            start_year: 2025,
            end_year: 2025,
            growth_target: Decimal::new(3, 2),
            growth_tolerance: Decimal::new(2, 2),
            parameter_overrides: HashMap::new(),
            plan_design_id: "P1".into(),
        };

        let active = vec![
            Employee {
                employee_id: "E1".into(),
                hire_date: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                birth_date: chrono::NaiveDate::from_ymd_opt(1985, 1, 1).unwrap(),
                department: "Engineering".into(),
                level: 3,
                annual_compensation: Decimal::new(100_000_00, 2),
                status: crate::employee::EmploymentStatus::Active,
                termination_date: None,
                termination_reason: None,
            },
            Employee {
                employee_id: "E2".into(),
                hire_date: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                birth_date: chrono::NaiveDate::from_ymd_opt(1985, 1, 1).unwrap(),
                department: "Sales".into(),
                level: 2,
                annual_compensation: Decimal::new(80_000_00, 2),
                status: crate::employee::EmploymentStatus::Active,
                termination_date: None,
                termination_reason: None,
            },
        ];

        let mut accumulators = AccumulatorTable::new();
        let mut row = crate::accumulators::AccumulatorRow::default();
        row.enrollment.enrolled = true;
        accumulators.insert("E1".to_string(), row);

        let summary = summarize(&scenario, &active, &accumulators, 3);
        assert_eq!(summary.final_headcount, 2);
        assert_eq!(summary.average_compensation, Decimal::new(90_000_00, 2));
        assert_eq!(summary.enrollment_rate, Decimal::new(5, 1));
        assert_eq!(summary.turnover_events, 3);
    }
}
