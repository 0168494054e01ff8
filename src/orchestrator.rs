//! Pipeline orchestrator
//!
//! Executes the ordered per-year stage DAG: INITIALIZATION → FOUNDATION →
//! EVENT_GENERATION → STATE_ACCUMULATION → VALIDATION → REPORTING. A year is
//! sealed only once VALIDATION passes; sealed years are never revisited.

use crate::accumulators::{fold_year, AccumulatorTable, ContributionState};
use crate::employee::{Employee, EmploymentStatus};
use crate::error::SimError;
use crate::events::{Event, EventPayload};
use crate::generators::contribution::{generate_pay_period_contributions, PayPeriodInput};
use crate::generators::enrollment::{
    generate_auto_enrollment_windows, generate_auto_enrollments_and_opt_outs, generate_auto_escalations,
    generate_eligibility_events,
};
use crate::generators::hire::{
    generate_hires, generate_new_hire_terminations, DepartmentDistribution, JobLevelDistribution,
    NewHireCompensationStrategy,
};
use crate::generators::merit::{generate_merit_raises, MonthDistribution, RaiseTimingMethodology};
use crate::generators::promotion::{generate_promotions, PromotionConfig};
use crate::generators::termination::{build_termination_events, select_experienced_terminations};
use crate::generators::vesting::{generate_forfeitures, generate_vesting_events};
use crate::generators::{active_employees, YearContext};
use crate::hazards::HazardTable;
use crate::parameters::EffectiveParameters;
use crate::reconciliation::reconcile;
use crate::scenario::PlanDesign;
use crate::snapshot::WorkforceSnapshotRow;
use crate::validation::{run_checks, ValidationOutcome};
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info};
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initialization,
    Foundation,
    EventGeneration,
    StateAccumulation,
    Validation,
    Reporting,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Initialization => "initialization",
            Stage::Foundation => "foundation",
            Stage::EventGeneration => "event_generation",
            Stage::StateAccumulation => "state_accumulation",
            Stage::Validation => "validation",
            Stage::Reporting => "reporting",
        }
    }
}

/// Progress protocol events emitted to the orchestrator's consumer.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    StatusUpdate { year: i32, message: String },
    StageComplete { year: i32, stage: &'static str },
    YearComplete { year: i32, active_end: i64 },
    EventGenerated { year: i32, count: usize },
    Error { year: i32, message: String },
    Complete { scenario_id: String },
}

fn emit(sender: &Sender<ProgressEvent>, event: ProgressEvent) {
    let _ = sender.send(event);
}

/// The last calendar day of `month` in `year`.
fn month_end_date(year: i32, month: u32) -> NaiveDate {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt())
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 12, 31).expect("valid year end"))
}

/// Everything one year needs that doesn't change during the year.
pub struct YearInputs<'a> {
    pub scenario_id: &'a str,
    pub year: i32,
    pub params: &'a EffectiveParameters,
    pub termination_hazards: &'a HazardTable,
    pub promotion_hazards: &'a HazardTable,
    pub plan_design: &'a PlanDesign,
    pub departments: &'a DepartmentDistribution,
    pub job_levels: &'a JobLevelDistribution,
    pub new_hire_compensation: &'a NewHireCompensationStrategy,
    pub promotion_config: &'a PromotionConfig,
    pub merit_rate_by_level: &'a HashMap<u8, rust_decimal::Decimal>,
    pub cola_rate: rust_decimal::Decimal,
    pub raise_timing: RaiseTimingMethodology,
    pub month_distribution: &'a MonthDistribution,
    pub growth_target: rust_decimal::Decimal,
    pub p_nh_term: rust_decimal::Decimal,
    pub opt_out_base_rate: rust_decimal::Decimal,
    pub first_escalation_delay_years: u32,
}

/// The outcome of sealing one year.
pub struct YearResult {
    pub events: Vec<Event>,
    pub accumulators: AccumulatorTable,
    pub snapshots: Vec<WorkforceSnapshotRow>,
    pub active_employees: Vec<Employee>,
    pub active_end: i64,
}

/// Run one year end to end. `prior_active` is the sealed active set as of
/// year Y-1; `prior_accumulators` is that year's accumulator table.
pub fn run_year(
    inputs: &YearInputs,
    prior_active: &[Employee],
    prior_accumulators: &AccumulatorTable,
    created_at: DateTime<Utc>,
    progress: &Sender<ProgressEvent>,
) -> Result<YearResult, SimError> {
    emit(progress, ProgressEvent::StatusUpdate {
        year: inputs.year,
        message: format!("starting year {}", inputs.year),
    });

    // INITIALIZATION: the hazard tables and effective parameters are passed
    // in already materialized by the caller, which owns the batch-wide
    // immutable parameter view (the batch-wide shared-resource policy).
    info!("year {}: initialization complete", inputs.year);
    emit(progress, ProgressEvent::StageComplete { year: inputs.year, stage: Stage::Initialization.as_str() });

    // FOUNDATION: prior-year accumulators and snapshot are given, never
    // derived from a self-referencing structure.
    let active_refs = active_employees(prior_active);
    emit(progress, ProgressEvent::StageComplete { year: inputs.year, stage: Stage::Foundation.as_str() });

    let year_start = NaiveDate::from_ymd_opt(inputs.year, 1, 1).expect("valid year start");
    let year_end = NaiveDate::from_ymd_opt(inputs.year, 12, 31).expect("valid year end");

    let ctx = YearContext {
        scenario_id: inputs.scenario_id,
        year: inputs.year,
        year_start,
        year_end,
        params: inputs.params,
        termination_hazards: inputs.termination_hazards,
        promotion_hazards: inputs.promotion_hazards,
        plan_design: inputs.plan_design,
    };

    // EVENT_GENERATION: termination -> hire -> new_hire_term is sequenced;
    // promotion/merit/DC-plan are headcount-neutral and could run in
    // parallel via rayon::join once each is independently tested.
    let active_by_id: HashMap<String, &Employee> =
        prior_active.iter().map(|e| (e.employee_id.clone(), e)).collect();

    let selection = select_experienced_terminations(&active_refs, &ctx)?;
    let termination_events = build_termination_events(&selection, &active_by_id, &ctx, created_at)?;

    let reconciliation = reconcile(
        inputs.year,
        prior_active.len() as i64,
        termination_events.len() as i64,
        inputs.growth_target,
        inputs.p_nh_term,
    )?;

    let hire_events = generate_hires(
        reconciliation.hires,
        &ctx,
        inputs.departments,
        inputs.job_levels,
        inputs.new_hire_compensation,
        created_at,
    )?;
    let new_hire_termination_events =
        generate_new_hire_terminations(&hire_events, reconciliation.new_hire_terms, &ctx, created_at)?;

    let promotion_events = generate_promotions(&active_refs, inputs.promotion_config, &ctx, created_at)?;
    let merit_events = generate_merit_raises(
        &active_refs,
        inputs.merit_rate_by_level,
        inputs.cola_rate,
        inputs.raise_timing,
        inputs.month_distribution,
        &ctx,
        created_at,
    )?;

    // Per employee, the effective date of the most recent comp-changing event
    // this year (hire, promotion, or merit), for snapshot proration below.
    let mut comp_change_dates: HashMap<String, NaiveDate> = HashMap::new();
    for event in hire_events.iter().chain(promotion_events.iter()).chain(merit_events.iter()) {
        comp_change_dates
            .entry(event.employee_id.clone())
            .and_modify(|date| *date = (*date).max(event.effective_date))
            .or_insert(event.effective_date);
    }

    // DC-plan life-cycle events run over the full active set (prior active
    // plus this year's hires), since new hires can become eligible the same
    // year they join.
    let hired_employees: Vec<Employee> = hire_events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Hire { hire_date, department, job_level, annual_compensation, .. } => Some(Employee {
                employee_id: e.employee_id.clone(),
                hire_date: *hire_date,
                birth_date: *hire_date,
                department: department.clone(),
                level: *job_level,
                annual_compensation: *annual_compensation,
                status: EmploymentStatus::Active,
                termination_date: None,
                termination_reason: None,
            }),
            _ => None,
        })
        .collect();
    let mut dc_plan_population: Vec<Employee> = prior_active.to_vec();
    dc_plan_population.extend(hired_employees);
    let dc_plan_refs: Vec<&Employee> = dc_plan_population.iter().collect();
    let dc_plan_by_id: HashMap<String, &Employee> =
        dc_plan_population.iter().map(|e| (e.employee_id.clone(), e)).collect();

    let eligibility_events = generate_eligibility_events(&dc_plan_refs, &ctx, created_at)?;
    let window_events = generate_auto_enrollment_windows(&eligibility_events, &ctx, created_at)?;
    let auto_enrollment_events = generate_auto_enrollments_and_opt_outs(
        &window_events,
        &dc_plan_by_id,
        inputs.opt_out_base_rate,
        &ctx,
        created_at,
    )?;

    let already_enrolled: Vec<(&Employee, rust_decimal::Decimal, NaiveDate)> = dc_plan_refs
        .iter()
        .filter_map(|employee| {
            let row = prior_accumulators.get(&employee.employee_id)?;
            if !row.enrollment.enrolled {
                return None;
            }
            let enrollment_date = row.enrollment.enrollment_date?;
            Some((*employee, row.enrollment.pre_tax_rate, enrollment_date))
        })
        .collect();
    let escalation_events = generate_auto_escalations(
        &already_enrolled,
        inputs.first_escalation_delay_years,
        year_end,
        &ctx,
        created_at,
    )?;

    let vesting_events = generate_vesting_events(&dc_plan_refs, &inputs.plan_design.vesting_schedule, year_end, &ctx, created_at)?;

    // Monthly payroll: every employee already enrolled entering the year
    // contributes against their carried-forward deferral rates.
    let mut running_contribution_state: HashMap<String, ContributionState> = already_enrolled
        .iter()
        .map(|(employee, _, _)| {
            (
                employee.employee_id.clone(),
                prior_accumulators.get(&employee.employee_id).map(|r| r.contribution.clone()).unwrap_or_default(),
            )
        })
        .collect();
    let mut contribution_events = Vec::new();
    for month in 1..=12u32 {
        let pay_period_end = month_end_date(inputs.year, month);

        let period_inputs: Vec<PayPeriodInput> = already_enrolled
            .iter()
            .map(|(employee, rate, _)| PayPeriodInput {
                employee,
                pre_tax_rate: *rate,
                roth_rate: rust_decimal::Decimal::ZERO,
                eligible_compensation: employee.annual_compensation / rust_decimal::Decimal::from(12),
                pay_period_end,
                payroll_id: format!("{}-{:02}", inputs.year, month),
            })
            .collect();

        let period_events =
            generate_pay_period_contributions(&period_inputs, &running_contribution_state, &ctx, created_at)?;
        for event in &period_events {
            if let EventPayload::Contribution { source, ytd_amount, .. } = &event.payload {
                running_contribution_state
                    .entry(event.employee_id.clone())
                    .or_default()
                    .ytd_by_source
                    .insert(*source, *ytd_amount);
            }
        }
        contribution_events.extend(period_events);
    }

    // Forfeitures apply the vesting schedule at termination against the
    // employer-source balances the terminated employee entered the year
    // with, since a mid-year leaver earns no further employer contributions.
    let mut forfeiture_events = Vec::new();
    for event in termination_events.iter().chain(new_hire_termination_events.iter()) {
        let EventPayload::Termination { final_pay_date, .. } = &event.payload else { continue };
        let Some(employee) = dc_plan_by_id.get(&event.employee_id) else { continue };
        let tenure = employee.tenure_years(*final_pay_date);
        let vested_percentage = inputs.plan_design.vesting_schedule.vested_percentage_at(tenure);
        let balances = prior_accumulators.get(&event.employee_id).map(|r| r.contribution.clone()).unwrap_or_default();
        forfeiture_events.extend(generate_forfeitures(employee, vested_percentage, &balances, *final_pay_date, &ctx, created_at)?);
    }

    let mut all_events = Vec::new();
    all_events.extend(termination_events);
    all_events.extend(promotion_events);
    all_events.extend(merit_events);
    all_events.extend(hire_events.clone());
    all_events.extend(new_hire_termination_events.clone());
    all_events.extend(eligibility_events);
    all_events.extend(window_events);
    all_events.extend(auto_enrollment_events);
    all_events.extend(escalation_events);
    all_events.extend(vesting_events);
    all_events.extend(contribution_events);
    all_events.extend(forfeiture_events);

    // Sealing sorts into the §3 total order regardless of generation order,
    // so parallel generator execution never affects the produced event set.
    all_events.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    emit(progress, ProgressEvent::EventGenerated { year: inputs.year, count: all_events.len() });
    emit(progress, ProgressEvent::StageComplete { year: inputs.year, stage: Stage::EventGeneration.as_str() });

    // STATE_ACCUMULATION
    let accumulators = fold_year(prior_accumulators, &all_events);
    emit(progress, ProgressEvent::StageComplete { year: inputs.year, stage: Stage::StateAccumulation.as_str() });

    // Materialize the new active set from prior-active, hires, and this
    // year's terminations.
    let terminated_ids: HashSet<String> = all_events
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::Termination { .. }))
        .map(|e| e.employee_id.clone())
        .collect();

    let new_hires: Vec<Employee> = hire_events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Hire { hire_date, department, job_level, annual_compensation, .. } => Some(Employee {
                employee_id: e.employee_id.clone(),
                hire_date: *hire_date,
                birth_date: *hire_date, // unknown birth date for synthetic hires; resolved by census enrichment upstream
                department: department.clone(),
                level: *job_level,
                annual_compensation: *annual_compensation,
                status: EmploymentStatus::Active,
                termination_date: None,
                termination_reason: None,
            }),
            _ => None,
        })
        .collect();

    let active_employees_next: Vec<Employee> = prior_active
        .iter()
        .cloned()
        .chain(new_hires)
        .filter(|e| !terminated_ids.contains(&e.employee_id))
        .collect();

    let active_end = active_employees_next.len() as i64;

    let snapshots = active_employees_next
        .iter()
        .map(|employee| {
            let accumulator = accumulators.get(&employee.employee_id).cloned().unwrap_or_default();
            let comp_effective_date = comp_change_dates.get(&employee.employee_id).copied().unwrap_or(year_start);
            let prorated = crate::snapshot::prorated_compensation(
                employee.annual_compensation,
                comp_effective_date,
                year_start,
                year_end,
            );
            crate::snapshot::build_snapshot_row(
                inputs.scenario_id,
                &inputs.plan_design.plan_design_id,
                employee,
                inputs.year,
                &accumulator,
                prorated,
                Vec::new(),
            )
        })
        .collect();

    // VALIDATION
    let ValidationOutcome { fatal, warnings } = run_checks(&all_events, &active_employees_next, reconciliation.active_end);
    for warning in &warnings {
        emit(progress, ProgressEvent::StatusUpdate { year: inputs.year, message: warning.clone() });
    }
    if let Some(failure) = fatal {
        error!("year {} failed validation: {failure}", inputs.year);
        emit(progress, ProgressEvent::Error { year: inputs.year, message: failure.to_string() });
        return Err(failure);
    }
    emit(progress, ProgressEvent::StageComplete { year: inputs.year, stage: Stage::Validation.as_str() });

    // REPORTING: no I/O on the critical path; callers persist
    // `YearResult` after this function returns.
    emit(progress, ProgressEvent::StageComplete { year: inputs.year, stage: Stage::Reporting.as_str() });
    emit(progress, ProgressEvent::YearComplete { year: inputs.year, active_end });

    Ok(YearResult {
        events: all_events,
        accumulators,
        snapshots,
        active_employees: active_employees_next,
        active_end,
    })
}
