//! Workforce snapshot builder
//!
//! For year Y: active set = (prior-year-active ∪ Y-hires) − Y-terminations.
//! Each row carries prorated compensation against the most recent
//! comp-changing event, plus enrollment/contribution state read from the
//! year's accumulators.

use crate::accumulators::AccumulatorRow;
use crate::employee::{Employee, EmploymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkforceSnapshotRow {
    pub scenario_id: String,
    pub plan_design_id: String,
    pub employee_id: String,
    pub year: i32,
    pub employment_status: EmploymentStatusLabel,
    pub department: String,
    pub level: u8,
    pub annual_compensation: Decimal,
    pub prorated_compensation: Decimal,
    pub enrolled: bool,
    pub pre_tax_rate: Decimal,
    pub roth_rate: Decimal,
    pub after_tax_rate: Decimal,
    pub vested_percentage: Decimal,
    pub data_quality_flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatusLabel {
    Active,
    Terminated,
}

/// Build the active set for year Y: `(prior_active ∪ hires) − terminations`.
pub fn active_set(prior_active: &[Employee], hires: &[Employee], terminated_ids: &HashSet<String>) -> Vec<Employee> {
    prior_active
        .iter()
        .chain(hires.iter())
        .filter(|e| !terminated_ids.contains(&e.employee_id))
        .cloned()
        .collect()
}

/// Prorate compensation by `work_days / calendar_days` against the most
/// recent comp-changing event's effective date within the year.
pub fn prorated_compensation(
    annual_compensation: Decimal,
    comp_effective_date: chrono::NaiveDate,
    year_start: chrono::NaiveDate,
    year_end: chrono::NaiveDate,
) -> Decimal {
    let basis_start = comp_effective_date.max(year_start);
    let calendar_days = (year_end - year_start).num_days() + 1;
    let work_days = (year_end - basis_start).num_days() + 1;
    if calendar_days <= 0 {
        return annual_compensation;
    }
    annual_compensation * Decimal::from(work_days) / Decimal::from(calendar_days)
}

pub fn build_snapshot_row(
    scenario_id: &str,
    plan_design_id: &str,
    employee: &Employee,
    year: i32,
    accumulator: &AccumulatorRow,
    prorated_compensation_value: Decimal,
    data_quality_flags: Vec<String>,
) -> WorkforceSnapshotRow {
    WorkforceSnapshotRow {
        scenario_id: scenario_id.to_string(),
        plan_design_id: plan_design_id.to_string(),
        employee_id: employee.employee_id.clone(),
        year,
        employment_status: match employee.status {
            EmploymentStatus::Active => EmploymentStatusLabel::Active,
            EmploymentStatus::Terminated => EmploymentStatusLabel::Terminated,
        },
        department: employee.department.clone(),
        level: employee.level,
        annual_compensation: employee.annual_compensation,
        prorated_compensation: prorated_compensation_value,
        enrolled: accumulator.enrollment.enrolled,
        pre_tax_rate: accumulator.enrollment.pre_tax_rate,
        roth_rate: accumulator.enrollment.roth_rate,
        after_tax_rate: accumulator.enrollment.after_tax_rate,
        vested_percentage: accumulator.vesting.vested_percentage,
        data_quality_flags,
    }
}
