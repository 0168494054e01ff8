//! Census CSV loader

use crate::employee::{Employee, EmploymentStatus, TerminationReason};
use crate::error::SimError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::io::Read;
use std::path::Path;

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    employee_id: String,
    hire_date: NaiveDate,
    birth_date: NaiveDate,
    termination_date: Option<NaiveDate>,
    termination_reason: Option<String>,
    department: String,
    job_level: u8,
    gross_compensation: Decimal,
    #[allow(dead_code)]
    plan_year_compensation: Option<Decimal>,
    #[allow(dead_code)]
    plan_eligibility_date: Option<NaiveDate>,
}

impl CsvRow {
    fn to_employee(self) -> Result<Employee, SimError> {
        let termination_reason = match self.termination_reason.as_deref() {
            None | Some("") => None,
            Some("voluntary") => Some(TerminationReason::Voluntary),
            Some("involuntary") => Some(TerminationReason::Involuntary),
            Some("retirement") => Some(TerminationReason::Retirement),
            Some("death") => Some(TerminationReason::Death),
            Some("disability") => Some(TerminationReason::Disability),
            Some(other) => {
                return Err(SimError::Validation {
                    employee_id: self.employee_id.clone(),
                    field: "termination_reason".to_string(),
                    reason: format!("unknown termination reason: {other}"),
                })
            }
        };

        let status = if self.termination_date.is_some() {
            EmploymentStatus::Terminated
        } else {
            EmploymentStatus::Active
        };

        Ok(Employee {
            employee_id: self.employee_id,
            hire_date: self.hire_date,
            birth_date: self.birth_date,
            department: self.department,
            level: self.job_level,
            annual_compensation: self.gross_compensation,
            status,
            termination_date: self.termination_date,
            termination_reason,
        })
    }
}

/// Load the census input, one row per employee as of `Y0 - 1`.
pub fn load_census(path: &Path) -> Result<Vec<Employee>, SimError> {
    let reader = csv::Reader::from_path(path)?;
    parse_census(reader)
}

fn parse_census<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<Employee>, SimError> {
    let mut employees = Vec::new();
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        employees.push(row.to_employee()?);
    }
    Ok(employees)
}
