//! Employee entity and derived demographic/organizational attributes

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why an employee's status changed to terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Voluntary,
    Involuntary,
    Retirement,
    Death,
    Disability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Active,
    Terminated,
}

/// A single employee record carried forward year over year.
///
/// `level` is job level 1..10. Age and tenure are always derived
/// from `birth_date`/`hire_date` against a reference date, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: String,
    pub hire_date: NaiveDate,
    pub birth_date: NaiveDate,
    pub department: String,
    pub level: u8,
    pub annual_compensation: Decimal,
    pub status: EmploymentStatus,
    pub termination_date: Option<NaiveDate>,
    pub termination_reason: Option<TerminationReason>,
}

impl Employee {
    /// Age in whole years as of `as_of`.
    pub fn age_years(&self, as_of: NaiveDate) -> u32 {
        years_between(self.birth_date, as_of)
    }

    /// Tenure in whole years as of `as_of`.
    pub fn tenure_years(&self, as_of: NaiveDate) -> u32 {
        years_between(self.hire_date, as_of)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, EmploymentStatus::Active)
    }
}

/// Whole years elapsed from `start` to `as_of`, clamped at zero.
fn years_between(start: NaiveDate, as_of: NaiveDate) -> u32 {
    if as_of < start {
        return 0;
    }
    let mut years = (as_of.year() - start.year()) as i32;
    let anniversary = start.with_year(as_of.year()).unwrap_or(start);
    if as_of < anniversary {
        years -= 1;
    }
    years.max(0) as u32
}

use chrono::Datelike;
