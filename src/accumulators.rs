//! State accumulators
//!
//! For each stream, `(employee_id, year)` is `fold(prior_row_or_base,
//! events_in_year_for_employee)`. Never reads the snapshot or future years —
//! this is what keeps year N from depending on year N's own output.

use crate::events::{ContributionSource, Event, EventPayload};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Enrollment and deferral-rate carry-forward for one employee.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollmentState {
    pub enrolled: bool,
    pub enrollment_date: Option<NaiveDate>,
    pub pre_tax_rate: Decimal,
    pub roth_rate: Decimal,
    pub after_tax_rate: Decimal,
}

/// Year-to-date contribution totals by source, for IRS-limit enforcement.
#[derive(Debug, Clone, Default)]
pub struct ContributionState {
    pub ytd_by_source: HashMap<ContributionSource, Decimal>,
}

// serde_json cannot serialize a map keyed by a non-string type, so the
// enum-keyed map is carried as a list of pairs on the wire.
impl Serialize for ContributionState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let pairs: Vec<(ContributionSource, Decimal)> = self.ytd_by_source.iter().map(|(k, v)| (*k, *v)).collect();
        pairs.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContributionState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let pairs = Vec::<(ContributionSource, Decimal)>::deserialize(deserializer)?;
        Ok(ContributionState { ytd_by_source: pairs.into_iter().collect() })
    }
}

impl ContributionState {
    pub fn ytd_total(&self) -> Decimal {
        self.ytd_by_source.values().copied().sum()
    }

    pub fn employee_ytd_total(&self) -> Decimal {
        self.ytd_by_source
            .iter()
            .filter(|(source, _)| !source.is_employer_source())
            .map(|(_, v)| *v)
            .sum()
    }
}

/// Vesting carry-forward: most recent vested percentage and its basis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VestingState {
    pub vested_percentage: Decimal,
    pub service_computation_date: Option<NaiveDate>,
}

/// Auto-escalation carry-forward: whether the employee has been escalated
/// this year and how many escalations they've had since enrollment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscalationState {
    pub escalations_applied: u32,
    pub last_escalation_year: Option<i32>,
}

/// The full per-employee accumulator row carried from year to year.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccumulatorRow {
    pub enrollment: EnrollmentState,
    pub contribution: ContributionState,
    pub vesting: VestingState,
    pub escalation: EscalationState,
}

/// All accumulator rows for a year, keyed by employee.
pub type AccumulatorTable = HashMap<String, AccumulatorRow>;

/// Fold one employee's prior-year row forward across this year's events,
/// already sorted in the §3 total order for determinism.
pub fn fold_employee(prior: &AccumulatorRow, year_events: &[&Event]) -> AccumulatorRow {
    let mut row = prior.clone();
    // YTD contribution counters reset at the start of each year.
    row.contribution = ContributionState::default();

    for event in year_events {
        match &event.payload {
            EventPayload::Enrollment {
                enrollment_date,
                pre_tax_rate,
                roth_rate,
                after_tax_rate,
                ..
            } => {
                row.enrollment = EnrollmentState {
                    enrolled: true,
                    enrollment_date: Some(*enrollment_date),
                    pre_tax_rate: *pre_tax_rate,
                    roth_rate: *roth_rate,
                    after_tax_rate: *after_tax_rate,
                };
            }
            EventPayload::EnrollmentChange {
                new_pre_tax_rate,
                new_roth_rate,
                change_type,
                ..
            } => {
                row.enrollment.pre_tax_rate = *new_pre_tax_rate;
                row.enrollment.roth_rate = *new_roth_rate;
                if matches!(event.payload, EventPayload::EnrollmentChange { .. })
                    && matches!(change_type, crate::events::EnrollmentChangeType::OptOut)
                {
                    row.enrollment.enrolled = false;
                }
            }
            EventPayload::Contribution { source, amount, ytd_amount, .. } => {
                row.contribution.ytd_by_source.insert(*source, *ytd_amount);
                let _ = amount;
            }
            EventPayload::Vesting {
                vested_percentage,
                service_computation_date,
                ..
            } => {
                row.vesting = VestingState {
                    vested_percentage: *vested_percentage,
                    service_computation_date: Some(*service_computation_date),
                };
            }
            _ => {}
        }
    }

    row
}

/// Fold a whole year's event set forward for every employee that had events
/// or already had a prior row, producing the new accumulator table.
pub fn fold_year(prior: &AccumulatorTable, year_events: &[Event]) -> AccumulatorTable {
    let mut by_employee: HashMap<&str, Vec<&Event>> = HashMap::new();
    for event in year_events {
        by_employee.entry(event.employee_id.as_str()).or_default().push(event);
    }

    let mut result = AccumulatorTable::new();

    for (employee_id, events) in &by_employee {
        let base = prior.get(*employee_id).cloned().unwrap_or_default();
        result.insert(employee_id.to_string(), fold_employee(&base, events));
    }

    for (employee_id, row) in prior {
        result.entry(employee_id.clone()).or_insert_with(|| row.clone());
    }

    result
}
