//! Event schema and validator
//!
//! `Event` is immutable once built. `build_event` is the only constructor and
//! is the single point where payload validation happens.

use crate::error::SimError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    AgeAndService,
    Immediate,
    HoursRequirement,
    Rehire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentSource {
    Proactive,
    Auto,
    Voluntary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionSource {
    EmployeePreTax,
    EmployeeRoth,
    EmployeeAfterTax,
    EmployeeCatchUp,
    EmployerMatch,
    EmployerMatchTrueUp,
    EmployerNonelective,
    EmployerProfitSharing,
    ForfeitureAllocation,
}

impl ContributionSource {
    /// Employer sources are the only ones subject to forfeiture (Invariant 4).
    pub fn is_employer_source(&self) -> bool {
        matches!(
            self,
            ContributionSource::EmployerMatch
                | ContributionSource::EmployerMatchTrueUp
                | ContributionSource::EmployerNonelective
                | ContributionSource::EmployerProfitSharing
                | ContributionSource::ForfeitureAllocation
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VestingScheduleType {
    Graded,
    Cliff,
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAction {
    Opened,
    Closed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentChangeType {
    OptOut,
    RateChange,
    SourceChange,
    Cancellation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentChangeReason {
    EmployeeOptOut,
    PlanAmendment,
    ComplianceCorrection,
    SystemCorrection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForfeitureReason {
    UnvestedTermination,
    BreakInService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HceDeterminationMethod {
    PriorYear,
    CurrentYear,
}

pub use crate::employee::TerminationReason;

/// The discriminated event payload union. Every event carries exactly one of
/// these. The schema is closed: unknown payload shapes do not
/// round-trip and fail to deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    Hire {
        plan_id: Option<String>,
        hire_date: NaiveDate,
        department: String,
        job_level: u8,
        annual_compensation: Decimal,
    },
    Promotion {
        plan_id: Option<String>,
        new_job_level: u8,
        new_annual_compensation: Decimal,
        effective_date: NaiveDate,
    },
    Termination {
        plan_id: Option<String>,
        reason: TerminationReason,
        final_pay_date: NaiveDate,
    },
    Merit {
        plan_id: Option<String>,
        new_compensation: Decimal,
        merit_percentage: Decimal,
    },
    Eligibility {
        plan_id: String,
        eligible: bool,
        eligibility_date: NaiveDate,
        reason: EligibilityReason,
    },
    Enrollment {
        plan_id: String,
        enrollment_date: NaiveDate,
        pre_tax_rate: Decimal,
        roth_rate: Decimal,
        after_tax_rate: Decimal,
        auto_enrollment: bool,
        opt_out_window_expires: Option<NaiveDate>,
        enrollment_source: EnrollmentSource,
        auto_enrollment_window_start: Option<NaiveDate>,
        auto_enrollment_window_end: Option<NaiveDate>,
        proactive_enrollment_eligible: bool,
        window_timing_compliant: bool,
    },
    Contribution {
        plan_id: String,
        source: ContributionSource,
        amount: Decimal,
        pay_period_end: NaiveDate,
        contribution_date: NaiveDate,
        ytd_amount: Decimal,
        payroll_id: String,
        irs_limit_applied: bool,
        inferred_value: bool,
    },
    Vesting {
        plan_id: String,
        vested_percentage: Decimal,
        source_balances_vested: HashMap<String, Decimal>,
        vesting_schedule_type: VestingScheduleType,
        service_computation_date: NaiveDate,
        service_credited_hours: Decimal,
        service_period_end_date: NaiveDate,
    },
    AutoEnrollmentWindow {
        plan_id: String,
        window_action: WindowAction,
        window_start_date: NaiveDate,
        window_end_date: NaiveDate,
        window_duration_days: i64,
        default_deferral_rate: Decimal,
        eligible_for_proactive: bool,
        proactive_window_end: Option<NaiveDate>,
    },
    EnrollmentChange {
        plan_id: String,
        change_type: EnrollmentChangeType,
        change_reason: EnrollmentChangeReason,
        previous_enrollment_date: Option<NaiveDate>,
        new_pre_tax_rate: Decimal,
        new_roth_rate: Decimal,
        previous_pre_tax_rate: Option<Decimal>,
        previous_roth_rate: Option<Decimal>,
        within_opt_out_window: bool,
        penalty_applied: bool,
    },
    Forfeiture {
        plan_id: String,
        forfeited_from_source: ContributionSource,
        amount: Decimal,
        reason: ForfeitureReason,
        vested_percentage: Decimal,
    },
    HceStatus {
        plan_id: String,
        determination_method: HceDeterminationMethod,
        ytd_compensation: Decimal,
        annualized_compensation: Decimal,
        hce_threshold: Decimal,
        is_hce: bool,
        determination_date: NaiveDate,
        prior_year_hce: Option<bool>,
    },
    Compliance {
        plan_id: String,
        compliance_type: String,
        limit_type: String,
        applicable_limit: Decimal,
        current_amount: Decimal,
        monitoring_date: NaiveDate,
    },
}

impl EventPayload {
    /// Total order priority within a year.
    pub fn type_priority(&self) -> u8 {
        match self {
            EventPayload::Termination { .. } => 1,
            EventPayload::Promotion { .. } => 2,
            EventPayload::Merit { .. } => 3,
            EventPayload::Hire { .. } => 4,
            EventPayload::Eligibility { .. } => 5,
            EventPayload::Enrollment { .. } => 6,
            EventPayload::Contribution { .. } => 7,
            EventPayload::Vesting { .. } => 8,
            EventPayload::AutoEnrollmentWindow { .. } => 9,
            EventPayload::EnrollmentChange { .. } => 10,
            EventPayload::Forfeiture { .. } => 11,
            EventPayload::HceStatus { .. } => 12,
            EventPayload::Compliance { .. } => 13,
        }
    }
}

/// Fields common to every event, independent of payload.
#[derive(Debug, Clone)]
pub struct CommonFields {
    pub employee_id: String,
    pub scenario_id: String,
    pub plan_design_id: String,
    pub source_system: String,
    pub effective_date: NaiveDate,
    pub correlation_id: Option<Uuid>,
    pub hire_date: NaiveDate,
    pub year_end: NaiveDate,
}

/// An immutable, UUID-identified event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub employee_id: String,
    pub scenario_id: String,
    pub plan_design_id: String,
    pub source_system: String,
    pub effective_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub payload: EventPayload,
}

impl Event {
    /// Total-order sort key for a year's event set.
    pub fn sort_key(&self) -> (NaiveDate, u8, String) {
        (
            self.effective_date,
            self.payload.type_priority(),
            self.employee_id.clone(),
        )
    }
}

/// Build a validated event. This is the only way to construct one.
///
/// Validates: date coherence (`hire_date <= effective_date <= year_end`,
/// `termination_date >= hire_date`), non-negative monetary amounts, and
/// enrollment deferral-rate sums `<= 0.75`.
pub fn build_event(
    payload: EventPayload,
    common: CommonFields,
    created_at: DateTime<Utc>,
) -> Result<Event, SimError> {
    validate(&payload, &common)?;

    Ok(Event {
        event_id: Uuid::new_v4(),
        employee_id: common.employee_id,
        scenario_id: common.scenario_id,
        plan_design_id: common.plan_design_id,
        source_system: common.source_system,
        effective_date: common.effective_date,
        created_at,
        correlation_id: common.correlation_id,
        payload,
    })
}

fn fail(employee_id: &str, field: &str, reason: impl Into<String>) -> SimError {
    SimError::Validation {
        employee_id: employee_id.to_string(),
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn validate(payload: &EventPayload, common: &CommonFields) -> Result<(), SimError> {
    let eid = &common.employee_id;

    if common.effective_date < common.hire_date {
        return Err(fail(eid, "effective_date", "precedes hire_date"));
    }
    if common.effective_date > common.year_end {
        return Err(fail(eid, "effective_date", "falls after year_end"));
    }

    match payload {
        EventPayload::Hire { annual_compensation, .. } => {
            if *annual_compensation <= Decimal::ZERO {
                return Err(fail(eid, "annual_compensation", "must be > 0"));
            }
        }
        EventPayload::Promotion { new_annual_compensation, .. } => {
            if *new_annual_compensation <= Decimal::ZERO {
                return Err(fail(eid, "new_annual_compensation", "must be > 0"));
            }
        }
        EventPayload::Termination { final_pay_date, .. } => {
            if *final_pay_date < common.hire_date {
                return Err(fail(eid, "final_pay_date", "precedes hire_date"));
            }
        }
        EventPayload::Merit { new_compensation, merit_percentage, .. } => {
            if *new_compensation <= Decimal::ZERO {
                return Err(fail(eid, "new_compensation", "must be > 0"));
            }
            if *merit_percentage < Decimal::ZERO || *merit_percentage > Decimal::ONE {
                return Err(fail(eid, "merit_percentage", "must be in [0,1]"));
            }
        }
        EventPayload::Enrollment {
            pre_tax_rate,
            roth_rate,
            after_tax_rate,
            ..
        } => {
            let total = pre_tax_rate + roth_rate + after_tax_rate;
            if total > Decimal::new(75, 2) {
                return Err(fail(eid, "deferral_rate_total", "exceeds 0.75"));
            }
            if *pre_tax_rate < Decimal::ZERO || *roth_rate < Decimal::ZERO || *after_tax_rate < Decimal::ZERO {
                return Err(fail(eid, "deferral_rate", "must be non-negative"));
            }
        }
        EventPayload::Contribution { amount, .. } => {
            if *amount < Decimal::ZERO {
                return Err(fail(eid, "amount", "must be non-negative"));
            }
        }
        EventPayload::Vesting { vested_percentage, .. } => {
            if *vested_percentage < Decimal::ZERO || *vested_percentage > Decimal::ONE {
                return Err(fail(eid, "vested_percentage", "must be in [0,1]"));
            }
        }
        EventPayload::Forfeiture { amount, vested_percentage, .. } => {
            if *amount < Decimal::ZERO {
                return Err(fail(eid, "amount", "must be non-negative"));
            }
            if *vested_percentage < Decimal::ZERO || *vested_percentage > Decimal::ONE {
                return Err(fail(eid, "vested_percentage", "must be in [0,1]"));
            }
        }
        _ => {}
    }

    Ok(())
}
