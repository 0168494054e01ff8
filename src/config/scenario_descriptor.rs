//! Scenario descriptor: the YAML configuration document

use crate::error::SimError;
use crate::scenario::{
    AutoEnrollmentConfig, EligibilityRules, MatchFormula, MatchTier, PlanDesign, Scenario,
    VestingSchedule, VestingScheduleEntry, VestingScheduleKind,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDescriptor {
    pub scenario_id: String,
    pub seed_label: String,
    pub start_year: i32,
    pub end_year: i32,
    pub growth_target: Decimal,
    pub growth_tolerance: Decimal,
    #[serde(default)]
    pub parameter_overrides: HashMap<String, Decimal>,
    pub raise_timing_methodology: RaiseTimingMethodology,
    pub new_hire_strategy: NewHireStrategyDescriptor,
    pub plan_design: PlanDesignDescriptor,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RaiseTimingMethodology {
    Legacy,
    Realistic,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, tag = "kind", rename_all = "snake_case")]
pub enum NewHireStrategyDescriptor {
    Percentile { percentiles_by_level: HashMap<u8, Decimal> },
    Fixed { amounts_by_level: HashMap<u8, Decimal> },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanDesignDescriptor {
    pub plan_design_id: String,
    pub minimum_age: u32,
    pub minimum_service_months: u32,
    pub immediate_eligibility: bool,
    pub match_tiers: Vec<MatchTierDescriptor>,
    pub nonelective_rate: Decimal,
    pub vesting_schedule_kind: VestingScheduleKindDescriptor,
    pub vesting_schedule: Vec<VestingEntryDescriptor>,
    pub auto_enrollment_enabled: bool,
    pub default_deferral_rate: Decimal,
    pub opt_out_window_days: i64,
    pub escalation_enabled: bool,
    pub escalation_rate_step: Decimal,
    pub escalation_cap: Decimal,
    pub irs_deferral_limit: Decimal,
    pub irs_catch_up_limit: Decimal,
    pub irs_catch_up_age: u32,
    pub irs_annual_additions_limit: Decimal,
    pub irs_compensation_limit: Decimal,
    pub hce_compensation_threshold: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchTierDescriptor {
    pub deferral_rate_up_to: Decimal,
    pub match_rate: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VestingEntryDescriptor {
    pub years_of_service: u32,
    pub vested_percentage: Decimal,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VestingScheduleKindDescriptor {
    Immediate,
    Cliff,
    Graded,
}

pub fn load_scenario_descriptor(path: &Path) -> Result<ScenarioDescriptor, SimError> {
    let content = std::fs::read_to_string(path)?;
    let descriptor: ScenarioDescriptor = serde_yaml::from_str(&content)?;
    Ok(descriptor)
}

impl ScenarioDescriptor {
    pub fn into_scenario(&self) -> Scenario {
        Scenario {
            scenario_id: self.scenario_id.clone(),
            seed_label: self.seed_label.clone(),
            start_year: self.start_year,
            end_year: self.end_year,
            growth_target: self.growth_target,
            growth_tolerance: self.growth_tolerance,
            parameter_overrides: self.parameter_overrides.clone(),
            plan_design_id: self.plan_design.plan_design_id.clone(),
        }
    }

    pub fn into_plan_design(&self) -> PlanDesign {
        let pd = &self.plan_design;
        PlanDesign {
            plan_design_id: pd.plan_design_id.clone(),
            eligibility: EligibilityRules {
                minimum_age: pd.minimum_age,
                minimum_service_months: pd.minimum_service_months,
                immediate_eligibility: pd.immediate_eligibility,
            },
            match_formula: MatchFormula {
                tiers: pd
                    .match_tiers
                    .iter()
                    .map(|t| MatchTier {
                        deferral_rate_up_to: t.deferral_rate_up_to,
                        match_rate: t.match_rate,
                    })
                    .collect(),
            },
            nonelective_rate: pd.nonelective_rate,
            vesting_schedule: VestingSchedule {
                kind: match pd.vesting_schedule_kind {
                    VestingScheduleKindDescriptor::Immediate => VestingScheduleKind::Immediate,
                    VestingScheduleKindDescriptor::Cliff => VestingScheduleKind::Cliff,
                    VestingScheduleKindDescriptor::Graded => VestingScheduleKind::Graded,
                },
                entries: pd
                    .vesting_schedule
                    .iter()
                    .map(|e| VestingScheduleEntry {
                        years_of_service: e.years_of_service,
                        vested_percentage: e.vested_percentage,
                    })
                    .collect(),
            },
            auto_enrollment: AutoEnrollmentConfig {
                enabled: pd.auto_enrollment_enabled,
                default_deferral_rate: pd.default_deferral_rate,
                opt_out_window_days: pd.opt_out_window_days,
                escalation_enabled: pd.escalation_enabled,
                escalation_rate_step: pd.escalation_rate_step,
                escalation_cap: pd.escalation_cap,
            },
            irs_deferral_limit: pd.irs_deferral_limit,
            irs_catch_up_limit: pd.irs_catch_up_limit,
            irs_catch_up_age: pd.irs_catch_up_age,
            irs_annual_additions_limit: pd.irs_annual_additions_limit,
            irs_compensation_limit: pd.irs_compensation_limit,
            hce_compensation_threshold: pd.hce_compensation_threshold,
        }
    }
}
