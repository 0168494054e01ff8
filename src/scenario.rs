//! Scenario and plan-design entities

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single simulation run's identity, seed, and year-over-year growth
/// contract. One `Scenario` drives exactly one `run_year` sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    pub seed_label: String,
    pub start_year: i32,
    pub end_year: i32,
    pub growth_target: Decimal,
    /// Fractional tolerance `tolerance` in `|active_end - target_end| <=
    /// ceil(tolerance * active_end(Y-1))`.
    pub growth_tolerance: Decimal,
    #[serde(default)]
    pub parameter_overrides: HashMap<String, Decimal>,
    pub plan_design_id: String,
}

impl Scenario {
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start_year..=self.end_year
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VestingScheduleKind {
    Immediate,
    Cliff,
    Graded,
}

/// A vesting schedule maps whole years of service to a vested percentage.
/// Entries are sorted ascending by `years_of_service`; the vested percentage
/// applicable at a given tenure is the last entry at or below that tenure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VestingScheduleEntry {
    pub years_of_service: u32,
    pub vested_percentage: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VestingSchedule {
    pub kind: VestingScheduleKind,
    pub entries: Vec<VestingScheduleEntry>,
}

impl VestingSchedule {
    pub fn vested_percentage_at(&self, years_of_service: u32) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.years_of_service <= years_of_service)
            .max_by_key(|e| e.years_of_service)
            .map(|e| e.vested_percentage)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Matching formula expressed as a sequence of tiers applied to deferral
/// rate, e.g. `100% of first 3%, 50% of next 2%`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchTier {
    pub deferral_rate_up_to: Decimal,
    pub match_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFormula {
    pub tiers: Vec<MatchTier>,
}

impl MatchFormula {
    /// Employer match as a fraction of compensation, given an employee
    /// deferral rate. Tiers are applied cumulatively over successive bands of
    /// deferral rate, not as a lookup on the final tier alone.
    pub fn match_rate_for(&self, deferral_rate: Decimal) -> Decimal {
        let mut remaining = deferral_rate;
        let mut floor = Decimal::ZERO;
        let mut total = Decimal::ZERO;
        for tier in &self.tiers {
            if remaining <= Decimal::ZERO {
                break;
            }
            let band_width = tier.deferral_rate_up_to - floor;
            let applied = remaining.min(band_width);
            total += applied * tier.match_rate;
            remaining -= applied;
            floor = tier.deferral_rate_up_to;
        }
        total
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoEnrollmentConfig {
    pub enabled: bool,
    pub default_deferral_rate: Decimal,
    pub opt_out_window_days: i64,
    pub escalation_enabled: bool,
    pub escalation_rate_step: Decimal,
    pub escalation_cap: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityRules {
    pub minimum_age: u32,
    pub minimum_service_months: u32,
    pub immediate_eligibility: bool,
}

/// The retirement plan design referenced by one or more scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDesign {
    pub plan_design_id: String,
    pub eligibility: EligibilityRules,
    pub match_formula: MatchFormula,
    pub nonelective_rate: Decimal,
    pub vesting_schedule: VestingSchedule,
    pub auto_enrollment: AutoEnrollmentConfig,
    pub irs_deferral_limit: Decimal,
    pub irs_catch_up_limit: Decimal,
    pub irs_catch_up_age: u32,
    pub irs_annual_additions_limit: Decimal,
    pub irs_compensation_limit: Decimal,
    pub hce_compensation_threshold: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> VestingSchedule {
        VestingSchedule {
            kind: VestingScheduleKind::Graded,
            entries: vec![
                VestingScheduleEntry { years_of_service: 0, vested_percentage: Decimal::ZERO },
                VestingScheduleEntry { years_of_service: 2, vested_percentage: Decimal::new(20, 2) },
                VestingScheduleEntry { years_of_service: 3, vested_percentage: Decimal::new(40, 2) },
                VestingScheduleEntry { years_of_service: 6, vested_percentage: Decimal::ONE },
            ],
        }
    }

    #[test]
    fn vesting_schedule_uses_highest_applicable_band() {
        let s = schedule();
        assert_eq!(s.vested_percentage_at(1), Decimal::ZERO);
        assert_eq!(s.vested_percentage_at(2), Decimal::new(20, 2));
        assert_eq!(s.vested_percentage_at(5), Decimal::new(40, 2));
        assert_eq!(s.vested_percentage_at(10), Decimal::ONE);
    }

    #[test]
    fn match_formula_applies_tiers_cumulatively() {
        let formula = MatchFormula {
            tiers: vec![
                MatchTier { deferral_rate_up_to: Decimal::new(3, 2), match_rate: Decimal::ONE },
                MatchTier { deferral_rate_up_to: Decimal::new(5, 2), match_rate: Decimal::new(50, 2) },
            ],
        };
        // 4% deferral: 100% of first 3%, 50% of next 1% => 3% + 0.5% = 3.5%
        let result = formula.match_rate_for(Decimal::new(4, 2));
        assert_eq!(result, Decimal::new(35, 3));
    }

    #[test]
    fn scenario_years_iterates_inclusive_range() {
        let scenario = Scenario {
            scenario_id: "S1".into(),
            seed_label: "base".into(),
            start_year: 2025,
            end_year: 2027,
            growth_target: Decimal::new(3, 2),
            growth_tolerance: Decimal::new(2, 2),
            parameter_overrides: HashMap::new(),
            plan_design_id: "P1".into(),
        };
        let years: Vec<i32> = scenario.years().collect();
        assert_eq!(years, vec![2025, 2026, 2027]);
    }
}
