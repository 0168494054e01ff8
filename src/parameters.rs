//! Parameter resolver
//!
//! Three layered sources feed one effective view: seed defaults, scenario
//! overrides, and year-indexed lever rows. Precedence is lever row >
//! scenario override > seed default.

use crate::error::SimError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single `(scenario_id, fiscal_year, event_type, parameter_name, job_level?)`
/// override row loaded from the comp-lever table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeverRow {
    pub scenario_id: String,
    pub fiscal_year: i32,
    pub event_type: String,
    pub parameter_name: String,
    pub job_level: Option<u8>,
    pub parameter_value: Decimal,
}

/// Seed defaults, indexed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct SeedDefaults {
    pub values: HashMap<String, Decimal>,
}

/// Per-scenario overrides, indexed by parameter name. Does not vary by year
/// or level; a lever row is required for that.
#[derive(Debug, Clone, Default)]
pub struct ScenarioOverrides {
    pub values: HashMap<String, Decimal>,
}

/// The resolved parameter view for one `(scenario, year, level?)` triple.
#[derive(Debug, Clone, Default)]
pub struct EffectiveParameters {
    resolved: HashMap<String, Decimal>,
}

impl EffectiveParameters {
    pub fn get(&self, name: &str) -> Result<Decimal, SimError> {
        self.resolved
            .get(name)
            .copied()
            .ok_or_else(|| SimError::Config {
                message: format!("missing required parameter: {name}"),
            })
    }

    pub fn get_or(&self, name: &str, default: Decimal) -> Decimal {
        self.resolved.get(name).copied().unwrap_or(default)
    }
}

fn lever_key(level: Option<u8>, name: &str) -> String {
    match level {
        Some(l) => format!("{name}@{l}"),
        None => name.to_string(),
    }
}

/// Resolve the effective parameters for `(scenario_id, year, level)`.
///
/// `level` narrows lever rows scoped to a specific job level; rows with no
/// `job_level` apply to every level.
pub fn resolve(
    seed: &SeedDefaults,
    overrides: &ScenarioOverrides,
    levers: &[LeverRow],
    scenario_id: &str,
    year: i32,
    level: Option<u8>,
) -> EffectiveParameters {
    let mut resolved = seed.values.clone();

    for (name, value) in &overrides.values {
        resolved.insert(name.clone(), *value);
    }

    for row in levers {
        if row.scenario_id != scenario_id || row.fiscal_year != year {
            continue;
        }
        if let Some(row_level) = row.job_level {
            if Some(row_level) != level {
                continue;
            }
        }
        let key = lever_key(row.job_level, &row.parameter_name);
        resolved.insert(key, row.parameter_value);
        // A level-scoped lever also satisfies an unscoped lookup of the same
        // name when a level was requested, so level-specific overrides win.
        if row.job_level.is_some() {
            resolved.insert(row.parameter_name.clone(), row.parameter_value);
        }
    }

    EffectiveParameters { resolved }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lever_row_beats_scenario_override_beats_seed_default() {
        let mut seed = SeedDefaults::default();
        seed.values.insert("p_term".into(), Decimal::new(10, 2));

        let mut overrides = ScenarioOverrides::default();
        overrides.values.insert("p_term".into(), Decimal::new(11, 2));

        let levers = vec![LeverRow {
            scenario_id: "S1".into(),
            fiscal_year: 2025,
            event_type: "termination".into(),
            parameter_name: "p_term".into(),
            job_level: None,
            parameter_value: Decimal::new(12, 2),
        }];

        let params = resolve(&seed, &overrides, &levers, "S1", 2025, None);
        assert_eq!(params.get("p_term").unwrap(), Decimal::new(12, 2));
    }

    #[test]
    fn scenario_override_beats_seed_default_with_no_lever() {
        let mut seed = SeedDefaults::default();
        seed.values.insert("p_term".into(), Decimal::new(10, 2));

        let mut overrides = ScenarioOverrides::default();
        overrides.values.insert("p_term".into(), Decimal::new(11, 2));

        let params = resolve(&seed, &overrides, &[], "S1", 2025, None);
        assert_eq!(params.get("p_term").unwrap(), Decimal::new(11, 2));
    }

    #[test]
    fn missing_required_parameter_is_config_error() {
        let params = resolve(
            &SeedDefaults::default(),
            &ScenarioOverrides::default(),
            &[],
            "S1",
            2025,
            None,
        );
        let err = params.get("nonexistent").unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
    }

    #[test]
    fn lever_row_for_different_year_is_ignored() {
        let seed = SeedDefaults::default();
        let overrides = ScenarioOverrides::default();
        let levers = vec![LeverRow {
            scenario_id: "S1".into(),
            fiscal_year: 2026,
            event_type: "termination".into(),
            parameter_name: "p_term".into(),
            job_level: None,
            parameter_value: Decimal::new(12, 2),
        }];
        let params = resolve(&seed, &overrides, &levers, "S1", 2025, None);
        assert!(params.get("p_term").is_err());
    }
}
