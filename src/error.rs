//! Error taxonomy for the simulation engine

use thiserror::Error;

/// All fatal and non-fatal error kinds the engine can produce.
///
/// Non-fatal: `DataQualityWarning`. Everything else aborts the run or the
/// current year, per the engine's error propagation rules.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("config error: {message}")]
    Config { message: String },

    #[error("validation failed for employee {employee_id} field {field}: {reason}")]
    Validation {
        employee_id: String,
        field: String,
        reason: String,
    },

    #[error("no hazard band for level={level} age_band={age_band} tenure_band={tenure_band}")]
    HazardMiss {
        level: u8,
        age_band: String,
        tenure_band: String,
    },

    #[error("checkpoint incompatible: config_hash mismatch (expected {expected}, found {found})")]
    CheckpointIncompatible { expected: String, found: String },

    #[error("growth reconciliation failed in year {year}: active_end={active_end} target_end={target_end} (drift {drift} exceeds tolerance)")]
    GrowthReconciliationFailure {
        year: i32,
        active_end: i64,
        target_end: i64,
        drift: i64,
    },

    #[error("data quality warning for employee {employee_id}: {message}")]
    DataQualityWarning {
        employee_id: String,
        message: String,
    },

    #[error("run cancelled at scenario {scenario_id} year {year}")]
    Cancelled { scenario_id: String, year: i32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Map to the process exit code the CLI surface uses.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimError::Validation { .. } => 2,
            SimError::Config { .. } => 3,
            SimError::CheckpointIncompatible { .. } => 4,
            _ => 1,
        }
    }

    /// `true` for errors that are never recoverable within a year, per §7.
    pub fn is_always_fatal(&self) -> bool {
        matches!(
            self,
            SimError::HazardMiss { .. } | SimError::GrowthReconciliationFailure { .. }
        )
    }
}

pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_cli_contract() {
        assert_eq!(
            SimError::Validation {
                employee_id: "1".into(),
                field: "x".into(),
                reason: "y".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(
            SimError::Config { message: "missing".into() }.exit_code(),
            3
        );
        assert_eq!(
            SimError::CheckpointIncompatible {
                expected: "a".into(),
                found: "b".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(
            SimError::Cancelled { scenario_id: "s".into(), year: 2025 }.exit_code(),
            1
        );
    }

    #[test]
    fn hazard_miss_and_growth_failure_are_always_fatal() {
        let hm = SimError::HazardMiss {
            level: 3,
            age_band: "30-39".into(),
            tenure_band: "0-2".into(),
        };
        assert!(hm.is_always_fatal());

        let gr = SimError::GrowthReconciliationFailure {
            year: 2025,
            active_end: 1032,
            target_end: 1030,
            drift: 2,
        };
        assert!(gr.is_always_fatal());

        let dq = SimError::DataQualityWarning {
            employee_id: "1".into(),
            message: "dropped row".into(),
        };
        assert!(!dq.is_always_fatal());
    }
}
