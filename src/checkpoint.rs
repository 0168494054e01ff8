//! Checkpoint/resume store
//!
//! A checkpoint is content-addressed: its id is a hash of
//! `{config_hash, seed, scenario_id, plan_design_id, year, accumulators,
//! last_event_id}`. Resuming from a checkpoint whose `config_hash` no longer
//! matches the current configuration is refused — `recovery_compatible` is
//! false and the caller must re-run from year zero.

use crate::accumulators::AccumulatorTable;
use crate::employee::Employee;
use crate::error::SimError;
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// One sealed year's worth of resumable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub config_hash: String,
    pub seed_label: String,
    pub scenario_id: String,
    pub plan_design_id: String,
    pub year: i32,
    pub active_employees: Vec<Employee>,
    pub accumulators: AccumulatorTable,
    pub last_event_id: Option<Uuid>,
}

/// Hash a config's canonical JSON serialization with the same keyed hasher
/// used for deterministic sampling, so a config change is
/// detected the moment its serialized shape changes.
pub fn hash_config<T: Serialize>(config: &T) -> Result<String, SimError> {
    let canonical = serde_json::to_vec(config).map_err(|e| SimError::Config {
        message: format!("failed to serialize config for hashing: {e}"),
    })?;
    let mut hasher = SipHasher13::new();
    canonical.hash(&mut hasher);
    Ok(format!("{:016x}", hasher.finish()))
}

/// Build a checkpoint for a sealed year. The checkpoint's own id is derived
/// from its content, so two checkpoints with identical state always collide
/// onto the same id rather than silently diverging.
pub fn build_checkpoint(
    config_hash: &str,
    seed_label: &str,
    scenario_id: &str,
    plan_design_id: &str,
    year: i32,
    active_employees: Vec<Employee>,
    accumulators: AccumulatorTable,
    last_event_id: Option<Uuid>,
) -> Result<Checkpoint, SimError> {
    let mut checkpoint = Checkpoint {
        checkpoint_id: String::new(),
        config_hash: config_hash.to_string(),
        seed_label: seed_label.to_string(),
        scenario_id: scenario_id.to_string(),
        plan_design_id: plan_design_id.to_string(),
        year,
        active_employees,
        accumulators,
        last_event_id,
    };
    checkpoint.checkpoint_id = hash_config(&checkpoint)?;
    Ok(checkpoint)
}

/// Outcome of validating a loaded checkpoint against the current config.
pub struct RecoveryCheck {
    pub recovery_compatible: bool,
    pub reason: Option<String>,
}

/// A checkpoint is only safe to resume from when its `config_hash` matches
/// the current run's. Any mismatch — scenario edited, hazard table updated,
/// plan design amended — refuses the resume rather than silently mixing
/// state from two configurations.
pub fn check_recovery_compatible(checkpoint: &Checkpoint, current_config_hash: &str) -> RecoveryCheck {
    if checkpoint.config_hash != current_config_hash {
        return RecoveryCheck {
            recovery_compatible: false,
            reason: Some(format!(
                "checkpoint config_hash {} does not match current config_hash {current_config_hash}",
                checkpoint.config_hash
            )),
        };
    }
    RecoveryCheck { recovery_compatible: true, reason: None }
}

/// An in-memory, path-addressed checkpoint directory. Production deployments
/// would back this with object storage; the interface is intentionally the
/// same shape either way.
#[derive(Debug, Default)]
pub struct CheckpointStore {
    entries: std::collections::HashMap<String, Checkpoint>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, checkpoint: Checkpoint) {
        self.entries.insert(checkpoint.checkpoint_id.clone(), checkpoint);
    }

    pub fn get(&self, checkpoint_id: &str) -> Option<&Checkpoint> {
        self.entries.get(checkpoint_id)
    }

    /// The most recent checkpoint for a scenario, by year.
    pub fn latest_for_scenario(&self, scenario_id: &str) -> Option<&Checkpoint> {
        self.entries
            .values()
            .filter(|c| c.scenario_id == scenario_id)
            .max_by_key(|c| c.year)
    }

    pub fn remove(&mut self, checkpoint_id: &str) -> Option<Checkpoint> {
        self.entries.remove(checkpoint_id)
    }

    /// Drop every checkpoint for a scenario older than `keep_from_year`.
    pub fn cleanup_before(&mut self, scenario_id: &str, keep_from_year: i32) {
        self.entries.retain(|_, c| c.scenario_id != scenario_id || c.year >= keep_from_year);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulators::AccumulatorTable;

    #[test]
    fn identical_content_produces_identical_checkpoint_id() {
        let a = build_checkpoint("cfg1", "seed", "S1", "P1", 2025, vec![], AccumulatorTable::new(), None).unwrap();
        let b = build_checkpoint("cfg1", "seed", "S1", "P1", 2025, vec![], AccumulatorTable::new(), None).unwrap();
        assert_eq!(a.checkpoint_id, b.checkpoint_id);
    }

    #[test]
    fn config_hash_mismatch_is_incompatible() {
        let checkpoint = build_checkpoint("cfg1", "seed", "S1", "P1", 2025, vec![], AccumulatorTable::new(), None).unwrap();
        let check = check_recovery_compatible(&checkpoint, "cfg2");
        assert!(!check.recovery_compatible);
        assert!(check.reason.is_some());
    }

    #[test]
    fn store_returns_latest_checkpoint_by_year() {
        let mut store = CheckpointStore::new();
        store.insert(build_checkpoint("cfg1", "seed", "S1", "P1", 2024, vec![], AccumulatorTable::new(), None).unwrap());
        store.insert(build_checkpoint("cfg1", "seed", "S1", "P1", 2026, vec![], AccumulatorTable::new(), None).unwrap());
        let latest = store.latest_for_scenario("S1").unwrap();
        assert_eq!(latest.year, 2026);
    }

    #[test]
    fn cleanup_before_drops_older_years_only() {
        let mut store = CheckpointStore::new();
        store.insert(build_checkpoint("cfg1", "seed", "S1", "P1", 2024, vec![], AccumulatorTable::new(), None).unwrap());
        store.insert(build_checkpoint("cfg1", "seed", "S1", "P1", 2026, vec![], AccumulatorTable::new(), None).unwrap());
        store.cleanup_before("S1", 2026);
        assert_eq!(store.len(), 1);
        assert_eq!(store.latest_for_scenario("S1").unwrap().year, 2026);
    }
}
