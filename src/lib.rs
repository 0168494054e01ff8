//! Deterministic, event-sourced workforce and defined-contribution plan
//! simulation engine.
//!
//! Given a starting census and a scenario (growth target, plan design, raise
//! and promotion policy), the engine produces an immutable event log and
//! year-end snapshots for every year in the scenario's range. Every run is
//! reproducible: the same scenario, census, and parameter tables always
//! produce byte-identical events.

pub mod accumulators;
pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod employee;
pub mod error;
pub mod events;
pub mod generators;
pub mod hazards;
pub mod orchestrator;
pub mod parameters;
pub mod reconciliation;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod validation;

pub use batch::{run_batch, run_scenario, ScenarioOutcome, ScenarioSummary, ScenarioYearInputsFactory};
pub use checkpoint::{build_checkpoint, check_recovery_compatible, Checkpoint, CheckpointStore, RecoveryCheck};
pub use employee::Employee;
pub use error::{SimError, SimResult};
pub use events::{Event, EventPayload};
pub use orchestrator::{run_year, ProgressEvent, Stage, YearInputs, YearResult};
pub use scenario::{PlanDesign, Scenario};
