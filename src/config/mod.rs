//! Configuration: scenario descriptor (YAML), parameter tables (CSV), and
//! census input (CSV).

pub mod census;
pub mod loader;
pub mod scenario_descriptor;

pub use loader::LoadedParameterTables;
pub use scenario_descriptor::{NewHireStrategyDescriptor, RaiseTimingMethodology, ScenarioDescriptor};
