//! Parameter table CSV loaders
//!
//! One function per table, aggregated into `LoadedParameterTables`.

use crate::error::SimError;
use crate::parameters::LeverRow;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_PARAMETERS_PATH: &str = "data/parameters";

#[derive(Debug, serde::Deserialize)]
struct JobLevelBandRow {
    job_level: u8,
    title: String,
    compensation_floor: Decimal,
    compensation_ceiling: Decimal,
}

/// A job-level band: title plus the compensation range that level spans.
#[derive(Debug, Clone)]
pub struct JobLevelBand {
    pub job_level: u8,
    pub title: String,
    pub compensation_floor: Decimal,
    pub compensation_ceiling: Decimal,
}

pub fn load_job_level_bands(path: &Path) -> Result<Vec<JobLevelBand>, SimError> {
    let mut reader = csv::Reader::from_path(path.join("job_level_bands.csv"))?;
    let mut bands = Vec::new();
    for result in reader.deserialize() {
        let row: JobLevelBandRow = result?;
        bands.push(JobLevelBand {
            job_level: row.job_level,
            title: row.title,
            compensation_floor: row.compensation_floor,
            compensation_ceiling: row.compensation_ceiling,
        });
    }
    Ok(bands)
}

#[derive(Debug, serde::Deserialize)]
struct HazardBaseRow {
    job_level: u8,
    age_band: String,
    tenure_band: String,
    termination_rate: Decimal,
}

pub fn load_termination_hazard_base(path: &Path) -> Result<Vec<HazardBaseRow>, SimError> {
    let mut reader = csv::Reader::from_path(path.join("termination_hazard_base.csv"))?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

#[derive(Debug, serde::Deserialize)]
struct PromotionHazardRow {
    job_level: u8,
    age_band: String,
    tenure_band: String,
    promotion_rate: Decimal,
}

pub fn load_promotion_hazard_base(path: &Path) -> Result<Vec<HazardBaseRow>, SimError> {
    let mut reader = csv::Reader::from_path(path.join("promotion_hazard_base.csv"))?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: PromotionHazardRow = result?;
        rows.push(HazardBaseRow {
            job_level: row.job_level,
            age_band: row.age_band,
            tenure_band: row.tenure_band,
            termination_rate: row.promotion_rate,
        });
    }
    Ok(rows)
}

#[derive(Debug, serde::Deserialize)]
struct LeverCsvRow {
    scenario_id: String,
    fiscal_year: i32,
    event_type: String,
    parameter_name: String,
    job_level: Option<u8>,
    parameter_value: Decimal,
    #[allow(dead_code)]
    locked: Option<bool>,
}

pub fn load_comp_levers(path: &Path) -> Result<Vec<LeverRow>, SimError> {
    let mut reader = csv::Reader::from_path(path.join("comp_levers.csv"))?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: LeverCsvRow = result?;
        rows.push(LeverRow {
            scenario_id: row.scenario_id,
            fiscal_year: row.fiscal_year,
            event_type: row.event_type,
            parameter_name: row.parameter_name,
            job_level: row.job_level,
            parameter_value: row.parameter_value,
        });
    }
    Ok(rows)
}

/// Every CSV-backed parameter table, loaded once per run and shared
/// immutably across scenarios and worker threads.
#[derive(Debug, Clone)]
pub struct LoadedParameterTables {
    pub job_level_bands: Vec<JobLevelBand>,
    pub termination_hazard_base: HashMap<(u8, String, String), Decimal>,
    pub promotion_hazard_base: HashMap<(u8, String, String), Decimal>,
    pub comp_levers: Vec<LeverRow>,
}

impl LoadedParameterTables {
    pub fn load_default() -> Result<Self, SimError> {
        Self::load_from(Path::new(DEFAULT_PARAMETERS_PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self, SimError> {
        let job_level_bands = load_job_level_bands(path)?;
        let termination_hazard_base = load_termination_hazard_base(path)?
            .into_iter()
            .map(|r| ((r.job_level, r.age_band, r.tenure_band), r.termination_rate))
            .collect();
        let promotion_hazard_base = load_promotion_hazard_base(path)?
            .into_iter()
            .map(|r| ((r.job_level, r.age_band, r.tenure_band), r.termination_rate))
            .collect();
        let comp_levers = load_comp_levers(path)?;

        Ok(Self {
            job_level_bands,
            termination_hazard_base,
            promotion_hazard_base,
            comp_levers,
        })
    }
}
