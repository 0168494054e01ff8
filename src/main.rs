//! Workforce simulation CLI
//!
//! `simulate` runs one scenario end to end; `batch` runs several in parallel;
//! `checkpoints` inspects and prunes the checkpoint store; `validate` loads a
//! scenario descriptor and reports config errors without running a year.

use clap::{Parser, Subcommand};
use log::{error, info};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use workforce_sim::checkpoint::{check_recovery_compatible, hash_config, Checkpoint, CheckpointStore};
use workforce_sim::config::census::load_census;
use workforce_sim::config::loader::LoadedParameterTables;
use workforce_sim::config::scenario_descriptor::{load_scenario_descriptor, ScenarioDescriptor};
use workforce_sim::employee::Employee;
use workforce_sim::error::SimError;
use workforce_sim::generators::hire::{DepartmentDistribution, JobLevelDistribution, NewHireCompensationStrategy};
use workforce_sim::generators::merit::{MonthDistribution, RaiseTimingMethodology};
use workforce_sim::generators::promotion::PromotionConfig;
use workforce_sim::hazards::{AgeBand, HazardTable, TenureBand};
use workforce_sim::orchestrator::{YearInputs, ProgressEvent};
use workforce_sim::parameters::{resolve, EffectiveParameters, LeverRow, ScenarioOverrides, SeedDefaults};
use workforce_sim::scenario::{PlanDesign, Scenario};
use workforce_sim::accumulators::AccumulatorTable;
use workforce_sim::{run_batch, run_scenario, ScenarioOutcome, ScenarioYearInputsFactory};

#[derive(Parser)]
#[command(name = "workforce_sim", about = "Deterministic workforce and DC-plan simulation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Census CSV, point-in-time as of Y0 - 1.
    #[arg(long, global = true, default_value = "data/census.csv")]
    census: PathBuf,

    /// Parameter table directory (job-level bands, hazard bases, comp levers).
    #[arg(long, global = true, default_value = "data/parameters")]
    parameters: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scenario from `start` to `end`.
    Simulate {
        #[arg(long)]
        start: i32,
        #[arg(long)]
        end: i32,
        #[arg(long)]
        scenario: PathBuf,
    },
    /// Run every scenario descriptor under `scenarios` in parallel.
    Batch {
        #[arg(long)]
        scenarios: PathBuf,
    },
    #[command(subcommand)]
    Checkpoints(CheckpointCommand),
    /// Load and validate a scenario descriptor without running a year.
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum CheckpointCommand {
    /// List every checkpoint in `dir`.
    List {
        #[arg(long)]
        dir: PathBuf,
    },
    /// Check whether `checkpoint` can resume against `config`.
    Restore {
        #[arg(long)]
        checkpoint: PathBuf,
        #[arg(long)]
        config: PathBuf,
    },
    /// Drop every checkpoint for `scenario` older than `keep_from_year`.
    Cleanup {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        scenario: String,
        #[arg(long)]
        keep_from_year: i32,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        error!("{err}");
        std::process::exit(err.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), SimError> {
    match cli.command {
        Commands::Simulate { start, end, scenario } => simulate(&cli.census, &cli.parameters, &scenario, start, end),
        Commands::Batch { scenarios } => batch(&cli.census, &cli.parameters, &scenarios),
        Commands::Checkpoints(cmd) => checkpoints(cmd),
        Commands::Validate { config } => validate(&config),
    }
}

/// Load a scenario descriptor, wrapping any I/O or parse failure as a config
/// error so the CLI boundary always exits 3 on a bad scenario file.
fn load_config(path: &Path) -> Result<ScenarioDescriptor, SimError> {
    load_scenario_descriptor(path).map_err(|e| SimError::Config { message: format!("{path:?}: {e}") })
}

fn simulate(census_path: &Path, parameters_path: &Path, scenario_path: &Path, start: i32, end: i32) -> Result<(), SimError> {
    let descriptor = load_config(scenario_path)?;
    let tables = LoadedParameterTables::load_from(parameters_path)?;
    let census = load_census(census_path)?;

    let mut scenario = descriptor.into_scenario();
    scenario.start_year = start;
    scenario.end_year = end;

    let factory = CensusBackedFactory::new(&descriptor, &scenario, &tables, &census)?;

    let (tx, rx) = mpsc::channel();
    let logger = spawn_progress_logger(rx);
    let outcome = run_scenario(&scenario, &factory, census, AccumulatorTable::new(), &tx);
    drop(tx);
    logger.join().ok();

    let outcome = outcome?;
    report(&outcome);
    Ok(())
}

fn batch(census_path: &Path, parameters_path: &Path, scenarios_dir: &Path) -> Result<(), SimError> {
    let tables = LoadedParameterTables::load_from(parameters_path)?;
    let census = load_census(census_path)?;

    let mut descriptors = Vec::new();
    for entry in std::fs::read_dir(scenarios_dir)? {
        let entry = entry?;
        if entry.path().extension().map(|e| e == "yaml" || e == "yml").unwrap_or(false) {
            descriptors.push(load_config(&entry.path())?);
        }
    }

    let scenarios: Vec<Scenario> = descriptors.iter().map(|d| d.into_scenario()).collect();
    let factories: Result<Vec<CensusBackedFactory>, SimError> = descriptors
        .iter()
        .zip(&scenarios)
        .map(|(descriptor, scenario)| CensusBackedFactory::new(descriptor, scenario, &tables, &census))
        .collect();
    let factories = factories?;

    let factory = MultiScenarioFactory { by_scenario: factories.into_iter().map(|f| (f.scenario_id.clone(), f)).collect() };

    let loggers: std::sync::Mutex<HashMap<String, (Sender<ProgressEvent>, thread::JoinHandle<()>)>> =
        std::sync::Mutex::new(HashMap::new());
    let outcomes = run_batch(&scenarios, &factory, &census, |scenario_id| {
        let (tx, rx) = mpsc::channel();
        let handle = spawn_progress_logger(rx);
        loggers.lock().unwrap().insert(scenario_id.to_string(), (tx.clone(), handle));
        tx
    });

    for (_, (tx, handle)) in loggers.into_inner().unwrap() {
        drop(tx);
        handle.join().ok();
    }

    let mut failures = 0;
    for outcome in outcomes {
        match outcome {
            Ok(outcome) => report(&outcome),
            Err(err) => {
                error!("scenario failed: {err}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(SimError::Validation {
            employee_id: String::new(),
            field: "batch".to_string(),
            reason: format!("{failures} scenario(s) failed"),
        });
    }
    Ok(())
}

fn checkpoints(cmd: CheckpointCommand) -> Result<(), SimError> {
    match cmd {
        CheckpointCommand::List { dir } => {
            for checkpoint in load_checkpoint_dir(&dir)? {
                println!(
                    "{} scenario={} year={} active={}",
                    checkpoint.checkpoint_id,
                    checkpoint.scenario_id,
                    checkpoint.year,
                    checkpoint.active_employees.len()
                );
            }
            Ok(())
        }
        CheckpointCommand::Restore { checkpoint, config } => {
            let checkpoint = load_checkpoint_file(&checkpoint)?;
            let descriptor = load_config(&config)?;
            let current_hash = hash_config(&descriptor)?;
            let check = check_recovery_compatible(&checkpoint, &current_hash);
            if !check.recovery_compatible {
                if let Some(reason) = check.reason {
                    error!("{reason}");
                }
                return Err(SimError::CheckpointIncompatible { expected: current_hash, found: checkpoint.config_hash });
            }
            info!("checkpoint {} is compatible, resuming at year {}", checkpoint.checkpoint_id, checkpoint.year);
            Ok(())
        }
        CheckpointCommand::Cleanup { dir, scenario, keep_from_year } => {
            let mut store = CheckpointStore::new();
            for checkpoint in load_checkpoint_dir(&dir)? {
                store.insert(checkpoint);
            }
            let before = store.len();
            store.cleanup_before(&scenario, keep_from_year);
            info!("dropped {} checkpoint(s) for {scenario} before year {keep_from_year}", before - store.len());
            Ok(())
        }
    }
}

fn load_checkpoint_dir(dir: &Path) -> Result<Vec<Checkpoint>, SimError> {
    let mut checkpoints = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
            checkpoints.push(load_checkpoint_file(&entry.path())?);
        }
    }
    Ok(checkpoints)
}

fn load_checkpoint_file(path: &Path) -> Result<Checkpoint, SimError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn validate(config: &Path) -> Result<(), SimError> {
    let descriptor = load_config(config)?;
    let _ = descriptor.into_plan_design();
    println!("{config:?}: valid");
    Ok(())
}

fn report(outcome: &ScenarioOutcome) {
    let summary = &outcome.summary;
    println!(
        "{}: final_year={} headcount={} avg_comp={} enrollment_rate={} turnover_events={}",
        summary.scenario_id,
        summary.final_year,
        summary.final_headcount,
        summary.average_compensation,
        summary.enrollment_rate,
        summary.turnover_events
    );
}

fn spawn_progress_logger(receiver: Receiver<ProgressEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for event in receiver {
            match event {
                ProgressEvent::StatusUpdate { year, message } => info!("[{year}] {message}"),
                ProgressEvent::StageComplete { year, stage } => info!("[{year}] stage complete: {stage}"),
                ProgressEvent::EventGenerated { year, count } => info!("[{year}] generated {count} events"),
                ProgressEvent::YearComplete { year, active_end } => info!("[{year}] sealed, active_end={active_end}"),
                ProgressEvent::Error { year, message } => error!("[{year}] {message}"),
                ProgressEvent::Complete { scenario_id } => info!("scenario {scenario_id} complete"),
            }
        }
    })
}

/// Everything resolved once per scenario year from the scenario descriptor
/// and loaded parameter tables, so `year_inputs` only indexes into owned
/// data rather than re-resolving parameters on every call.
struct YearlyResolved {
    params: EffectiveParameters,
    merit_rate_by_level: HashMap<u8, Decimal>,
    promotion_config: PromotionConfig,
    growth_target: Decimal,
    p_nh_term: Decimal,
    cola_rate: Decimal,
    opt_out_base_rate: Decimal,
    first_escalation_delay_years: u32,
}

struct CensusBackedFactory {
    scenario_id: String,
    plan_design: PlanDesign,
    termination_hazards: HazardTable,
    promotion_hazards: HazardTable,
    departments: DepartmentDistribution,
    job_levels: JobLevelDistribution,
    new_hire_compensation: NewHireCompensationStrategy,
    month_distribution: MonthDistribution,
    raise_timing: RaiseTimingMethodology,
    by_year: HashMap<i32, YearlyResolved>,
}

const DEFAULT_MERIT_RATE: Decimal = Decimal::new(3, 2); // 0.03
const DEFAULT_P_NH_TERM: Decimal = Decimal::new(25, 2); // 0.25
const DEFAULT_OPT_OUT_BASE_RATE: Decimal = Decimal::new(10, 2); // 0.10
const DEFAULT_PROMOTION_BASE_INCREASE: Decimal = Decimal::new(8, 2); // 0.08
const DEFAULT_PROMOTION_JITTER: Decimal = Decimal::new(2, 2); // 0.02
const DEFAULT_PROMOTION_CAP_PCT: Decimal = Decimal::new(25, 2); // 0.25

impl CensusBackedFactory {
    fn new(
        descriptor: &ScenarioDescriptor,
        scenario: &Scenario,
        tables: &LoadedParameterTables,
        census: &[Employee],
    ) -> Result<Self, SimError> {
        let plan_design = descriptor.into_plan_design();
        let termination_hazards = banded_hazard_table(&tables.termination_hazard_base)?;
        let promotion_hazards = banded_hazard_table(&tables.promotion_hazard_base)?;
        let departments = department_distribution(census);
        let (job_levels, new_hire_compensation) = new_hire_strategy(descriptor, tables);
        let month_distribution = uniform_month_distribution();
        let raise_timing = match descriptor.raise_timing_methodology {
            workforce_sim::config::RaiseTimingMethodology::Legacy => RaiseTimingMethodology::Legacy,
            workforce_sim::config::RaiseTimingMethodology::Realistic => RaiseTimingMethodology::Realistic,
        };

        let seed = SeedDefaults::default();
        let overrides = ScenarioOverrides { values: scenario.parameter_overrides.clone() };
        let levers: Vec<LeverRow> = tables
            .comp_levers
            .iter()
            .filter(|row| row.scenario_id == scenario.scenario_id)
            .cloned()
            .collect();

        let mut by_year = HashMap::new();
        for year in scenario.years() {
            let params = resolve(&seed, &overrides, &levers, &scenario.scenario_id, year, None);
            let merit_rate_by_level = (1..=10u8)
                .map(|level| {
                    let level_params = resolve(&seed, &overrides, &levers, &scenario.scenario_id, year, Some(level));
                    (level, level_params.get_or("merit_rate", DEFAULT_MERIT_RATE))
                })
                .collect();
            let promotion_config = PromotionConfig {
                base_increase: params.get_or("promotion_base_increase", DEFAULT_PROMOTION_BASE_INCREASE),
                jitter_range: params.get_or("promotion_jitter_range", DEFAULT_PROMOTION_JITTER),
                max_cap_pct: params.get_or("promotion_max_cap_pct", DEFAULT_PROMOTION_CAP_PCT),
                max_cap_amount: params.get_or("promotion_max_cap_amount", Decimal::new(50_000_00, 2)),
            };
            by_year.insert(
                year,
                YearlyResolved {
                    growth_target: params.get_or("growth_target", scenario.growth_target),
                    p_nh_term: params.get_or("p_nh_term", DEFAULT_P_NH_TERM),
                    cola_rate: params.get_or("cola_rate", Decimal::ZERO),
                    opt_out_base_rate: params.get_or("opt_out_base_rate", DEFAULT_OPT_OUT_BASE_RATE),
                    first_escalation_delay_years: params
                        .get_or("first_escalation_delay_years", Decimal::ONE)
                        .to_string()
                        .parse()
                        .unwrap_or(1),
                    params,
                    merit_rate_by_level,
                    promotion_config,
                },
            );
        }

        Ok(Self {
            scenario_id: scenario.scenario_id.clone(),
            plan_design,
            termination_hazards,
            promotion_hazards,
            departments,
            job_levels,
            new_hire_compensation,
            month_distribution,
            raise_timing,
            by_year,
        })
    }
}

impl ScenarioYearInputsFactory for CensusBackedFactory {
    fn year_inputs(&self, scenario: &Scenario, year: i32) -> Result<YearInputs<'_>, SimError> {
        let resolved = self.by_year.get(&year).ok_or_else(|| SimError::Config {
            message: format!("year {year} is outside scenario {} range", scenario.scenario_id),
        })?;
        Ok(YearInputs {
            scenario_id: &self.scenario_id,
            year,
            params: &resolved.params,
            termination_hazards: &self.termination_hazards,
            promotion_hazards: &self.promotion_hazards,
            plan_design: &self.plan_design,
            departments: &self.departments,
            job_levels: &self.job_levels,
            new_hire_compensation: &self.new_hire_compensation,
            promotion_config: &resolved.promotion_config,
            merit_rate_by_level: &resolved.merit_rate_by_level,
            cola_rate: resolved.cola_rate,
            raise_timing: self.raise_timing,
            month_distribution: &self.month_distribution,
            growth_target: resolved.growth_target,
            p_nh_term: resolved.p_nh_term,
            opt_out_base_rate: resolved.opt_out_base_rate,
            first_escalation_delay_years: resolved.first_escalation_delay_years,
        })
    }
}

/// Dispatches to the per-scenario factory for `batch`, where each scenario
/// carries its own resolved parameters and hazard tables.
struct MultiScenarioFactory {
    by_scenario: HashMap<String, CensusBackedFactory>,
}

impl ScenarioYearInputsFactory for MultiScenarioFactory {
    fn year_inputs(&self, scenario: &Scenario, year: i32) -> Result<YearInputs<'_>, SimError> {
        let factory = self.by_scenario.get(&scenario.scenario_id).ok_or_else(|| SimError::Config {
            message: format!("no resolved factory for scenario {}", scenario.scenario_id),
        })?;
        factory.year_inputs(scenario, year)
    }
}

fn banded_hazard_table(base: &HashMap<(u8, String, String), Decimal>) -> Result<HazardTable, SimError> {
    let mut rows = Vec::with_capacity(base.len());
    for ((level, age_label, tenure_label), rate) in base {
        let age_band = AgeBand::from_label(age_label).ok_or_else(|| SimError::Config {
            message: format!("unknown age band label: {age_label}"),
        })?;
        let tenure_band = TenureBand::from_label(tenure_label).ok_or_else(|| SimError::Config {
            message: format!("unknown tenure band label: {tenure_label}"),
        })?;
        rows.push((*level, age_band, tenure_band, *rate));
    }
    HazardTable::from_rows(rows)
}

/// Departments and their relative weight, derived from the census's actual
/// department counts rather than a configured distribution.
fn department_distribution(census: &[Employee]) -> DepartmentDistribution {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for employee in census {
        *counts.entry(employee.department.clone()).or_insert(0) += 1;
    }
    let mut weights: Vec<(String, Decimal)> =
        counts.into_iter().map(|(dept, count)| (dept, Decimal::from(count))).collect();
    weights.sort_by(|a, b| a.0.cmp(&b.0));
    if weights.is_empty() {
        weights.push(("Unassigned".to_string(), Decimal::ONE));
    }
    DepartmentDistribution { weights }
}

fn new_hire_strategy(
    descriptor: &ScenarioDescriptor,
    tables: &LoadedParameterTables,
) -> (JobLevelDistribution, NewHireCompensationStrategy) {
    match &descriptor.new_hire_strategy {
        workforce_sim::config::NewHireStrategyDescriptor::Percentile { percentiles_by_level } => {
            let weights: Vec<(u8, Decimal)> = percentiles_by_level.iter().map(|(l, w)| (*l, *w)).collect();
            let band_floor_by_level: HashMap<u8, Decimal> =
                tables.job_level_bands.iter().map(|b| (b.job_level, b.compensation_floor)).collect();
            let band_ceiling_by_level: HashMap<u8, Decimal> =
                tables.job_level_bands.iter().map(|b| (b.job_level, b.compensation_ceiling)).collect();
            (
                JobLevelDistribution { weights },
                NewHireCompensationStrategy::Percentile {
                    band_floor_by_level,
                    band_ceiling_by_level,
                    new_hire_salary_adjustment: Decimal::ZERO,
                },
            )
        }
        workforce_sim::config::NewHireStrategyDescriptor::Fixed { amounts_by_level } => {
            let weights: Vec<(u8, Decimal)> = amounts_by_level.keys().map(|l| (*l, Decimal::ONE)).collect();
            (
                JobLevelDistribution { weights },
                NewHireCompensationStrategy::Fixed { amount_by_level: amounts_by_level.clone() },
            )
        }
    }
}

/// No month-distribution input exists in the scenario descriptor or
/// parameter tables, so raise timing under `realistic` methodology spreads
/// uniformly across the calendar year.
fn uniform_month_distribution() -> MonthDistribution {
    MonthDistribution { weights: [Decimal::ONE / Decimal::from(12); 12] }
}
