//! Batch skill evaluator for the flood-notification service.
//!
//! Loads the run configuration, station table and per-station input
//! directories, runs the align / combine / detect / tabulate pipeline in
//! parallel over stations, optimizes the notification criteria per
//! stratum and writes the confusion tables, the optimized criteria and
//! the comparison report under the output directory. Station failures
//! are collected and summarized at the end; the run only fails when the
//! configuration is invalid or every station failed.

mod inputs;

use std::fs::{self, File};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use skill_common::{SkillConfig, SkillError};
use skill_engine::{
    comparison_table, optimize, tabulate_all, write_comparison_csv, StationInput,
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use inputs::{load_brier, load_station_input, load_stations};

#[derive(Parser, Debug)]
#[command(name = "evaluator")]
#[command(about = "Notification-skill evaluator for flood forecasts")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/evaluator/config.yaml")]
    config: String,

    /// Station table (JSON)
    #[arg(short, long)]
    stations: String,

    /// Directory holding observed series and forecast tensors
    #[arg(short, long)]
    input_dir: String,

    /// Output directory
    #[arg(short, long, default_value = "out")]
    out_dir: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting skill evaluation");
    let config = SkillConfig::from_yaml(&args.config).context("loading configuration")?;
    run(
        &config,
        Path::new(&args.stations),
        Path::new(&args.input_dir),
        Path::new(&args.out_dir),
    )
}

fn run(
    config: &SkillConfig,
    stations_path: &Path,
    input_dir: &Path,
    out_dir: &Path,
) -> Result<()> {
    let stations = load_stations(stations_path).context("loading station table")?;
    let in_scope = stations.in_scope(config.min_area_km2);
    info!(
        total = stations.len(),
        in_scope = in_scope.len(),
        min_area_km2 = config.min_area_km2,
        "loaded station table"
    );
    if in_scope.is_empty() {
        bail!("no station reaches the configured minimum catchment area");
    }

    let brier = load_brier(&input_dir.join("brier.json")).context("loading Brier matrix")?;

    // load and align in parallel; a failing station does not stop the run
    let loaded: Vec<Result<StationInput, SkillError>> = in_scope
        .par_iter()
        .map(|&station| {
            load_station_input(station, input_dir, config).map_err(|source| {
                warn!(
                    station = %station.id,
                    error = %source,
                    "failed to load station, continuing"
                );
                SkillError::station_failed(&station.id, source)
            })
        })
        .collect();
    let mut inputs = Vec::new();
    let mut failures = Vec::new();
    for result in loaded {
        match result {
            Ok(input) => inputs.push(input),
            Err(err) => failures.push(err),
        }
    }

    let (tables, tabulate_failures) = tabulate_all(&inputs, config, brier.as_ref());
    failures.extend(tabulate_failures);
    if tables.is_empty() {
        error!(failed = failures.len(), "every station failed");
        bail!("no station produced a confusion table");
    }

    let confusion_dir = out_dir.join("confusion");
    fs::create_dir_all(&confusion_dir)?;
    for table in &tables {
        let path = confusion_dir.join(format!("{}.json", table.station));
        serde_json::to_writer_pretty(File::create(path)?, table)?;
    }

    let results = optimize(&tables, config)?;
    serde_json::to_writer_pretty(File::create(out_dir.join("optimized.json"))?, &results)?;

    let rows = comparison_table(&results);
    let mut csv = File::create(out_dir.join("comparison.csv"))?;
    write_comparison_csv(&rows, &mut csv)?;

    info!(
        stations = tables.len(),
        strata = results.len(),
        failed = failures.len(),
        "skill evaluation complete"
    );
    for failure in &failures {
        warn!(error = %failure, "station failed");
    }
    Ok(())
}
