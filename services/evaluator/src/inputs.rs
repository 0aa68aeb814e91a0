//! JSON data contracts consumed by the evaluator.
//!
//! Upstream collaborators (discharge extraction, exceedance flagging)
//! deliver one directory per run:
//!
//! ```text
//! input/
//!   observed/<station>.json    observed exceedance series
//!   forecast/<station>.json    per-model forecast tensors
//!   brier.json                 optional per-(model, lead) Brier scores
//! ```
//!
//! Station reference data lives in a separate `stations.json` since it
//! changes on a different cadence.

use std::path::Path;

use serde::Deserialize;
use skill_common::{
    parse_utc, ModelTimeGrid, SkillConfig, SkillError, SkillResult, Station, StationSet, TimeAxis,
};
use skill_engine::{
    align_forecast, BrierScores, ForecastTensor, ModelField, ObservedSeries, StationInput,
};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ObservedFile {
    start: String,
    step_hours: u32,
    values: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ForecastFile {
    models: Vec<ModelEntry>,
}

/// One model's raw forecast archive for one station, row-major
/// (issue x lead). `null` marks a missing cell.
#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
    members: u32,
    issue_start: String,
    issue_step_hours: u32,
    lead_step_hours: u32,
    #[serde(default)]
    issue_offset_hours: i32,
    n_leads: usize,
    values: Vec<Option<f32>>,
}

pub fn load_stations(path: &Path) -> SkillResult<StationSet> {
    let text = std::fs::read_to_string(path)?;
    let set: StationSet = serde_json::from_str(&text)?;
    Ok(set)
}

/// The Brier matrix is optional; only `brier_weighted` runs need it.
pub fn load_brier(path: &Path) -> SkillResult<Option<BrierScores>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    let scores: BrierScores = serde_json::from_str(&text)?;
    Ok(Some(scores))
}

/// Load and align everything the tabulator needs for one station.
pub fn load_station_input(
    station: &Station,
    input_dir: &Path,
    config: &SkillConfig,
) -> SkillResult<StationInput> {
    let observed = load_observed(station, input_dir)?;
    let models = load_forecasts(station, input_dir, config, &observed.time)?;
    Ok(StationInput {
        station: station.clone(),
        observed,
        models,
    })
}

fn load_observed(station: &Station, input_dir: &Path) -> SkillResult<ObservedSeries> {
    let path = input_dir.join("observed").join(format!("{}.json", station.id));
    let text = std::fs::read_to_string(path)?;
    let file: ObservedFile = serde_json::from_str(&text)?;
    let time = TimeAxis::new(parse_utc(&file.start)?, file.step_hours, file.values.len());
    ObservedSeries::new(time, file.values)
}

fn load_forecasts(
    station: &Station,
    input_dir: &Path,
    config: &SkillConfig,
    observed_time: &TimeAxis,
) -> SkillResult<Vec<ModelField>> {
    let path = input_dir.join("forecast").join(format!("{}.json", station.id));
    let text = std::fs::read_to_string(path)?;
    let file: ForecastFile = serde_json::from_str(&text)?;
    if file.models.is_empty() {
        return Err(SkillError::invalid_data(format!(
            "station '{}' has no forecast models",
            station.id
        )));
    }
    let mut models = Vec::with_capacity(file.models.len());
    for entry in file.models {
        if entry.n_leads == 0 || entry.values.len() % entry.n_leads != 0 {
            return Err(SkillError::invalid_data(format!(
                "model '{}' has {} values for {} leads",
                entry.name,
                entry.values.len(),
                entry.n_leads
            )));
        }
        let issue = TimeAxis::new(
            parse_utc(&entry.issue_start)?,
            entry.issue_step_hours,
            entry.values.len() / entry.n_leads,
        );
        let data: Vec<f32> = entry
            .values
            .iter()
            .map(|v| v.unwrap_or(f32::NAN))
            .collect();
        let tensor = ForecastTensor::new(issue, entry.lead_step_hours, entry.n_leads, data)?;
        let grid = ModelTimeGrid {
            issue_step_hours: entry.issue_step_hours,
            lead_step_hours: entry.lead_step_hours,
            max_lead_hours: entry.n_leads as u32 * entry.lead_step_hours,
            issue_offset_hours: entry.issue_offset_hours,
        };
        let aligned = align_forecast(&entry.name, &tensor, &grid, config.lead_step_hours)?;
        // every model field shares the observed timeline
        let reindexed = aligned.reindex(observed_time);
        debug!(
            station = %station.id,
            model = %entry.name,
            members = entry.members,
            "loaded forecast tensor"
        );
        models.push(ModelField {
            name: entry.name,
            members: entry.members,
            grid: reindexed,
        });
    }
    Ok(models)
}
