//! Confusion tabulation over the criteria grid.
//!
//! For every station in scope and every (probability x persistence x lead
//! time) cell, the windowed observed and forecasted event series are
//! compared timestep by timestep and TP/FN/FP accumulated over the study
//! period. True negatives are not retained. Per-station tables keep the
//! full grid, so skill can later be re-aggregated over arbitrary station
//! strata without recomputing anything.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use skill_common::{
    CombineApproach, CriteriaPoint, Persistence, SkillConfig, SkillError, SkillResult, Station,
    WindowConfig,
};
use tracing::{debug, warn};

use crate::combine::{combine, BrierScores, CombinedField, ModelField};
use crate::detect::{apply_window, apply_window_mirrored, count_onsets, detect_events};
use crate::tensor::ObservedSeries;
use crate::trinary::reconcile_cell;

/// TP/FN/FP for one criteria cell. True negatives are deliberately
/// absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
    pub fp: u64,
}

impl ConfusionCounts {
    pub fn merge(&mut self, other: &ConfusionCounts) {
        self.tp += other.tp;
        self.fn_ += other.fn_;
        self.fp += other.fp;
    }
}

/// One row of a station's confusion grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionCell {
    pub probability: f64,
    pub persistence: Persistence,
    pub lead_hours: u32,
    pub counts: ConfusionCounts,
}

/// The full criteria grid tabulated for one station.
///
/// Cell order is fixed (probability-major, then persistence, then lead
/// time) and identical for every station of a run, so tables aggregate
/// index-wise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionTable {
    pub station: String,
    pub approach: CombineApproach,
    /// Observed event onsets over the study period; drives the
    /// stratified cross-validation splits.
    pub observed_events: u64,
    pub area_km2: f64,
    pub cells: Vec<ConfusionCell>,
}

impl ConfusionTable {
    pub fn get(&self, point: &CriteriaPoint, lead_hours: u32) -> Option<&ConfusionCounts> {
        self.cells
            .iter()
            .find(|c| {
                c.lead_hours == lead_hours
                    && c.persistence == point.persistence
                    && (c.probability - point.probability).abs() < 1e-9
            })
            .map(|c| &c.counts)
    }
}

/// Sum confusion tables over a station subset, cell by cell.
pub fn aggregate<'a>(
    tables: impl IntoIterator<Item = &'a ConfusionTable>,
) -> SkillResult<Vec<ConfusionCell>> {
    let mut iter = tables.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| SkillError::invalid_data("no confusion tables to aggregate"))?;
    let mut cells = first.cells.clone();
    for table in iter {
        if table.cells.len() != cells.len() {
            return Err(SkillError::invalid_data(format!(
                "confusion table for station '{}' has {} cells, expected {}",
                table.station,
                table.cells.len(),
                cells.len()
            )));
        }
        for (acc, cell) in cells.iter_mut().zip(&table.cells) {
            if acc.persistence != cell.persistence
                || acc.lead_hours != cell.lead_hours
                || (acc.probability - cell.probability).abs() > 1e-9
            {
                return Err(SkillError::invalid_data(
                    "confusion tables index different criteria grids",
                ));
            }
            acc.counts.merge(&cell.counts);
        }
    }
    Ok(cells)
}

/// Everything the tabulator needs for one station.
#[derive(Debug, Clone)]
pub struct StationInput {
    pub station: Station,
    pub observed: ObservedSeries,
    /// Model fields aligned and reindexed onto the observed timeline.
    pub models: Vec<ModelField>,
}

/// The candidate criteria, with the operational benchmark appended when
/// it falls outside the search grid, so its counts are tabulated too.
pub fn candidate_points(config: &SkillConfig) -> SkillResult<Vec<CriteriaPoint>> {
    let mut points = config.criteria.points()?;
    if let Some(current) = config.current_criteria {
        let present = points.iter().any(|p| {
            p.persistence == current.persistence
                && (p.probability - current.probability).abs() < 1e-9
        });
        if !present {
            points.push(current);
        }
    }
    Ok(points)
}

/// Tabulate the full criteria grid for one station.
pub fn tabulate_station(
    input: &StationInput,
    config: &SkillConfig,
    brier: Option<&BrierScores>,
) -> SkillResult<ConfusionTable> {
    let observed = &input.observed;
    let first = input
        .models
        .first()
        .ok_or_else(|| SkillError::invalid_data("station has no model fields"))?;
    first.grid.time.ensure_matches(&observed.time)?;

    let points = candidate_points(config)?;
    let leads: Vec<(u32, usize)> = config
        .lead_times_hours
        .iter()
        .map(|&lead| {
            first.grid.lead_index(lead).map(|j| (lead, j)).ok_or_else(|| {
                SkillError::invalid_data(format!(
                    "lead time {lead}h is not on the forecast grid {:?}",
                    first.grid.lead_hours
                ))
            })
        })
        .collect::<SkillResult<_>>()?;

    // paired recombines per probability; every other policy combines once
    let shared = if config.approach == CombineApproach::Paired {
        None
    } else {
        Some(combine(&input.models, config.approach, brier, None)?)
    };

    let obs_bits = observed.binary();
    let mut cells = Vec::with_capacity(points.len() * leads.len());
    for point in &points {
        let paired_field;
        let field: &CombinedField = match &shared {
            Some(f) => f,
            None => {
                paired_field =
                    combine(&input.models, config.approach, brier, Some(point.probability))?;
                &paired_field
            }
        };
        let events = detect_events(field, point);
        for &(lead, j) in &leads {
            let column = events.lead_column(j);
            let counts = if observed.is_ternary() && field.ternary {
                let (obs, fcst) = ternary_bits(&observed.values, &column);
                compare_windowed(&obs, &fcst, &config.window)
            } else {
                let fcst: Vec<f32> = column
                    .iter()
                    .map(|&v| {
                        if v.is_nan() {
                            f32::NAN
                        } else if v >= 1.0 {
                            1.0
                        } else {
                            0.0
                        }
                    })
                    .collect();
                compare_windowed(&obs_bits, &fcst, &config.window)
            };
            cells.push(ConfusionCell {
                probability: point.probability,
                persistence: point.persistence,
                lead_hours: lead,
                counts,
            });
        }
    }
    debug!(
        station = %input.station.id,
        cells = cells.len(),
        "tabulated confusion grid"
    );
    Ok(ConfusionTable {
        station: input.station.id.clone(),
        approach: config.approach,
        observed_events: count_onsets(&obs_bits),
        area_km2: input.station.area_km2,
        cells,
    })
}

/// Tabulate all in-scope stations in parallel.
///
/// One station failing does not abort the run: its error is collected and
/// the remaining stations continue. The caller decides what a fully
/// failed run means.
pub fn tabulate_all(
    inputs: &[StationInput],
    config: &SkillConfig,
    brier: Option<&BrierScores>,
) -> (Vec<ConfusionTable>, Vec<SkillError>) {
    let results: Vec<SkillResult<ConfusionTable>> = inputs
        .par_iter()
        .filter(|input| input.station.area_km2 >= config.min_area_km2)
        .map(|input| {
            tabulate_station(input, config, brier).map_err(|source| {
                warn!(
                    station = %input.station.id,
                    error = %source,
                    "station failed, continuing with the rest"
                );
                SkillError::station_failed(&input.station.id, source)
            })
        })
        .collect();

    let mut tables = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(table) => tables.push(table),
            Err(err) => failures.push(err),
        }
    }
    (tables, failures)
}

/// Collapse a ternary (observed, forecasted-class) series pair into the
/// binary event bit pair via the 9-outcome table. Missing forecasts mark
/// both sides missing, dropping the timestep from the comparison.
fn ternary_bits(obs: &[u8], fcst: &[f32]) -> (Vec<f32>, Vec<f32>) {
    obs.iter()
        .zip(fcst)
        .map(|(&o, &f)| {
            if f.is_nan() {
                (f32::NAN, f32::NAN)
            } else {
                let (ob, fb) = reconcile_cell(o, f as u8);
                (ob as u8 as f32, fb as u8 as f32)
            }
        })
        .unzip()
}

/// Count TP/FN/FP between two binary series under the tolerance window.
///
/// TP and FN are assigned at observed-event timesteps against the
/// windowed forecast; FP at forecasted-event timesteps the windowed
/// observation cannot account for. The observation is buffered with the
/// mirrored window, so an even centered width covers the same offsets in
/// both directions of the comparison. Timesteps missing on either raw
/// side are skipped.
fn compare_windowed(obs: &[f32], fcst: &[f32], window: &WindowConfig) -> ConfusionCounts {
    let windowed_obs = apply_window_mirrored(obs, window);
    let windowed_fcst = apply_window(fcst, window);
    let mut counts = ConfusionCounts::default();
    for t in 0..obs.len().min(fcst.len()) {
        if obs[t].is_nan() || fcst[t].is_nan() {
            continue;
        }
        if obs[t] == 1.0 {
            if windowed_fcst[t] == 1.0 {
                counts.tp += 1;
            } else {
                counts.fn_ += 1;
            }
        }
        if fcst[t] == 1.0 && windowed_obs[t] == 0.0 {
            counts.fp += 1;
        }
    }
    counts
}
