//! Forecast alignment: (issue-time × lead-time) onto (event-time × lead-time).
//!
//! Every NWP feed arrives on its own time geometry (issue cadence, lead
//! resolution, horizon). The aligner reshapes each model onto the common
//! verification grid: event time at the observation frequency, lead time at
//! the notification step. Lead identity is preserved exactly: a target lead
//! bucket collects only the native leads it covers, values are never
//! averaged across lead times.

use skill_common::{ModelTimeGrid, SkillError, SkillResult, TimeAxis};
use tracing::debug;

use crate::tensor::{EventGrid, ForecastTensor};

/// Reshape one model's forecast tensor onto the common event grid.
///
/// Cell (t, L) of the output holds the forecast verifying at `t` with
/// target lead bucket `L`; when several issues map to the same cell (a
/// target lead step coarser than the issue cadence) the freshest
/// non-missing forecast wins. Frequencies that do not divide evenly are a
/// [`SkillError::ShapeMismatch`]: the tensor cannot be placed on the grid
/// without ambiguity.
pub fn align_forecast(
    model: &str,
    tensor: &ForecastTensor,
    grid: &ModelTimeGrid,
    target_lead_step_hours: u32,
) -> SkillResult<EventGrid> {
    if tensor.issue.len == 0 || tensor.n_leads == 0 {
        return Err(SkillError::shape_mismatch(
            model,
            "forecast tensor has no issue times or no lead times",
        ));
    }
    if tensor.lead_step_hours != grid.lead_step_hours {
        return Err(SkillError::shape_mismatch(
            model,
            format!(
                "tensor lead step {}h does not match descriptor {}h",
                tensor.lead_step_hours, grid.lead_step_hours
            ),
        ));
    }
    if tensor.issue.step_hours != grid.issue_step_hours {
        return Err(SkillError::shape_mismatch(
            model,
            format!(
                "tensor issue step {}h does not match descriptor {}h",
                tensor.issue.step_hours, grid.issue_step_hours
            ),
        ));
    }
    // ratio of issue cadence to lead resolution, must be whole
    let issue_ratio = grid.issue_lead_ratio(model)?;
    if target_lead_step_hours == 0 || target_lead_step_hours % grid.lead_step_hours != 0 {
        return Err(SkillError::shape_mismatch(
            model,
            format!(
                "target lead step {}h is not a multiple of native lead step {}h",
                target_lead_step_hours, grid.lead_step_hours
            ),
        ));
    }
    if grid.issue_offset_hours.unsigned_abs() % grid.lead_step_hours != 0 {
        return Err(SkillError::shape_mismatch(
            model,
            format!(
                "issue offset {}h does not land on the {}h event grid",
                grid.issue_offset_hours, grid.lead_step_hours
            ),
        ));
    }
    let lead_ratio = (target_lead_step_hours / grid.lead_step_hours) as usize;

    // target lead axis: one bucket per `lead_ratio` native leads
    let n_buckets = tensor.n_leads.div_ceil(lead_ratio);
    let lead_hours: Vec<u32> = (1..=n_buckets as u32)
        .map(|j| j * target_lead_step_hours)
        .collect();

    // event axis spans the first to the last verification time
    let offset = chrono::Duration::hours(grid.issue_offset_hours as i64);
    let start = tensor.issue.start + offset + chrono::Duration::hours(grid.lead_step_hours as i64);
    let len = (tensor.issue.len - 1) * issue_ratio + tensor.n_leads;
    let time = TimeAxis::new(start, grid.lead_step_hours, len);

    let mut out = EventGrid::missing(time, lead_hours);
    for i in 0..tensor.issue.len {
        for k in 0..tensor.n_leads {
            let value = tensor.get(i, k);
            if value.is_nan() {
                continue;
            }
            let t = i * issue_ratio + k;
            let j = k / lead_ratio;
            // issues ascend, so the freshest forecast writes last
            out.set(t, j, value);
        }
    }
    debug!(
        model,
        issues = tensor.issue.len,
        leads = tensor.n_leads,
        event_steps = len,
        "aligned forecast tensor"
    );
    Ok(out)
}

/// Drop leading and trailing event times where any lead is missing, so the
/// study period covers only timesteps every forecast horizon reaches.
pub fn trim_incomplete(grid: &EventGrid) -> EventGrid {
    let complete = |t: usize| (0..grid.n_leads()).all(|j| !grid.get(t, j).is_nan());
    let first = (0..grid.time.len).find(|&t| complete(t));
    let last = (0..grid.time.len).rev().find(|&t| complete(t));
    let (first, last) = match (first, last) {
        (Some(f), Some(l)) if f <= l => (f, l),
        _ => return EventGrid::missing(TimeAxis::new(grid.time.start, grid.time.step_hours, 0), grid.lead_hours.clone()),
    };
    let time = TimeAxis::new(grid.time.at(first), grid.time.step_hours, last - first + 1);
    let mut out = EventGrid::missing(time, grid.lead_hours.clone());
    for t in first..=last {
        for j in 0..grid.n_leads() {
            out.set(t - first, j, grid.get(t, j));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skill_common::TimeAxis;

    fn issue_axis(len: usize) -> TimeAxis {
        TimeAxis::new(
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            12,
            len,
        )
    }

    /// Two issues 12 h apart, 4 leads of 6 h each, reshaped to a 12 h
    /// target lead step: the layout of the original reanalysis pipeline.
    #[test]
    fn reshapes_onto_event_grid() {
        let mut tensor = ForecastTensor::missing(issue_axis(2), 6, 4);
        // issue 0 forecasts 1,2,3,4 ; issue 1 forecasts 5,6,7,8
        for (i, k, v) in [
            (0, 0, 1.0),
            (0, 1, 2.0),
            (0, 2, 3.0),
            (0, 3, 4.0),
            (1, 0, 5.0),
            (1, 1, 6.0),
            (1, 2, 7.0),
            (1, 3, 8.0),
        ] {
            tensor.set(i, k, v);
        }
        let grid = ModelTimeGrid::new(12, 6, 24);
        let out = align_forecast("EUE", &tensor, &grid, 12).unwrap();

        assert_eq!(out.lead_hours, vec![12, 24]);
        assert_eq!(out.time.len, 6);
        // event times 06,12,18,00,06,12; bucket 12h holds native leads 1-2
        assert_eq!(out.get(0, 0), 1.0);
        assert_eq!(out.get(1, 0), 2.0);
        // freshest forecast wins where both issues reach the event time
        assert_eq!(out.get(2, 0), 5.0);
        assert_eq!(out.get(3, 0), 6.0);
        // bucket 24h holds native leads 3-4
        assert_eq!(out.get(2, 1), 3.0);
        assert_eq!(out.get(3, 1), 4.0);
        // cells no forecast reaches stay missing
        assert!(out.get(0, 1).is_nan());
        assert!(out.get(5, 0).is_nan());
    }

    #[test]
    fn empty_issue_axis_is_a_shape_mismatch() {
        // a forecast file with no values must fail cleanly, not panic
        let tensor = ForecastTensor::missing(issue_axis(0), 6, 4);
        let grid = ModelTimeGrid::new(12, 6, 24);
        assert!(matches!(
            align_forecast("EUE", &tensor, &grid, 12),
            Err(SkillError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn fractional_ratio_is_a_shape_mismatch() {
        let tensor = ForecastTensor::missing(issue_axis(2), 6, 4);
        let grid = ModelTimeGrid::new(12, 6, 24);
        assert!(matches!(
            align_forecast("EUE", &tensor, &grid, 9),
            Err(SkillError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn trim_drops_ragged_edges() {
        let mut tensor = ForecastTensor::missing(issue_axis(2), 6, 4);
        for i in 0..2 {
            for k in 0..4 {
                tensor.set(i, k, 1.0);
            }
        }
        let grid = ModelTimeGrid::new(12, 6, 24);
        let aligned = align_forecast("EUD", &tensor, &grid, 12).unwrap();
        let trimmed = trim_incomplete(&aligned);
        // only event times covered by both lead buckets survive
        assert_eq!(trimmed.time.len, 2);
        for t in 0..trimmed.time.len {
            for j in 0..trimmed.n_leads() {
                assert!(!trimmed.get(t, j).is_nan());
            }
        }
    }
}
