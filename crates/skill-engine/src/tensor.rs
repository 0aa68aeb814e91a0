//! Dense tensors for exceedance data.
//!
//! All tensors are flat `Vec<f32>` in row-major order with `f32::NAN` as
//! the missing marker. Missing cells are a first-class state (a model not
//! run for an issue time, a lead beyond a model's horizon); they propagate
//! through every stage and are excluded from means, never coerced to zero.

use serde::{Deserialize, Serialize};
use skill_common::{SkillError, SkillResult, TimeAxis};

/// A model's raw forecast: (issue-time × lead-time) at the model's native
/// frequencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastTensor {
    /// Issue-time axis (step = the model's issue frequency).
    pub issue: TimeAxis,
    /// Native lead-time step in hours; lead k verifies at
    /// `issue + (k + 1) * lead_step_hours`.
    pub lead_step_hours: u32,
    /// Number of lead steps per forecast.
    pub n_leads: usize,
    data: Vec<f32>,
}

impl ForecastTensor {
    /// Build from row-major values, one row per issue time.
    pub fn new(
        issue: TimeAxis,
        lead_step_hours: u32,
        n_leads: usize,
        data: Vec<f32>,
    ) -> SkillResult<Self> {
        if data.len() != issue.len * n_leads {
            return Err(SkillError::invalid_data(format!(
                "forecast tensor has {} values, expected {} issues x {} leads",
                data.len(),
                issue.len,
                n_leads
            )));
        }
        if lead_step_hours == 0 {
            return Err(SkillError::invalid_data("lead_step_hours must be > 0"));
        }
        Ok(Self {
            issue,
            lead_step_hours,
            n_leads,
            data,
        })
    }

    /// All cells missing.
    pub fn missing(issue: TimeAxis, lead_step_hours: u32, n_leads: usize) -> Self {
        let data = vec![f32::NAN; issue.len * n_leads];
        Self {
            issue,
            lead_step_hours,
            n_leads,
            data,
        }
    }

    pub fn get(&self, issue_idx: usize, lead_idx: usize) -> f32 {
        self.data[issue_idx * self.n_leads + lead_idx]
    }

    pub fn set(&mut self, issue_idx: usize, lead_idx: usize, value: f32) {
        self.data[issue_idx * self.n_leads + lead_idx] = value;
    }
}

/// A forecast field on the common verification grid:
/// (event-time × lead-time), event time at the observation frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventGrid {
    /// Verification-time axis (observation frequency, commonly 6 h).
    pub time: TimeAxis,
    /// Lead times in hours, ascending (notification grid, commonly 12 h
    /// steps).
    pub lead_hours: Vec<u32>,
    data: Vec<f32>,
}

impl EventGrid {
    /// All cells missing.
    pub fn missing(time: TimeAxis, lead_hours: Vec<u32>) -> Self {
        let data = vec![f32::NAN; time.len * lead_hours.len()];
        Self {
            time,
            lead_hours,
            data,
        }
    }

    pub fn n_leads(&self) -> usize {
        self.lead_hours.len()
    }

    pub fn get(&self, time_idx: usize, lead_idx: usize) -> f32 {
        self.data[time_idx * self.lead_hours.len() + lead_idx]
    }

    pub fn set(&mut self, time_idx: usize, lead_idx: usize, value: f32) {
        self.data[time_idx * self.lead_hours.len() + lead_idx] = value;
    }

    /// Index of a lead time on the lead axis.
    pub fn lead_index(&self, lead_hours: u32) -> Option<usize> {
        self.lead_hours.iter().position(|&l| l == lead_hours)
    }

    /// Column of values for one lead time, over all event times.
    pub fn lead_column(&self, lead_idx: usize) -> Vec<f32> {
        (0..self.time.len).map(|t| self.get(t, lead_idx)).collect()
    }

    /// Same grid shape, every cell produced by `f`.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> EventGrid {
        EventGrid {
            time: self.time,
            lead_hours: self.lead_hours.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Reindex onto another event-time axis. Timesteps absent from the
    /// source stay missing; source timesteps outside `axis` are dropped.
    pub fn reindex(&self, axis: &TimeAxis) -> EventGrid {
        let mut out = EventGrid::missing(*axis, self.lead_hours.clone());
        for t in 0..axis.len {
            if let Some(src) = self.time.index_of(axis.at(t)) {
                for j in 0..self.lead_hours.len() {
                    out.set(t, j, self.get(src, j));
                }
            }
        }
        out
    }

    /// Check the grid shares timeline and lead axis with another.
    pub fn ensure_same_shape(&self, other: &EventGrid) -> SkillResult<()> {
        self.time.ensure_matches(&other.time)?;
        if self.lead_hours != other.lead_hours {
            return Err(SkillError::time(format!(
                "lead axes differ: {:?} vs {:?}",
                self.lead_hours, other.lead_hours
            )));
        }
        Ok(())
    }
}

/// Per-station observed exceedance over the study period.
///
/// Values are 0/1 in binary mode, 0/1/2 in ternary mode (0 below the
/// reduced threshold, 1 between reduced and full, 2 at/above full).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedSeries {
    pub time: TimeAxis,
    pub values: Vec<u8>,
}

impl ObservedSeries {
    pub fn new(time: TimeAxis, values: Vec<u8>) -> SkillResult<Self> {
        if values.len() != time.len {
            return Err(SkillError::invalid_data(format!(
                "observed series has {} values for an axis of {} steps",
                values.len(),
                time.len
            )));
        }
        if let Some(&v) = values.iter().find(|&&v| v > 2) {
            return Err(SkillError::invalid_data(format!(
                "observed exceedance class {v} outside {{0,1,2}}"
            )));
        }
        Ok(Self { time, values })
    }

    pub fn is_ternary(&self) -> bool {
        self.values.iter().any(|&v| v > 1)
    }

    /// Binary view: any class >= 1 counts as exceedance. Used for event
    /// counting and for stratified sampling.
    pub fn binary(&self) -> Vec<f32> {
        self.values
            .iter()
            .map(|&v| if v >= 1 { 1.0 } else { 0.0 })
            .collect()
    }

    /// Number of observed events (positive timesteps of the binary view).
    pub fn event_count(&self) -> u64 {
        self.values.iter().filter(|&&v| v >= 1).count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn axis(step: u32, len: usize) -> TimeAxis {
        TimeAxis::new(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(), step, len)
    }

    #[test]
    fn tensor_shape_is_checked() {
        let err = ForecastTensor::new(axis(12, 3), 6, 4, vec![0.0; 11]);
        assert!(err.is_err());
        let ok = ForecastTensor::new(axis(12, 3), 6, 4, vec![0.0; 12]);
        assert!(ok.is_ok());
    }

    #[test]
    fn reindex_preserves_values_and_marks_gaps() {
        let mut grid = EventGrid::missing(axis(6, 4), vec![12]);
        for t in 0..4 {
            grid.set(t, 0, t as f32);
        }
        // wider target axis starting one step earlier
        let target = TimeAxis::new(grid.time.start - chrono::Duration::hours(6), 6, 6);
        let out = grid.reindex(&target);
        assert!(out.get(0, 0).is_nan());
        assert_eq!(out.get(1, 0), 0.0);
        assert_eq!(out.get(4, 0), 3.0);
        assert!(out.get(5, 0).is_nan());
    }

    #[test]
    fn observed_series_rejects_bad_classes() {
        assert!(ObservedSeries::new(axis(6, 3), vec![0, 1, 3]).is_err());
        let obs = ObservedSeries::new(axis(6, 3), vec![0, 1, 2]).unwrap();
        assert_eq!(obs.event_count(), 2);
    }
}
