//! Time handling for observation and forecast series.
//!
//! Every series in the pipeline carries an explicit "frequency + offset"
//! descriptor instead of a list of timestamps: a regular [`TimeAxis`] for
//! the data it indexes, and a per-model [`ModelTimeGrid`] describing the
//! native issue/lead-time frequencies of an NWP feed. Heterogeneous
//! frequencies across models are a structural fact the aligner reconciles,
//! not an error.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SkillError, SkillResult};

/// A regular time axis: start, step in whole hours, number of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAxis {
    /// Timestamp of the first step.
    pub start: DateTime<Utc>,
    /// Step between consecutive entries, in hours.
    pub step_hours: u32,
    /// Number of steps on the axis.
    pub len: usize,
}

impl TimeAxis {
    pub fn new(start: DateTime<Utc>, step_hours: u32, len: usize) -> Self {
        Self {
            start,
            step_hours,
            len,
        }
    }

    /// Timestamp of step `i`. Panics if `i >= len` in debug builds only;
    /// callers index through `index_of` round-trips.
    pub fn at(&self, i: usize) -> DateTime<Utc> {
        debug_assert!(i < self.len);
        self.start + Duration::hours(self.step_hours as i64 * i as i64)
    }

    /// Timestamp of the last step, or `None` for an empty axis.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        if self.len == 0 {
            None
        } else {
            Some(self.at(self.len - 1))
        }
    }

    /// Index of a timestamp on this axis, `None` if it does not land on a
    /// step or falls outside the axis.
    pub fn index_of(&self, t: DateTime<Utc>) -> Option<usize> {
        let offset = t.signed_duration_since(self.start);
        let hours = offset.num_hours();
        if offset != Duration::hours(hours) || hours < 0 {
            return None;
        }
        let step = self.step_hours as i64;
        if hours % step != 0 {
            return None;
        }
        let idx = (hours / step) as usize;
        (idx < self.len).then_some(idx)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over all timestamps of the axis.
    pub fn iter(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.len).map(|i| self.at(i))
    }

    /// Check that two axes describe the same timeline.
    pub fn ensure_matches(&self, other: &TimeAxis) -> SkillResult<()> {
        if self != other {
            return Err(SkillError::time(format!(
                "axes differ: {}/{}h/{} vs {}/{}h/{}",
                self.start, self.step_hours, self.len, other.start, other.step_hours, other.len
            )));
        }
        Ok(())
    }
}

/// Native time geometry of one NWP model's forecast archive.
///
/// New models (different issue cadence or lead resolution) need only a new
/// descriptor, not new code paths in the aligner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTimeGrid {
    /// Hours between consecutive forecast issues (commonly 12).
    pub issue_step_hours: u32,
    /// Hours between consecutive lead-time steps within a forecast
    /// (commonly 6).
    pub lead_step_hours: u32,
    /// Longest lead time the model provides, in hours.
    pub max_lead_hours: u32,
    /// Offset applied to issue times that do not land exactly on the
    /// observation time steps. Zero for models issued on the hour grid.
    pub issue_offset_hours: i32,
}

impl ModelTimeGrid {
    pub fn new(issue_step_hours: u32, lead_step_hours: u32, max_lead_hours: u32) -> Self {
        Self {
            issue_step_hours,
            lead_step_hours,
            max_lead_hours,
            issue_offset_hours: 0,
        }
    }

    /// Number of lead-time steps in one forecast.
    pub fn n_leads(&self) -> usize {
        (self.max_lead_hours / self.lead_step_hours) as usize
    }

    /// Ratio of issue frequency to lead resolution. The aligner requires
    /// this to be a whole number; anything else cannot be reshaped onto
    /// the event grid without ambiguity.
    pub fn issue_lead_ratio(&self, model: &str) -> SkillResult<usize> {
        if self.lead_step_hours == 0 || self.issue_step_hours % self.lead_step_hours != 0 {
            return Err(SkillError::shape_mismatch(
                model,
                format!(
                    "issue step {}h is not a multiple of lead step {}h",
                    self.issue_step_hours, self.lead_step_hours
                ),
            ));
        }
        Ok((self.issue_step_hours / self.lead_step_hours) as usize)
    }
}

/// Parse an ISO 8601 timestamp, assuming UTC when no zone is given.
pub fn parse_utc(s: &str) -> SkillResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }
    Err(SkillError::time(format!("invalid timestamp: {s}")))
}
