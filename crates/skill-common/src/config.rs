//! Run configuration.
//!
//! All knobs are carried in one immutable [`SkillConfig`] value threaded
//! through the pipeline stages; nothing reads ambient/global state, so
//! stages stay parallelizable and unit-testable with synthetic configs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::criteria::{CriteriaGrid, CriteriaPoint};
use crate::error::{SkillError, SkillResult};
use crate::station::area_ranges;

/// Policy for combining the per-model exceedance probabilities into one
/// ensemble estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CombineApproach {
    /// Deterministic AND probabilistic model classes must both exceed the
    /// criterion probability. Output is a binary decision, not a
    /// probability; the event detector skips its own thresholding.
    Paired,
    /// Unweighted arithmetic mean across models.
    #[default]
    ModelMean,
    /// Mean across all individual members of all models (each model
    /// weighted by its member count).
    MemberWeighted,
    /// Mean weighted inversely to each model's Brier score at that lead
    /// time, renormalized over the models available at the cell.
    BrierWeighted,
}

impl CombineApproach {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paired => "paired",
            Self::ModelMean => "model_mean",
            Self::MemberWeighted => "member_weighted",
            Self::BrierWeighted => "brier_weighted",
        }
    }
}

/// Tie-break mode when several criteria points score within tolerance of
/// the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// Among the tied set, minimize |precision - recall|.
    #[default]
    Balance,
    /// Among the tied set, pick the smallest probability, then the
    /// smallest persistence magnitude.
    Minimal,
}

/// Tolerance window applied to observed and forecasted event series
/// before comparison, to absorb small timing offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window width in timesteps. 0 or 1 means exact matching.
    pub width: usize,
    /// Centered on the timestep, or trailing (window ends at it).
    pub center: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1,
            center: true,
        }
    }
}

/// Catchment-area span expanded into semilog strata bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaRangeConfig {
    pub min_km2: f64,
    pub max_km2: f64,
}

/// Criteria-optimization settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Number of cross-validation resamples. `None` disables CV and
    /// optimizes on the full station set.
    pub kfold: Option<u32>,
    /// Proportion of stations in the training partition.
    pub train_size: f64,
    /// Stratify splits by observed-event-count bucket.
    pub stratify: bool,
    /// Scores within this distance of the maximum are tie candidates.
    pub tolerance: f64,
    pub tie_break: TieBreak,
    /// Seed for the split shuffles; fixed seed makes runs reproducible.
    pub seed: u64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            kfold: None,
            train_size: 0.8,
            stratify: false,
            tolerance: 1e-2,
            tie_break: TieBreak::default(),
            seed: 0,
        }
    }
}

/// Full configuration of one skill-assessment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillConfig {
    /// Return period of the flood threshold, in years.
    pub return_period_years: f64,
    /// Reduced-threshold factor for ternary exceedance. `None` keeps the
    /// assessment binary.
    pub reducing_factor: Option<f64>,
    /// Candidate trigger criteria.
    pub criteria: CriteriaGrid,
    /// Lead times under assessment, in hours.
    pub lead_times_hours: Vec<u32>,
    /// Lead-time step of the notification grid, in hours.
    pub lead_step_hours: u32,
    pub window: WindowConfig,
    pub approach: CombineApproach,
    /// Minimum catchment area for a station to enter the assessment.
    pub min_area_km2: f64,
    /// Catchment-area strata (each value is a lower bound, "area >= a").
    /// Empty disables area stratification unless `area_range_km2` is set.
    pub area_buckets_km2: Vec<f64>,
    /// Span expanded into semilog strata bounds when no explicit list is
    /// given.
    pub area_range_km2: Option<AreaRangeConfig>,
    /// Beta of the F score; < 1 penalizes false alarms more than misses.
    pub beta: f64,
    /// Seasonal disaggregation. Recognized but not functional; rejected
    /// at validation.
    pub seasonality: bool,
    /// Operational ("current") criteria used as benchmark.
    pub current_criteria: Option<CriteriaPoint>,
    pub optimization: OptimizationConfig,
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self {
            return_period_years: 5.0,
            reducing_factor: None,
            criteria: CriteriaGrid::default(),
            lead_times_hours: vec![60],
            lead_step_hours: 12,
            window: WindowConfig::default(),
            approach: CombineApproach::default(),
            min_area_km2: 500.0,
            area_buckets_km2: Vec::new(),
            area_range_km2: None,
            beta: 1.0,
            seasonality: false,
            current_criteria: None,
            optimization: OptimizationConfig::default(),
        }
    }
}

impl SkillConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> SkillResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Area strata lower bounds: the explicit list when given, otherwise
    /// the semilog ranges over the configured span.
    pub fn area_strata(&self) -> Vec<f64> {
        if !self.area_buckets_km2.is_empty() {
            return self.area_buckets_km2.clone();
        }
        match self.area_range_km2 {
            Some(range) => area_ranges(range.min_km2, range.max_km2),
            None => Vec::new(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SkillResult<()> {
        if self.seasonality {
            return Err(SkillError::config(
                "seasonality is recognized but not supported; set it to false",
            ));
        }
        if self.return_period_years <= 0.0 {
            return Err(SkillError::config("return_period_years must be > 0"));
        }
        if let Some(factor) = self.reducing_factor {
            if !(0.0 < factor && factor < 1.0) {
                return Err(SkillError::config("reducing_factor must be in (0, 1)"));
            }
        }
        if self.beta <= 0.0 {
            return Err(SkillError::config("beta must be > 0"));
        }
        if let Some(range) = self.area_range_km2 {
            if range.min_km2 <= 0.0 || range.max_km2 < range.min_km2 {
                return Err(SkillError::config(
                    "area_range_km2 must satisfy 0 < min_km2 <= max_km2",
                ));
            }
        }
        if self.lead_step_hours == 0 {
            return Err(SkillError::config("lead_step_hours must be > 0"));
        }
        if self.lead_times_hours.is_empty() {
            return Err(SkillError::config("lead_times_hours must not be empty"));
        }
        for &lead in &self.lead_times_hours {
            if lead == 0 || lead % self.lead_step_hours != 0 {
                return Err(SkillError::config(format!(
                    "lead time {lead}h is not a positive multiple of the {}h lead step",
                    self.lead_step_hours
                )));
            }
        }
        let opt = &self.optimization;
        if !(0.0 < opt.train_size && opt.train_size < 1.0) {
            return Err(SkillError::config("optimization.train_size must be in (0, 1)"));
        }
        if let Some(kfold) = opt.kfold {
            if kfold < 2 {
                return Err(SkillError::config("optimization.kfold must be >= 2"));
            }
        }
        if opt.tolerance < 0.0 {
            return Err(SkillError::config("optimization.tolerance must be >= 0"));
        }
        // surfaces EmptyCriteriaGrid immediately instead of mid-run
        self.criteria.points()?;
        Ok(())
    }
}
