//! Model combination: one exceedance-probability field out of many models.
//!
//! Inputs are per-model fields already aligned onto the common event grid.
//! Missing cells (model not run for that issue time, lead beyond its
//! horizon) are excluded from every mean and from weight renormalization;
//! a cell missing in all contributing models stays missing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use skill_common::{CombineApproach, SkillError, SkillResult};

use crate::tensor::EventGrid;

/// One model's aligned contribution.
#[derive(Debug, Clone)]
pub struct ModelField {
    pub name: String,
    /// Ensemble size; 1 marks a deterministic model.
    pub members: u32,
    pub grid: EventGrid,
}

impl ModelField {
    pub fn is_deterministic(&self) -> bool {
        self.members == 1
    }
}

/// Brier scores per (model, lead time), used by the `brier_weighted`
/// policy. Precomputed upstream over the study period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrierScores {
    /// model name -> (lead hours -> Brier score)
    scores: HashMap<String, HashMap<u32, f64>>,
}

impl BrierScores {
    pub fn new(scores: HashMap<String, HashMap<u32, f64>>) -> Self {
        Self { scores }
    }

    pub fn get(&self, model: &str, lead_hours: u32) -> Option<f64> {
        self.scores.get(model)?.get(&lead_hours).copied()
    }
}

/// The combined exceedance estimate.
#[derive(Debug, Clone)]
pub struct CombinedField {
    pub grid: EventGrid,
    /// True when the policy already produced a binary decision (`paired`);
    /// the event detector must then skip its own probability threshold.
    pub prethresholded: bool,
    /// True when the field carries ternary exceedance classes {0,1,2}
    /// instead of probabilities. The detector preserves the classes for
    /// the 9-outcome reconciliation.
    pub ternary: bool,
}

/// Combine aligned model fields under the given policy.
///
/// `paired_probability` is the criterion probability each model class must
/// exceed under the `paired` policy; it is ignored by the other policies.
pub fn combine(
    models: &[ModelField],
    approach: CombineApproach,
    brier: Option<&BrierScores>,
    paired_probability: Option<f64>,
) -> SkillResult<CombinedField> {
    let first = models
        .first()
        .ok_or_else(|| SkillError::invalid_data("no model fields to combine"))?;
    for model in &models[1..] {
        first.grid.ensure_same_shape(&model.grid)?;
    }

    // class-valued (ternary) fields cannot be averaged; they pass through
    // untouched, one deterministic model at a time
    let has_classes = |m: &ModelField| {
        (0..m.grid.time.len)
            .any(|t| (0..m.grid.n_leads()).any(|j| m.grid.get(t, j) > 1.0))
    };
    if models.iter().any(has_classes) {
        if models.len() > 1 {
            return Err(SkillError::invalid_data(
                "ternary class fields cannot be combined across models",
            ));
        }
        if !first.is_deterministic() {
            return Err(SkillError::invalid_data(format!(
                "model '{}' carries ternary classes but reports {} members",
                first.name, first.members
            )));
        }
        return Ok(CombinedField {
            grid: first.grid.clone(),
            prethresholded: false,
            ternary: true,
        });
    }

    let template = &first.grid;
    let mut out = EventGrid::missing(template.time, template.lead_hours.clone());

    match approach {
        CombineApproach::ModelMean => {
            for t in 0..template.time.len {
                for j in 0..template.n_leads() {
                    out.set(t, j, nan_mean(models.iter().map(|m| (m.grid.get(t, j), 1.0))));
                }
            }
        }
        CombineApproach::MemberWeighted => {
            for t in 0..template.time.len {
                for j in 0..template.n_leads() {
                    out.set(
                        t,
                        j,
                        nan_mean(models.iter().map(|m| (m.grid.get(t, j), m.members as f64))),
                    );
                }
            }
        }
        CombineApproach::BrierWeighted => {
            let brier = brier.ok_or_else(|| {
                SkillError::invalid_data("brier_weighted approach requires a Brier-score matrix")
            })?;
            // one weight per (model, lead); renormalization over available
            // models happens per cell inside nan_mean
            let mut weights = vec![vec![0.0f64; template.n_leads()]; models.len()];
            for (m, model) in models.iter().enumerate() {
                for (j, &lead) in template.lead_hours.iter().enumerate() {
                    let score = brier.get(&model.name, lead).ok_or_else(|| {
                        SkillError::invalid_data(format!(
                            "no Brier score for model '{}' at lead {lead}h",
                            model.name
                        ))
                    })?;
                    // worse Brier -> smaller weight
                    weights[m][j] = 1.0 / score.max(f64::EPSILON);
                }
            }
            for t in 0..template.time.len {
                for j in 0..template.n_leads() {
                    out.set(
                        t,
                        j,
                        nan_mean(
                            models
                                .iter()
                                .enumerate()
                                .map(|(m, model)| (model.grid.get(t, j), weights[m][j])),
                        ),
                    );
                }
            }
        }
        CombineApproach::Paired => {
            let p = paired_probability.ok_or_else(|| {
                SkillError::invalid_data("paired approach requires a criterion probability")
            })?;
            for t in 0..template.time.len {
                for j in 0..template.n_leads() {
                    let det = nan_max(
                        models
                            .iter()
                            .filter(|m| m.is_deterministic())
                            .map(|m| m.grid.get(t, j)),
                    );
                    let prob = nan_max(
                        models
                            .iter()
                            .filter(|m| !m.is_deterministic())
                            .map(|m| m.grid.get(t, j)),
                    );
                    let decision = match (det, prob) {
                        // both classes must agree on exceedance
                        (Some(d), Some(e)) => {
                            if d as f64 >= p && e as f64 >= p {
                                1.0
                            } else {
                                0.0
                            }
                        }
                        _ => f32::NAN,
                    };
                    out.set(t, j, decision);
                }
            }
            return Ok(CombinedField {
                grid: out,
                prethresholded: true,
                ternary: false,
            });
        }
    }

    Ok(CombinedField {
        grid: out,
        prethresholded: false,
        ternary: false,
    })
}

/// Weighted mean over non-missing values; NaN when every value is missing.
fn nan_mean(values: impl Iterator<Item = (f32, f64)>) -> f32 {
    let mut sum = 0.0f64;
    let mut weight_sum = 0.0f64;
    for (value, weight) in values {
        if !value.is_nan() {
            sum += value as f64 * weight;
            weight_sum += weight;
        }
    }
    if weight_sum == 0.0 {
        f32::NAN
    } else {
        (sum / weight_sum) as f32
    }
}

/// Maximum over non-missing values; `None` when every value is missing.
fn nan_max(values: impl Iterator<Item = f32>) -> Option<f32> {
    values.filter(|v| !v.is_nan()).fold(None, |acc, v| {
        Some(match acc {
            Some(a) if a >= v => a,
            _ => v,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skill_common::TimeAxis;

    fn field(name: &str, members: u32, values: &[f32]) -> ModelField {
        let time = TimeAxis::new(
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            6,
            values.len(),
        );
        let mut grid = EventGrid::missing(time, vec![12]);
        for (t, &v) in values.iter().enumerate() {
            grid.set(t, 0, v);
        }
        ModelField {
            name: name.to_string(),
            members,
            grid,
        }
    }

    #[test]
    fn model_mean_stays_within_model_range() {
        let models = [
            field("EUE", 51, &[0.2, 0.8, f32::NAN]),
            field("COS", 20, &[0.6, 0.4, 0.5]),
        ];
        let out = combine(&models, CombineApproach::ModelMean, None, None).unwrap();
        for t in 0..3 {
            let value = out.grid.get(t, 0);
            let cell: Vec<f32> = models
                .iter()
                .map(|m| m.grid.get(t, 0))
                .filter(|v| !v.is_nan())
                .collect();
            let min = cell.iter().cloned().fold(f32::INFINITY, f32::min);
            let max = cell.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            assert!(value >= min - 1e-6 && value <= max + 1e-6);
        }
        // missing model excluded, not treated as zero
        assert!((out.grid.get(2, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn member_weighted_with_single_members_reduces_to_model_mean() {
        let models = [
            field("EUD", 1, &[0.0, 1.0, 0.5]),
            field("DWD", 1, &[1.0, 0.0, 0.25]),
        ];
        let mean = combine(&models, CombineApproach::ModelMean, None, None).unwrap();
        let weighted = combine(&models, CombineApproach::MemberWeighted, None, None).unwrap();
        for t in 0..3 {
            assert!((mean.grid.get(t, 0) - weighted.grid.get(t, 0)).abs() < 1e-6);
        }
    }

    #[test]
    fn brier_weights_favor_the_better_model() {
        let models = [field("EUE", 51, &[1.0]), field("COS", 20, &[0.0])];
        let mut scores = HashMap::new();
        scores.insert("EUE".to_string(), HashMap::from([(12u32, 0.1f64)]));
        scores.insert("COS".to_string(), HashMap::from([(12u32, 0.4f64)]));
        let brier = BrierScores::new(scores);
        let out = combine(&models, CombineApproach::BrierWeighted, Some(&brier), None).unwrap();
        // EUE weight 10, COS weight 2.5 -> 10/12.5
        assert!((out.grid.get(0, 0) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn ternary_classes_pass_through_a_single_deterministic_model() {
        let models = [field("EUD", 1, &[0.0, 2.0, 1.0])];
        let out = combine(&models, CombineApproach::ModelMean, None, None).unwrap();
        assert!(out.ternary);
        assert_eq!(out.grid.get(1, 0), 2.0);

        // a second model makes the classes unmergeable
        let models = [field("EUD", 1, &[0.0, 2.0, 1.0]), field("DWD", 1, &[0.0, 0.0, 0.0])];
        assert!(combine(&models, CombineApproach::ModelMean, None, None).is_err());
    }

    #[test]
    fn paired_policy_is_a_binary_and() {
        let models = [
            field("EUD", 1, &[1.0, 1.0, 0.0]),
            field("EUE", 51, &[0.6, 0.2, 0.9]),
        ];
        let out = combine(&models, CombineApproach::Paired, None, Some(0.3)).unwrap();
        assert!(out.prethresholded);
        assert_eq!(out.grid.get(0, 0), 1.0);
        assert_eq!(out.grid.get(1, 0), 0.0);
        assert_eq!(out.grid.get(2, 0), 0.0);
    }
}
