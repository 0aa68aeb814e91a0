//! Skill scores from confusion counts.

use serde::{Deserialize, Serialize};

use crate::tabulate::ConfusionCounts;

/// Recall, precision and the f_beta combination. `None` marks an
/// undefined score (zero denominator); undefined is not zero, and
/// undefined cells are excluded from ranking rather than dragging the
/// mean down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillScore {
    pub recall: Option<f64>,
    pub precision: Option<f64>,
    pub f_beta: Option<f64>,
}

/// Score one confusion cell.
///
/// recall = tp / (tp + fn), precision = tp / (tp + fp),
/// f_beta = (1 + beta^2) * tp / ((1 + beta^2) * tp + beta^2 * fn + fp).
/// The count form keeps f_beta defined whenever any count is nonzero.
/// beta > 1 favors recall, beta < 1 favors precision.
pub fn score(counts: &ConfusionCounts, beta: f64) -> SkillScore {
    let tp = counts.tp as f64;
    let recall = ratio(tp, tp + counts.fn_ as f64);
    let precision = ratio(tp, tp + counts.fp as f64);
    let b2 = beta * beta;
    let f_beta = ratio(
        (1.0 + b2) * tp,
        (1.0 + b2) * tp + b2 * counts.fn_ as f64 + counts.fp as f64,
    );
    SkillScore {
        recall,
        precision,
        f_beta,
    }
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}
