//! The notification-criteria space.
//!
//! A candidate trigger is a [`CriteriaPoint`]: an exceedance-probability
//! threshold paired with a persistence requirement. The search space is the
//! cartesian product of a probability grid and a finite persistence list.

use serde::{Deserialize, Serialize};

use crate::error::{SkillError, SkillResult};

/// Persistence requirement: `positives` positive forecasts within the
/// `window` most recent consecutive forecasts for the same verification
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Persistence {
    pub positives: u8,
    pub window: u8,
}

impl Persistence {
    pub fn new(positives: u8, window: u8) -> Self {
        Self { positives, window }
    }

    /// Ordering magnitude used by the "minimal" tie-break: a wider window
    /// is a stricter (larger) criterion, then the required positives.
    pub fn magnitude(&self) -> (u8, u8) {
        (self.window, self.positives)
    }
}

impl std::fmt::Display for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}of{}", self.positives, self.window)
    }
}

/// One candidate trigger configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriteriaPoint {
    /// Exceedance-probability threshold, in [0, 1].
    pub probability: f64,
    pub persistence: Persistence,
}

impl std::fmt::Display for CriteriaPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{:.2}/{}", self.probability, self.persistence)
    }
}

/// Probability threshold grid: `min`, `min+step`, ... up to `max`
/// inclusive (within floating-point tolerance).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityGrid {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ProbabilityGrid {
    pub fn values(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.max < self.min {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut i = 0u32;
        loop {
            let p = self.min + self.step * i as f64;
            if p > self.max + 1e-9 {
                break;
            }
            out.push(p);
            i += 1;
        }
        out
    }
}

impl Default for ProbabilityGrid {
    fn default() -> Self {
        Self {
            min: 0.05,
            max: 0.95,
            step: 0.05,
        }
    }
}

/// The full criteria search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaGrid {
    pub probability: ProbabilityGrid,
    pub persistence: Vec<Persistence>,
}

impl Default for CriteriaGrid {
    fn default() -> Self {
        Self {
            probability: ProbabilityGrid::default(),
            persistence: vec![
                Persistence::new(1, 1),
                Persistence::new(2, 2),
                Persistence::new(2, 3),
            ],
        }
    }
}

impl CriteriaGrid {
    /// All candidate points, probability-major. Fails when the grid is
    /// empty, since optimization cannot proceed on zero candidates.
    pub fn points(&self) -> SkillResult<Vec<CriteriaPoint>> {
        let probabilities = self.probability.values();
        if probabilities.is_empty() {
            return Err(SkillError::EmptyCriteriaGrid(format!(
                "probability grid min={} max={} step={} has no values",
                self.probability.min, self.probability.max, self.probability.step
            )));
        }
        if self.persistence.is_empty() {
            return Err(SkillError::EmptyCriteriaGrid(
                "persistence list is empty".to_string(),
            ));
        }
        for pers in &self.persistence {
            if pers.positives == 0 || pers.window == 0 || pers.positives > pers.window {
                return Err(SkillError::EmptyCriteriaGrid(format!(
                    "invalid persistence pair {pers}"
                )));
            }
        }
        let mut points = Vec::with_capacity(probabilities.len() * self.persistence.len());
        for &probability in &probabilities {
            for &persistence in &self.persistence {
                points.push(CriteriaPoint {
                    probability,
                    persistence,
                });
            }
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_grid_is_inclusive() {
        let grid = ProbabilityGrid {
            min: 0.1,
            max: 0.5,
            step: 0.1,
        };
        let values = grid.values();
        assert_eq!(values.len(), 5);
        assert!((values[4] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn cartesian_product_size() {
        let grid = CriteriaGrid::default();
        let points = grid.points().unwrap();
        assert_eq!(points.len(), 19 * 3);
    }

    #[test]
    fn empty_grid_is_fatal() {
        let grid = CriteriaGrid {
            probability: ProbabilityGrid {
                min: 0.5,
                max: 0.1,
                step: 0.05,
            },
            persistence: vec![Persistence::new(1, 1)],
        };
        assert!(matches!(
            grid.points(),
            Err(SkillError::EmptyCriteriaGrid(_))
        ));

        let grid = CriteriaGrid {
            probability: ProbabilityGrid::default(),
            persistence: vec![Persistence::new(3, 2)],
        };
        assert!(matches!(
            grid.points(),
            Err(SkillError::EmptyCriteriaGrid(_))
        ));
    }
}
