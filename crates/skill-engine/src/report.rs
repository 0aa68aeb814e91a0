//! Flat comparison report: optimized vs. operational criteria.
//!
//! One row per stratum, serializable to JSON and exportable as CSV for
//! the forecasters' spreadsheets.

use std::io::Write;

use serde::{Deserialize, Serialize};
use skill_common::SkillResult;

use crate::optimize::StratumResult;

/// One stratum of the comparison table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub lead_hours: u32,
    pub approach: String,
    pub min_area_km2: Option<f64>,
    pub stations: usize,
    pub best_probability: f64,
    /// Persistence in `x of y` notation.
    pub best_persistence: String,
    pub recall: Option<f64>,
    pub precision: Option<f64>,
    pub f_beta: Option<f64>,
    pub benchmark_probability: Option<f64>,
    pub benchmark_persistence: Option<String>,
    pub benchmark_f_beta: Option<f64>,
}

/// Flatten the optimization results into comparison rows.
pub fn comparison_table(results: &[StratumResult]) -> Vec<ComparisonRow> {
    results
        .iter()
        .map(|r| ComparisonRow {
            lead_hours: r.lead_hours,
            approach: r.approach.as_str().to_string(),
            min_area_km2: r.min_area_km2,
            stations: r.stations,
            best_probability: r.best.probability,
            best_persistence: r.best.persistence.to_string(),
            recall: r.skill.recall,
            precision: r.skill.precision,
            f_beta: r.skill.f_beta,
            benchmark_probability: r.benchmark.map(|b| b.point.probability),
            benchmark_persistence: r.benchmark.map(|b| b.point.persistence.to_string()),
            benchmark_f_beta: r.benchmark.and_then(|b| b.skill.f_beta),
        })
        .collect()
}

/// Write the comparison table as CSV. Undefined scores stay empty cells
/// rather than zeros.
pub fn write_comparison_csv(rows: &[ComparisonRow], out: &mut impl Write) -> SkillResult<()> {
    writeln!(
        out,
        "lead_hours,approach,min_area_km2,stations,best_probability,best_persistence,\
         recall,precision,f_beta,benchmark_probability,benchmark_persistence,benchmark_f_beta"
    )?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{},{:.2},{},{},{},{},{},{},{}",
            row.lead_hours,
            row.approach,
            opt_num(row.min_area_km2, 0),
            row.stations,
            row.best_probability,
            row.best_persistence,
            opt_num(row.recall, 4),
            opt_num(row.precision, 4),
            opt_num(row.f_beta, 4),
            opt_num(row.benchmark_probability, 2),
            row.benchmark_persistence.as_deref().unwrap_or(""),
            opt_num(row.benchmark_f_beta, 4),
        )?;
    }
    Ok(())
}

fn opt_num(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skill_common::{CombineApproach, CriteriaPoint, Persistence};

    use crate::optimize::BenchmarkSkill;
    use crate::score::SkillScore;

    fn result() -> StratumResult {
        StratumResult {
            lead_hours: 60,
            approach: CombineApproach::ModelMean,
            min_area_km2: None,
            stations: 42,
            best: CriteriaPoint {
                probability: 0.35,
                persistence: Persistence::new(2, 3),
            },
            skill: SkillScore {
                recall: Some(0.9),
                precision: Some(0.75),
                f_beta: Some(0.818_181_818_181_818_2),
            },
            benchmark: Some(BenchmarkSkill {
                point: CriteriaPoint {
                    probability: 0.3,
                    persistence: Persistence::new(1, 1),
                },
                skill: SkillScore {
                    recall: Some(0.95),
                    precision: Some(0.5),
                    f_beta: Some(0.655_172_413_793_103_5),
                },
            }),
        }
    }

    #[test]
    fn rows_carry_both_sides_of_the_comparison() {
        let rows = comparison_table(&[result()]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].best_persistence, "2of3");
        assert_eq!(rows[0].benchmark_persistence.as_deref(), Some("1of1"));
        assert!(rows[0].f_beta.unwrap() > rows[0].benchmark_f_beta.unwrap());
    }

    #[test]
    fn csv_leaves_undefined_scores_empty() {
        let mut stratum = result();
        stratum.skill = SkillScore {
            recall: None,
            precision: None,
            f_beta: None,
        };
        stratum.benchmark = None;
        let rows = comparison_table(&[stratum]);
        let mut buffer = Vec::new();
        write_comparison_csv(&rows, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("lead_hours,approach"));
        let data = lines.next().unwrap();
        assert_eq!(data, "60,model_mean,,42,0.35,2of3,,,,,,");
    }
}
