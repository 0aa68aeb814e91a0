//! Criteria optimization per stratum.
//!
//! A stratum fixes lead time, combination approach and optionally a
//! catchment-area lower bound; within it the optimizer aggregates the
//! per-station confusion tables, scores every candidate criteria point
//! and picks the f_beta maximizer. Points scoring within `tolerance` of
//! the maximum form a tie set resolved by the configured tie-break.
//! With `kfold` set, station-level cross-validation guards the selection
//! against overfitting a handful of stations: candidates are ranked by
//! their mean f_beta over seeded shuffle-splits of the training
//! partition, and the winner is evaluated once on the held-out test
//! partition.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use skill_common::{
    CombineApproach, CriteriaPoint, SkillConfig, SkillError, SkillResult, TieBreak,
};
use tracing::{debug, warn};

use crate::score::{score, SkillScore};
use crate::tabulate::{aggregate, ConfusionCell, ConfusionCounts, ConfusionTable};

const UNDEFINED: SkillScore = SkillScore {
    recall: None,
    precision: None,
    f_beta: None,
};

/// The operational benchmark scored on the same partition as the winner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSkill {
    pub point: CriteriaPoint,
    pub skill: SkillScore,
}

/// Outcome of the search for one stratum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratumResult {
    pub lead_hours: u32,
    pub approach: CombineApproach,
    /// Area lower bound of the stratum; `None` covers every station in
    /// scope.
    pub min_area_km2: Option<f64>,
    /// Stations aggregated into the stratum.
    pub stations: usize,
    pub best: CriteriaPoint,
    pub skill: SkillScore,
    pub benchmark: Option<BenchmarkSkill>,
}

/// Search the criteria grid for every stratum of the run.
///
/// Strata with no stations or no defined skill are skipped with a
/// warning, not failed.
pub fn optimize(tables: &[ConfusionTable], config: &SkillConfig) -> SkillResult<Vec<StratumResult>> {
    if tables.is_empty() {
        return Err(SkillError::invalid_data("no confusion tables to optimize"));
    }
    let candidates = config.criteria.points()?;

    let mut bounds: Vec<Option<f64>> = vec![None];
    bounds.extend(config.area_strata().into_iter().map(Some));

    let mut results = Vec::new();
    for &lead in &config.lead_times_hours {
        for &bound in &bounds {
            let subset: Vec<&ConfusionTable> = tables
                .iter()
                .filter(|t| bound.map_or(true, |b| t.area_km2 >= b))
                .collect();
            if subset.is_empty() {
                warn!(lead, ?bound, "empty stratum, skipped");
                continue;
            }
            match optimize_stratum(&subset, lead, bound, &candidates, config)? {
                Some(result) => {
                    debug!(
                        lead,
                        ?bound,
                        best = %result.best,
                        f_beta = ?result.skill.f_beta,
                        "stratum optimized"
                    );
                    results.push(result);
                }
                None => warn!(lead, ?bound, "no defined skill in stratum, skipped"),
            }
        }
    }
    Ok(results)
}

fn optimize_stratum(
    subset: &[&ConfusionTable],
    lead: u32,
    bound: Option<f64>,
    candidates: &[CriteriaPoint],
    config: &SkillConfig,
) -> SkillResult<Option<StratumResult>> {
    let opt = &config.optimization;
    let kfold = match opt.kfold {
        // a held-out partition needs at least one station on each side
        Some(k) if subset.len() >= 2 => k,
        _ => return full_scan(subset, lead, bound, candidates, config),
    };

    let mut rng = StdRng::seed_from_u64(opt.seed);
    let (train, test) = split_tables(subset, opt.train_size, opt.stratify, &mut rng);
    if train.is_empty() || test.is_empty() {
        return full_scan(subset, lead, bound, candidates, config);
    }

    // mean f_beta per candidate across the fold training aggregates
    let mut sums = vec![0.0f64; candidates.len()];
    let mut defined = vec![0u32; candidates.len()];
    for _ in 0..kfold {
        let (fold_train, _) = split_tables(&train, opt.train_size, opt.stratify, &mut rng);
        let cells = aggregate(fold_train.iter().copied())?;
        for (i, point) in candidates.iter().enumerate() {
            if let Some(counts) = cell_counts(&cells, point, lead) {
                if let Some(f) = score(counts, config.beta).f_beta {
                    sums[i] += f;
                    defined[i] += 1;
                }
            }
        }
    }

    // precision/recall for the balance tie-break come from the full
    // training aggregate; the ranking score is the fold mean
    let train_cells = aggregate(train.iter().copied())?;
    let scored: Vec<(CriteriaPoint, SkillScore)> = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| defined[*i] > 0)
        .filter_map(|(i, point)| {
            let base = cell_counts(&train_cells, point, lead).map(|c| score(c, config.beta))?;
            Some((
                *point,
                SkillScore {
                    recall: base.recall,
                    precision: base.precision,
                    f_beta: Some(sums[i] / defined[i] as f64),
                },
            ))
        })
        .collect();
    let Some((best, _)) = select(&scored, opt.tolerance, opt.tie_break) else {
        return Ok(None);
    };

    // one evaluation on the held-out partition
    let test_cells = aggregate(test.iter().copied())?;
    let skill = cell_counts(&test_cells, &best, lead)
        .map(|c| score(c, config.beta))
        .unwrap_or(UNDEFINED);
    let benchmark = benchmark_skill(&test_cells, config, lead);
    Ok(Some(StratumResult {
        lead_hours: lead,
        approach: config.approach,
        min_area_km2: bound,
        stations: subset.len(),
        best,
        skill,
        benchmark,
    }))
}

/// The no-CV path: scan and score on the full stratum aggregate.
fn full_scan(
    subset: &[&ConfusionTable],
    lead: u32,
    bound: Option<f64>,
    candidates: &[CriteriaPoint],
    config: &SkillConfig,
) -> SkillResult<Option<StratumResult>> {
    let opt = &config.optimization;
    let cells = aggregate(subset.iter().copied())?;
    let scored: Vec<(CriteriaPoint, SkillScore)> = candidates
        .iter()
        .filter_map(|point| {
            cell_counts(&cells, point, lead).map(|c| (*point, score(c, config.beta)))
        })
        .collect();
    let Some((best, skill)) = select(&scored, opt.tolerance, opt.tie_break) else {
        return Ok(None);
    };
    Ok(Some(StratumResult {
        lead_hours: lead,
        approach: config.approach,
        min_area_km2: bound,
        stations: subset.len(),
        best,
        skill,
        benchmark: benchmark_skill(&cells, config, lead),
    }))
}

/// Resolve the tie set within `tolerance` of the best defined f_beta.
/// `None` when every candidate is undefined.
fn select(
    scored: &[(CriteriaPoint, SkillScore)],
    tolerance: f64,
    tie_break: TieBreak,
) -> Option<(CriteriaPoint, SkillScore)> {
    let best_f = scored
        .iter()
        .filter_map(|(_, s)| s.f_beta)
        .fold(f64::NEG_INFINITY, f64::max);
    if best_f == f64::NEG_INFINITY {
        return None;
    }
    let tied = scored
        .iter()
        .filter(|(_, s)| s.f_beta.is_some_and(|f| f >= best_f - tolerance));
    let chosen = match tie_break {
        TieBreak::Balance => tied.min_by(|a, b| {
            balance_key(&a.1)
                .partial_cmp(&balance_key(&b.1))
                .unwrap_or(Ordering::Equal)
        }),
        TieBreak::Minimal => tied.min_by(|a, b| {
            minimal_key(&a.0)
                .partial_cmp(&minimal_key(&b.0))
                .unwrap_or(Ordering::Equal)
        }),
    }?;
    Some(*chosen)
}

fn balance_key(skill: &SkillScore) -> f64 {
    match (skill.precision, skill.recall) {
        (Some(p), Some(r)) => (p - r).abs(),
        _ => f64::INFINITY,
    }
}

fn minimal_key(point: &CriteriaPoint) -> (f64, (u8, u8)) {
    (point.probability, point.persistence.magnitude())
}

fn benchmark_skill(
    cells: &[ConfusionCell],
    config: &SkillConfig,
    lead: u32,
) -> Option<BenchmarkSkill> {
    let point = config.current_criteria?;
    let counts = cell_counts(cells, &point, lead)?;
    Some(BenchmarkSkill {
        point,
        skill: score(counts, config.beta),
    })
}

fn cell_counts<'a>(
    cells: &'a [ConfusionCell],
    point: &CriteriaPoint,
    lead: u32,
) -> Option<&'a ConfusionCounts> {
    cells
        .iter()
        .find(|c| {
            c.lead_hours == lead
                && c.persistence == point.persistence
                && (c.probability - point.probability).abs() < 1e-9
        })
        .map(|c| &c.counts)
}

/// Shuffle-split tables into train and test partitions, optionally
/// stratified by observed-event count (buckets 0, 1, 2, >= 3), so rare
/// event-rich stations spread across both partitions.
fn split_tables<'a>(
    tables: &[&'a ConfusionTable],
    train_size: f64,
    stratify: bool,
    rng: &mut StdRng,
) -> (Vec<&'a ConfusionTable>, Vec<&'a ConfusionTable>) {
    let mut groups: BTreeMap<u64, Vec<&ConfusionTable>> = BTreeMap::new();
    for &table in tables {
        let bucket = if stratify {
            table.observed_events.min(3)
        } else {
            0
        };
        groups.entry(bucket).or_default().push(table);
    }
    let mut train = Vec::new();
    let mut test = Vec::new();
    for mut group in groups.into_values() {
        group.shuffle(rng);
        let mut n_train = ((group.len() as f64) * train_size).round() as usize;
        n_train = n_train.clamp(1, group.len());
        if n_train == group.len() && group.len() > 1 {
            n_train -= 1;
        }
        for (i, table) in group.into_iter().enumerate() {
            if i < n_train {
                train.push(table);
            } else {
                test.push(table);
            }
        }
    }
    (train, test)
}
