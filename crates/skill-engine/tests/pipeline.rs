//! End-to-end pipeline scenarios on synthetic stations: raw forecast
//! tensor through alignment, combination, detection, tabulation,
//! optimization and the comparison report.

use chrono::{Duration, TimeZone, Utc};
use skill_common::{
    CriteriaGrid, CriteriaPoint, ModelTimeGrid, Persistence, ProbabilityGrid, SkillConfig,
    Station, TimeAxis, WindowConfig,
};
use skill_engine::{
    align_forecast, combine, comparison_table, detect_events, optimize, tabulate_all,
    CombinedField, ConfusionCounts, ForecastTensor, ModelField, ObservedSeries, StationInput,
};

fn obs_start() -> chrono::DateTime<chrono::Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 6, 0, 0).unwrap()
}

/// One ensemble model whose aligned 12 h lead column reproduces `probs`
/// on the 6 h observation timeline: 10 issues of 2 leads each, issued
/// 6 h before the first observation step.
fn aligned_model(probs: &[f32; 20]) -> ModelField {
    let issue = TimeAxis::new(obs_start() - Duration::hours(6), 12, 10);
    let mut tensor = ForecastTensor::missing(issue, 6, 2);
    for (t, &p) in probs.iter().enumerate() {
        tensor.set(t / 2, t % 2, p);
    }
    let grid = ModelTimeGrid::new(12, 6, 12);
    let aligned = align_forecast("EUE", &tensor, &grid, 12).unwrap();
    assert_eq!(aligned.lead_hours, vec![12]);
    assert_eq!(aligned.time, TimeAxis::new(obs_start(), 6, 20));
    ModelField {
        name: "EUE".to_string(),
        members: 51,
        grid: aligned,
    }
}

fn station_input(obs: [u8; 20], probs: [f32; 20]) -> StationInput {
    let observed = ObservedSeries::new(TimeAxis::new(obs_start(), 6, 20), obs.to_vec()).unwrap();
    StationInput {
        station: Station {
            id: "G123".to_string(),
            catchment: "po".to_string(),
            area_km2: 2400.0,
            kge: Some(0.87),
        },
        observed,
        models: vec![aligned_model(&probs)],
    }
}

fn single_point_config(window: WindowConfig) -> SkillConfig {
    SkillConfig {
        criteria: CriteriaGrid {
            probability: ProbabilityGrid {
                min: 0.5,
                max: 0.5,
                step: 0.5,
            },
            persistence: vec![Persistence::new(1, 1)],
        },
        lead_times_hours: vec![12],
        window,
        ..Default::default()
    }
}

/// Three observed events all caught, one spurious forecast flag.
#[test]
fn twenty_timestep_scenario_counts_three_hits_and_one_false_alarm() {
    let mut obs = [0u8; 20];
    let mut probs = [0.1f32; 20];
    for t in [3, 9, 15] {
        obs[t] = 1;
        probs[t] = 0.9;
    }
    // the spurious extra flag
    probs[6] = 0.8;

    let config = single_point_config(WindowConfig {
        width: 1,
        center: true,
    });
    let inputs = vec![station_input(obs, probs)];
    let (tables, failures) = tabulate_all(&inputs, &config, None);
    assert!(failures.is_empty());
    assert_eq!(tables.len(), 1);

    let point = CriteriaPoint {
        probability: 0.5,
        persistence: Persistence::new(1, 1),
    };
    let counts = tables[0].get(&point, 12).unwrap();
    assert_eq!(*counts, ConfusionCounts { tp: 3, fn_: 0, fp: 1 });

    let results = optimize(&tables, &config).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].best, point);
    // f1 = 2*3 / (2*3 + 0 + 1)
    assert!((results[0].skill.f_beta.unwrap() - 6.0 / 7.0).abs() < 1e-9);

    let rows = comparison_table(&results);
    assert_eq!(rows[0].lead_hours, 12);
    assert_eq!(rows[0].best_persistence, "1of1");
    assert_eq!(rows[0].stations, 1);
}

/// A one-step timing offset: hit under a centered window, miss plus
/// false alarm under exact matching.
#[test]
fn tolerance_window_absorbs_a_one_step_offset() {
    let mut obs = [0u8; 20];
    let mut probs = [0.1f32; 20];
    obs[8] = 1;
    probs[9] = 0.9;

    let point = CriteriaPoint {
        probability: 0.5,
        persistence: Persistence::new(1, 1),
    };

    let windowed = single_point_config(WindowConfig {
        width: 3,
        center: true,
    });
    let (tables, _) = tabulate_all(&[station_input(obs, probs)], &windowed, None);
    let counts = tables[0].get(&point, 12).unwrap();
    assert_eq!(*counts, ConfusionCounts { tp: 1, fn_: 0, fp: 0 });

    // width 2 already absorbs the offset, in both directions of the
    // comparison: no residual false alarm
    let narrow = single_point_config(WindowConfig {
        width: 2,
        center: true,
    });
    let (tables, _) = tabulate_all(&[station_input(obs, probs)], &narrow, None);
    let counts = tables[0].get(&point, 12).unwrap();
    assert_eq!(*counts, ConfusionCounts { tp: 1, fn_: 0, fp: 0 });

    let exact = single_point_config(WindowConfig {
        width: 0,
        center: true,
    });
    let (tables, _) = tabulate_all(&[station_input(obs, probs)], &exact, None);
    let counts = tables[0].get(&point, 12).unwrap();
    assert_eq!(*counts, ConfusionCounts { tp: 0, fn_: 1, fp: 1 });
}

/// The detector sees the combined field, and the persistence rule runs
/// along the lead axis of the real aligned grid.
#[test]
fn detection_on_an_aligned_combined_field() {
    let mut probs = [0.0f32; 20];
    probs[5] = 0.7;
    let model = aligned_model(&probs);
    let field: CombinedField = combine(
        &[model],
        skill_common::CombineApproach::ModelMean,
        None,
        None,
    )
    .unwrap();
    let events = detect_events(
        &field,
        &CriteriaPoint {
            probability: 0.5,
            persistence: Persistence::new(1, 1),
        },
    );
    let column = events.lead_column(0);
    for (t, &v) in column.iter().enumerate() {
        assert_eq!(v, if t == 5 { 1.0 } else { 0.0 }, "timestep {t}");
    }
}
