//! Event detection: probability field -> discrete forecasted events.
//!
//! Two rules turn a combined exceedance-probability field into event
//! flags: the probability threshold (skipped for pre-thresholded fields)
//! and the persistence criterion, evaluated along the lead axis at fixed
//! verification time — the current forecast plus the ones issued before
//! it for the same event time. A tolerance window is applied afterwards,
//! to both the observed and the forecasted series, before comparison.

use skill_common::{CriteriaPoint, WindowConfig};

use crate::combine::CombinedField;
use crate::tensor::EventGrid;

/// Apply threshold and persistence, producing a binary event grid.
///
/// Cell (t, j) is an event iff at least `positives` of the `window`
/// consecutive flags at leads j .. j+window-1 (the current forecast and
/// those issued earlier for the same verification time) are positive.
/// Only the available subset counts at the long-lead edge. Missing cells
/// stay missing.
pub fn detect_events(field: &CombinedField, point: &CriteriaPoint) -> EventGrid {
    let grid = &field.grid;
    let threshold = point.probability as f32;
    let flags = if field.prethresholded {
        grid.clone()
    } else if field.ternary {
        // any class >= 1 counts toward persistence
        grid.map(|v| {
            if v.is_nan() {
                f32::NAN
            } else if v >= 1.0 {
                1.0
            } else {
                0.0
            }
        })
    } else {
        grid.map(|v| {
            if v.is_nan() {
                f32::NAN
            } else if v >= threshold {
                1.0
            } else {
                0.0
            }
        })
    };

    let positives = point.persistence.positives as usize;
    let span = point.persistence.window as usize;
    let n_leads = flags.n_leads();
    let mut out = EventGrid::missing(flags.time, flags.lead_hours.clone());
    for t in 0..flags.time.len {
        for j in 0..n_leads {
            if flags.get(t, j).is_nan() {
                continue;
            }
            let hi = (j + span).min(n_leads);
            let count = (j..hi).filter(|&k| flags.get(t, k) == 1.0).count();
            let value = if count < positives {
                0.0
            } else if field.ternary {
                // keep the class for the downstream reconciliation
                grid.get(t, j)
            } else {
                1.0
            };
            out.set(t, j, value);
        }
    }
    out
}

/// Buffer a binary series with the tolerance window: a timestep becomes
/// positive when any positive flag falls inside its window. Width 0 or 1
/// means exact matching; edges use only the available subset. Centered
/// even widths skew one step ahead.
pub fn apply_window(series: &[f32], window: &WindowConfig) -> Vec<f32> {
    if window.width <= 1 {
        return series.to_vec();
    }
    let w = window.width;
    // centered: (w-1)/2 steps behind, w/2 ahead; trailing: w-1 behind
    let (behind, ahead) = if window.center {
        ((w - 1) / 2, w / 2)
    } else {
        (w - 1, 0)
    };
    buffered(series, behind, ahead)
}

/// [`apply_window`] with the even-width skew reversed: centered even
/// widths skew one step back. The forecast series is buffered forward
/// and the observed series backward, so a one-step onset offset matches
/// from either side under width 2.
pub fn apply_window_mirrored(series: &[f32], window: &WindowConfig) -> Vec<f32> {
    if window.width <= 1 {
        return series.to_vec();
    }
    let w = window.width;
    let (behind, ahead) = if window.center {
        (w / 2, (w - 1) / 2)
    } else {
        (w - 1, 0)
    };
    buffered(series, behind, ahead)
}

fn buffered(series: &[f32], behind: usize, ahead: usize) -> Vec<f32> {
    series
        .iter()
        .enumerate()
        .map(|(t, &v)| {
            if v.is_nan() {
                return f32::NAN;
            }
            let lo = t.saturating_sub(behind);
            let hi = (t + ahead).min(series.len() - 1);
            if series[lo..=hi].iter().any(|&x| x == 1.0) {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Number of event onsets in a binary series (0 -> 1 transitions, with a
/// leading positive counting as an onset). Missing values break runs.
pub fn count_onsets(series: &[f32]) -> u64 {
    let mut count = 0u64;
    let mut prev_positive = false;
    for &v in series {
        let positive = v == 1.0;
        if positive && !prev_positive {
            count += 1;
        }
        prev_positive = positive;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skill_common::{Persistence, TimeAxis};

    fn field_with_lead_row(values: &[f32]) -> CombinedField {
        // one verification time, several leads
        let time = TimeAxis::new(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(), 6, 1);
        let lead_hours: Vec<u32> = (1..=values.len() as u32).map(|j| j * 12).collect();
        let mut grid = EventGrid::missing(time, lead_hours);
        for (j, &v) in values.iter().enumerate() {
            grid.set(0, j, v);
        }
        CombinedField {
            grid,
            prethresholded: false,
            ternary: false,
        }
    }

    #[test]
    fn persistence_requires_x_of_y() {
        let point = |x, y| CriteriaPoint {
            probability: 0.5,
            persistence: Persistence::new(x, y),
        };
        // exactly 2 positives within the 3-lead window starting at j=0
        let field = field_with_lead_row(&[0.9, 0.2, 0.8, 0.1]);
        let events = detect_events(&field, &point(2, 3));
        assert_eq!(events.get(0, 0), 1.0);
        // only 1 positive within leads 1..3
        assert_eq!(events.get(0, 1), 0.0);

        // (x) positives trigger, (x - 1) do not
        let field = field_with_lead_row(&[0.9, 0.1, 0.1]);
        assert_eq!(detect_events(&field, &point(1, 3)).get(0, 0), 1.0);
        assert_eq!(detect_events(&field, &point(2, 3)).get(0, 0), 0.0);
    }

    #[test]
    fn prethresholded_fields_skip_the_probability_rule() {
        let mut field = field_with_lead_row(&[1.0, 0.0]);
        field.prethresholded = true;
        let point = CriteriaPoint {
            // would zero everything if applied to a binary field
            probability: 2.0,
            persistence: Persistence::new(1, 1),
        };
        let events = detect_events(&field, &point);
        assert_eq!(events.get(0, 0), 1.0);
        assert_eq!(events.get(0, 1), 0.0);
    }

    #[test]
    fn ternary_fields_keep_their_classes() {
        let mut field = field_with_lead_row(&[2.0, 1.0, 0.0]);
        field.ternary = true;
        let point = CriteriaPoint {
            probability: 0.5,
            persistence: Persistence::new(2, 2),
        };
        let events = detect_events(&field, &point);
        // both flags in the window are >= 1; the class survives
        assert_eq!(events.get(0, 0), 2.0);
        // persistence fails at the next lead
        assert_eq!(events.get(0, 1), 0.0);
    }

    #[test]
    fn missing_cells_stay_missing() {
        let field = field_with_lead_row(&[f32::NAN, 0.9]);
        let point = CriteriaPoint {
            probability: 0.5,
            persistence: Persistence::new(1, 2),
        };
        let events = detect_events(&field, &point);
        assert!(events.get(0, 0).is_nan());
        assert_eq!(events.get(0, 1), 1.0);
    }

    #[test]
    fn centered_window_reaches_one_step_ahead() {
        let series = [0.0, 1.0, 0.0, 0.0];
        let centered = apply_window(
            &series,
            &WindowConfig {
                width: 2,
                center: true,
            },
        );
        assert_eq!(centered, vec![1.0, 1.0, 0.0, 0.0]);

        let trailing = apply_window(
            &series,
            &WindowConfig {
                width: 2,
                center: false,
            },
        );
        assert_eq!(trailing, vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn mirrored_window_reaches_one_step_back() {
        let series = [0.0, 1.0, 0.0, 0.0];
        let window = WindowConfig {
            width: 2,
            center: true,
        };
        assert_eq!(
            apply_window_mirrored(&series, &window),
            vec![0.0, 1.0, 1.0, 0.0]
        );
        // odd widths are symmetric; both variants agree
        let odd = WindowConfig {
            width: 3,
            center: true,
        };
        assert_eq!(apply_window(&series, &odd), apply_window_mirrored(&series, &odd));
    }

    #[test]
    fn zero_width_window_is_exact_matching() {
        let series = [0.0, 1.0, 0.0];
        assert_eq!(
            apply_window(
                &series,
                &WindowConfig {
                    width: 0,
                    center: true
                }
            ),
            series.to_vec()
        );
    }

    #[test]
    fn onset_counting() {
        assert_eq!(count_onsets(&[1.0, 1.0, 0.0, 1.0, 0.0, 1.0]), 3);
        assert_eq!(count_onsets(&[0.0, 0.0]), 0);
        assert_eq!(count_onsets(&[]), 0);
    }
}
