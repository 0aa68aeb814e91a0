//! Ternary exceedance reconciliation.
//!
//! With a reducing factor configured, exceedance carries three classes:
//! 0 below the reduced threshold, 1 between reduced and full, 2 at/above
//! the full threshold. Comparing two ternary values collapses to a binary
//! hit/non-hit decision through a fixed 3x3 outcome table; the off-by-one
//! class pairs (2,1) and (1,2) count as hits, which is the ternary
//! system's tolerance for near-threshold timing or amplitude mismatch.

use serde::{Deserialize, Serialize};

/// Binary classification of one (observed, forecasted) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Hit,
    Miss,
    FalseAlarm,
    /// Not tallied; true negatives are uninformative under class
    /// imbalance.
    TrueNegative,
}

/// The 9-outcome reconciliation table.
///
/// Values above 2 are clamped to 2; upstream contracts guarantee the
/// {0,1,2} domain.
pub fn classify(obs: u8, fcst: u8) -> Outcome {
    match (obs.min(2), fcst.min(2)) {
        (2, 2) => Outcome::Hit,
        // near-threshold tolerance
        (2, 1) | (1, 2) => Outcome::Hit,
        (1, 0) | (2, 0) => Outcome::Miss,
        (0, 1) | (0, 2) => Outcome::FalseAlarm,
        // both merely near the threshold: no event on either side
        (1, 1) => Outcome::TrueNegative,
        (0, 0) => Outcome::TrueNegative,
        _ => unreachable!("classes clamped to {{0,1,2}}"),
    }
}

/// Map a ternary cell to the (observed-event, forecasted-event) bit pair
/// consumed by the windowed comparison: hits become (1,1), misses (1,0),
/// false alarms (0,1), true negatives (0,0).
pub fn reconcile_cell(obs: u8, fcst: u8) -> (bool, bool) {
    match classify(obs, fcst) {
        Outcome::Hit => (true, true),
        Outcome::Miss => (true, false),
        Outcome::FalseAlarm => (false, true),
        Outcome::TrueNegative => (false, false),
    }
}
