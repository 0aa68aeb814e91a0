//! Confusion-matrix computation and skill-optimization engine.
//!
//! Retrospective skill assessment of a flood-notification service: given
//! observed (reanalysis) exceedance series and per-model forecast
//! exceedance tensors, the engine measures how often each candidate
//! notification trigger would have hit, missed or falsely warned, and
//! searches the criteria grid for the trigger maximizing the Fβ score.
//!
//! Pipeline, strictly top to bottom:
//!
//! ```text
//! ForecastTensor (issue × lead, native frequencies)
//!      │  align          reshape onto the observation timeline
//!      ▼
//! EventGrid (event-time × lead)
//!      │  combine        merge NWP models under a policy
//!      ▼
//! CombinedField
//!      │  trinary        (ternary mode) 9-outcome reconciliation
//!      │  detect         probability threshold + persistence + window
//!      ▼
//! forecasted events
//!      │  tabulate       TP/FN/FP per station over the criteria grid
//!      ▼
//! ConfusionTable
//!      │  score          recall / precision / Fβ
//!      │  optimize       tie-broken, optionally cross-validated search
//!      ▼
//! OptimizedCriteria + comparison report
//! ```
//!
//! Every stage produces a new value; nothing is mutated in place, so any
//! stage can be re-run independently.

pub mod align;
pub mod combine;
pub mod detect;
pub mod optimize;
pub mod report;
pub mod score;
pub mod tabulate;
pub mod tensor;
pub mod trinary;

// Re-export commonly used types at crate root
pub use align::{align_forecast, trim_incomplete};
pub use combine::{combine, BrierScores, CombinedField, ModelField};
pub use detect::{apply_window, apply_window_mirrored, count_onsets, detect_events};
pub use optimize::{optimize, BenchmarkSkill, StratumResult};
pub use report::{comparison_table, write_comparison_csv, ComparisonRow};
pub use score::{score, SkillScore};
pub use tabulate::{
    aggregate, candidate_points, tabulate_all, tabulate_station, ConfusionCell, ConfusionCounts,
    ConfusionTable, StationInput,
};
pub use tensor::{EventGrid, ForecastTensor, ObservedSeries};
pub use trinary::{classify, reconcile_cell, Outcome};
