//! Shared types for the flood-notification skill assessment.
//!
//! This crate holds the vocabulary used by every pipeline stage:
//! station reference data, time axes and per-model time-grid descriptors,
//! the notification-criteria space, the run configuration and the error
//! taxonomy. The numerical pipeline itself lives in `skill-engine`.

pub mod config;
pub mod criteria;
pub mod error;
pub mod station;
pub mod time;

// Re-export commonly used types at crate root
pub use config::{
    AreaRangeConfig, CombineApproach, OptimizationConfig, SkillConfig, TieBreak, WindowConfig,
};
pub use criteria::{CriteriaGrid, CriteriaPoint, Persistence, ProbabilityGrid};
pub use error::{SkillError, SkillResult};
pub use station::{area_ranges, Station, StationSet};
pub use time::{parse_utc, ModelTimeGrid, TimeAxis};
