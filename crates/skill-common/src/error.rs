//! Error types for the skill assessment pipeline.

use thiserror::Error;

/// Errors that can occur while assessing notification skill.
///
/// Missing forecast cells are NOT an error: they propagate as NaN through
/// the pipeline and are excluded from means and weight renormalization.
/// Likewise an undefined score (zero denominator) is represented as `None`
/// in `SkillScore`, never as an error or a zero.
#[derive(Error, Debug)]
pub enum SkillError {
    /// A forecast tensor cannot be reshaped onto the target event grid.
    /// Fatal for that model/station only; the run continues.
    #[error("cannot align forecast of model '{model}' onto the event grid: {detail}")]
    ShapeMismatch { model: String, detail: String },

    /// The configured criteria grid has no candidate points. Fatal:
    /// optimization cannot proceed.
    #[error("criteria grid is empty: {0}")]
    EmptyCriteriaGrid(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Time axes of two series do not describe the same timeline.
    #[error("time axis error: {0}")]
    Time(String),

    /// Input data violates its contract (missing station, wrong value
    /// domain, inconsistent member count).
    #[error("invalid input data: {0}")]
    InvalidData(String),

    /// Unexpected failure while processing one station. Isolated: the
    /// remaining stations keep running and the failure is reported in
    /// the end-of-run summary.
    #[error("station {station} failed: {source}")]
    StationFailed {
        station: String,
        #[source]
        source: Box<SkillError>,
    },

    /// Filesystem error while reading inputs or writing results.
    #[error("io error: {0}")]
    Io(String),

    /// Serialization error in one of the data contracts.
    #[error("serialization error: {0}")]
    Serde(String),
}

impl SkillError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(model: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            model: model.into(),
            detail: detail.into(),
        }
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a Time error.
    pub fn time(msg: impl Into<String>) -> Self {
        Self::Time(msg.into())
    }

    /// Create an InvalidData error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Wrap an error as a per-station failure.
    pub fn station_failed(station: impl Into<String>, source: SkillError) -> Self {
        Self::StationFailed {
            station: station.into(),
            source: Box::new(source),
        }
    }
}

impl From<std::io::Error> for SkillError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SkillError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

impl From<serde_yaml::Error> for SkillError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

/// Result type for skill assessment operations.
pub type SkillResult<T> = std::result::Result<T, SkillError>;
