//! Reporting-point reference data.
//!
//! Stations are produced upstream (selection and spatial de-duplication are
//! out of scope); the pipeline only filters them by catchment area and
//! looks them up by id.

use serde::{Deserialize, Serialize};

/// One reporting point on the river network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    /// Station identifier, unique across the study domain.
    pub id: String,
    /// Catchment identifier the station belongs to.
    pub catchment: String,
    /// Upstream catchment area in km².
    pub area_km2: f64,
    /// Kling-Gupta efficiency of the reanalysis at this point, if known.
    #[serde(default)]
    pub kge: Option<f64>,
}

/// The set of active reporting points for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationSet {
    stations: Vec<Station>,
}

impl StationSet {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    /// Stations whose catchment area reaches the configured minimum.
    pub fn in_scope(&self, min_area_km2: f64) -> Vec<&Station> {
        self.stations
            .iter()
            .filter(|s| s.area_km2 >= min_area_km2)
            .collect()
    }
}

/// Semilog catchment-area range bounds: 1, 1.5, 2, 3, 5 and 7 times each
/// power of ten, clipped to `[min_km2, max_km2]` (both endpoints kept).
/// Empty when the span is degenerate.
pub fn area_ranges(min_km2: f64, max_km2: f64) -> Vec<f64> {
    const MANTISSAS: [f64; 6] = [1.0, 1.5, 2.0, 3.0, 5.0, 7.0];
    if min_km2 <= 0.0 || max_km2 < min_km2 {
        return Vec::new();
    }
    let mut bounds = vec![min_km2];
    let mut decade = min_km2.log10().floor() as i32;
    'decades: loop {
        let base = 10f64.powi(decade);
        for m in MANTISSAS {
            let bound = m * base;
            if bound >= max_km2 {
                break 'decades;
            }
            if bound > min_km2 {
                bounds.push(bound);
            }
        }
        decade += 1;
    }
    if max_km2 > min_km2 {
        bounds.push(max_km2);
    }
    bounds
}
