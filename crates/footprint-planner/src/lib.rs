//! Footprint Planner
//!
//! Turns a sensor selection and a drawn area of interest into time-windowed
//! coverage regions by delegating the geometry to an external footprint
//! engine.
//!
//! ```text
//! TreeSelectionModel ──selected sensors──┐
//! PlanningArea ──────────────────────────┼─► PlanningSession::run
//! PlanningHorizon (UTC midnight + days) ─┘        │
//!                                                 ▼ one request per satellite
//!                                          FootprintEngine
//!                                                 │
//!                                                 ▼
//!                                  aggregate::sort_by_start ─► PlanOutcome
//! ```

use chrono::{DateTime, Utc};
use orbital_elements::ElementError;
use sensor_tree::TreeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod export;
pub mod feeds;
pub mod session;

pub use config::PlannerConfig;
pub use engine::{FootprintEngine, FootprintRequest, HttpFootprintEngine};
pub use feeds::{fetch_feeds, FeedFetch};
pub use session::PlanningSession;

/// Seconds per planning day
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Minimum vertex count of a usable region polygon
pub const MIN_POLYGON_VERTICES: usize = 3;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("No planning area defined")]
    NoAreaDefined,
    #[error("Footprint engine is not ready")]
    EngineUnavailable,
    #[error("Footprint engine request failed: {0}")]
    EngineFailed(String),
    #[error("Invalid planning horizon: {0} days")]
    InvalidHorizon(u32),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Elements(#[from] ElementError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;

/// Geographic bounding box of interest, degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanningArea {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl PlanningArea {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Normalize two opposite rectangle corners (`[lon, lat]`) into bounds.
    ///
    /// Returns `None` for zero-width/height or out-of-range rectangles.
    pub fn from_corners(a: [f64; 2], b: [f64; 2]) -> Option<Self> {
        let area = Self::new(
            a[0].min(b[0]),
            a[1].min(b[1]),
            a[0].max(b[0]),
            a[1].max(b[1]),
        );
        area.is_well_formed().then_some(area)
    }

    /// Finite, in range, and strictly ordered on both axes
    pub fn is_well_formed(&self) -> bool {
        let lon_ok = |v: f64| v.is_finite() && (-180.0..=180.0).contains(&v);
        let lat_ok = |v: f64| v.is_finite() && (-90.0..=90.0).contains(&v);

        lon_ok(self.min_lon)
            && lon_ok(self.max_lon)
            && lat_ok(self.min_lat)
            && lat_ok(self.max_lat)
            && self.min_lon < self.max_lon
            && self.min_lat < self.max_lat
    }

    pub fn to_bounds(&self) -> AreaBounds {
        AreaBounds {
            west: self.min_lon,
            east: self.max_lon,
            north: self.max_lat,
            south: self.min_lat,
        }
    }
}

/// Area in the engine's compass-edge form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaBounds {
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

/// Computation time window, unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningHorizon {
    pub start_epoch_seconds: i64,
    pub end_epoch_seconds: i64,
}

impl PlanningHorizon {
    pub fn from_now(days: u32) -> Result<Self> {
        Self::starting_at(Utc::now(), days)
    }

    /// Window of `days` days starting at the UTC midnight on or before `now`
    pub fn starting_at(now: DateTime<Utc>, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(PlannerError::InvalidHorizon(days));
        }
        let ts = now.timestamp();
        let start = ts - ts.rem_euclid(SECONDS_PER_DAY);
        Ok(Self {
            start_epoch_seconds: start,
            end_epoch_seconds: start + i64::from(days) * SECONDS_PER_DAY,
        })
    }
}

/// Per-sensor parameters sent to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    pub satellite_catalog_id: String,
    pub sensor_id: String,
    pub sensor_name: String,
    /// Side-look angle in degrees (the sensor's left side angle)
    pub side_angle: f64,
    pub observe_angle: f64,
    pub init_angle: f64,
    pub color_hex: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
}

/// One time-windowed coverage polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub satellite_id: String,
    pub satellite_name: String,
    pub sensor_id: String,
    /// `[lon, lat]` vertices; the ring is implicitly closed
    pub polygon: Vec<[f64; 2]>,
    pub start_epoch_seconds: i64,
    pub end_epoch_seconds: i64,
    #[serde(default)]
    pub color_hex: String,
}

/// Complete result of one planning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub regions: Vec<Region>,
    /// Satellites with selected sensors but no element lines
    pub skipped_satellites: Vec<String>,
    /// Selected sensors whose satellite could not be resolved
    pub unresolved_sensors: Vec<String>,
    pub horizon: PlanningHorizon,
}

impl PlanOutcome {
    pub fn empty(horizon: PlanningHorizon) -> Self {
        Self {
            regions: Vec::new(),
            skipped_satellites: Vec::new(),
            unresolved_sensors: Vec::new(),
            horizon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_area_well_formed() {
        assert!(PlanningArea::new(10.0, 20.0, 30.0, 40.0).is_well_formed());
        assert!(!PlanningArea::new(30.0, 20.0, 10.0, 40.0).is_well_formed());
        assert!(!PlanningArea::new(10.0, 20.0, 10.0, 40.0).is_well_formed());
        assert!(!PlanningArea::new(10.0, 20.0, 30.0, 95.0).is_well_formed());
        assert!(!PlanningArea::new(f64::NAN, 20.0, 30.0, 40.0).is_well_formed());
    }

    #[test]
    fn test_area_from_corners() {
        let area = PlanningArea::from_corners([30.0, 10.0], [-5.0, 45.0]).unwrap();
        assert_eq!(area, PlanningArea::new(-5.0, 10.0, 30.0, 45.0));
        assert!(PlanningArea::from_corners([1.0, 1.0], [1.0, 5.0]).is_none());

        let bounds = area.to_bounds();
        assert_eq!(bounds.west, -5.0);
        assert_eq!(bounds.east, 30.0);
        assert_eq!(bounds.north, 45.0);
        assert_eq!(bounds.south, 10.0);
    }

    #[test]
    fn test_horizon_truncates_to_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 17, 45, 12).unwrap();
        let horizon = PlanningHorizon::starting_at(now, 3).unwrap();
        let midnight = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap().timestamp();

        assert_eq!(horizon.start_epoch_seconds, midnight);
        assert_eq!(horizon.end_epoch_seconds, midnight + 3 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_zero_day_horizon_rejected() {
        assert!(matches!(
            PlanningHorizon::from_now(0),
            Err(PlannerError::InvalidHorizon(0))
        ));
    }
}
