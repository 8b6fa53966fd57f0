//! Planner configuration

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

pub const DEFAULT_HORIZON_DAYS: u32 = 3;
pub const DEFAULT_COLOR: &str = "#1E90FF";
pub const FALLBACK_SIDE_ANGLE: f64 = 0.0;
pub const FALLBACK_OBSERVE_ANGLE: f64 = 60.0;
pub const FALLBACK_INIT_ANGLE: f64 = 0.0;

/// Defaults applied to every planning run.
///
/// Fields missing from a config file keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub horizon_days: u32,
    /// Region color for sensors without one
    pub default_color: String,
    pub fallback_side_angle: f64,
    pub fallback_observe_angle: f64,
    pub fallback_init_angle: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            default_color: DEFAULT_COLOR.to_string(),
            fallback_side_angle: FALLBACK_SIDE_ANGLE,
            fallback_observe_angle: FALLBACK_OBSERVE_ANGLE,
            fallback_init_angle: FALLBACK_INIT_ANGLE,
        }
    }
}

impl PlannerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading planner config from {:?}", path);

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
