//! Sensor Tree Library
//!
//! The satellite → sensor hierarchy that planning selections are made from,
//! with per-node tri-state selection (checked / unchecked / indeterminate).
//!
//! ```text
//! root
//! ├── satellite (catalog id, tle1, tle2)
//! │   ├── sensor
//! │   └── sensor
//! └── satellite
//!     └── sensor
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod loader;
pub mod selection;

pub use selection::{ElementUpdate, NodeState, TreeSelectionModel, TriState};

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Invalid node reference: {0}")]
    InvalidReference(String),
    #[error("Node not found: {0}")]
    NotFound(String),
    #[error("Malformed hierarchy: {0}")]
    MalformedHierarchy(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// Satellite attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SatelliteAttributes {
    pub catalog_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tle1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tle2: Option<String>,
    /// Capture time (unix seconds) of the current element lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements_captured_at: Option<i64>,
}

impl SatelliteAttributes {
    /// Both element lines, if present and non-blank
    pub fn elements(&self) -> Option<(&str, &str)> {
        let line1 = self.tle1.as_deref().map(str::trim).filter(|l| !l.is_empty())?;
        let line2 = self.tle2.as_deref().map(str::trim).filter(|l| !l.is_empty())?;
        Some((line1, line2))
    }
}

/// Sensor attributes. Angles are degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorAttributes {
    pub satellite_catalog_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_side_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_side_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observe_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_angle: Option<f64>,
    /// Ground resolution in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
    /// Swath width in km
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

/// Node type together with its type-specific attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Satellite(SatelliteAttributes),
    Sensor(SensorAttributes),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_hex: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl TreeNode {
    pub fn root(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            color_hex: None,
            kind: NodeKind::Root,
        }
    }

    pub fn satellite(
        id: impl Into<String>,
        name: impl Into<String>,
        parent_id: impl Into<String>,
        attributes: SatelliteAttributes,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: Some(parent_id.into()),
            color_hex: None,
            kind: NodeKind::Satellite(attributes),
        }
    }

    pub fn sensor(
        id: impl Into<String>,
        name: impl Into<String>,
        parent_id: impl Into<String>,
        attributes: SensorAttributes,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: Some(parent_id.into()),
            color_hex: None,
            kind: NodeKind::Sensor(attributes),
        }
    }

    pub fn with_color(mut self, color_hex: impl Into<String>) -> Self {
        self.color_hex = Some(color_hex.into());
        self
    }

    pub fn satellite_attributes(&self) -> Option<&SatelliteAttributes> {
        match &self.kind {
            NodeKind::Satellite(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn sensor_attributes(&self) -> Option<&SensorAttributes> {
        match &self.kind {
            NodeKind::Sensor(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn is_satellite(&self) -> bool {
        matches!(self.kind, NodeKind::Satellite(_))
    }

    pub fn is_sensor(&self) -> bool {
        matches!(self.kind, NodeKind::Sensor(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_json_shape() {
        let json = r##"[
            {"id": "root", "name": "All", "type": "root"},
            {"id": "sat-1", "name": "SAT-A", "type": "satellite", "parent_id": "root",
             "color_hex": "#FF0000", "catalog_id": "25544", "tle1": "1 25544U", "tle2": "2 25544"},
            {"id": "sen-1", "name": "PAN", "type": "sensor", "parent_id": "sat-1",
             "satellite_catalog_id": "25544", "observe_angle": 45.0}
        ]"##;

        let nodes: Vec<TreeNode> = serde_json::from_str(json).unwrap();
        assert_eq!(nodes[0].kind, NodeKind::Root);
        let sat = nodes[1].satellite_attributes().unwrap();
        assert_eq!(sat.catalog_id, "25544");
        assert_eq!(sat.elements(), Some(("1 25544U", "2 25544")));
        assert_eq!(nodes[1].color_hex.as_deref(), Some("#FF0000"));
        let sensor = nodes[2].sensor_attributes().unwrap();
        assert_eq!(sensor.observe_angle, Some(45.0));
        assert_eq!(sensor.left_side_angle, None);
    }

    #[test]
    fn test_blank_elements_count_as_missing() {
        let attrs = SatelliteAttributes {
            catalog_id: "1".into(),
            tle1: Some("1 00001U".into()),
            tle2: Some("   ".into()),
            elements_captured_at: None,
        };
        assert_eq!(attrs.elements(), None);
        assert_eq!(SatelliteAttributes::default().elements(), None);
    }
}
