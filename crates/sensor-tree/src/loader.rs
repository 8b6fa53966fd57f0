//! Hierarchy loading from JSON
//!
//! Two shapes are accepted:
//! - a flat `TreeNode` list (`[{"id", "type", ...}]`)
//! - the catalog shape served by the combined tree endpoint: satellites with
//!   embedded `tle1`/`tle2` and nested sensors

use crate::{
    Result, SatelliteAttributes, SensorAttributes, TreeError, TreeNode, TreeSelectionModel,
};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Id given to the synthesized root of a catalog
pub const CATALOG_ROOT_ID: &str = "root";

/// Raw satellite entry from the tree endpoint
#[derive(Debug, Deserialize)]
pub struct CatalogSatellite {
    #[serde(alias = "noard_id", alias = "norad_id")]
    pub catalog_id: String,
    pub name: String,
    #[serde(default, alias = "hex_color")]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub tle1: Option<String>,
    #[serde(default)]
    pub tle2: Option<String>,
    #[serde(default)]
    pub sensors: Vec<CatalogSensor>,
}

/// Raw sensor entry from the tree endpoint
#[derive(Debug, Deserialize)]
pub struct CatalogSensor {
    pub id: serde_json::Value,
    pub name: String,
    #[serde(default, alias = "sat_noard_id")]
    pub satellite_catalog_id: Option<String>,
    #[serde(default)]
    pub resolution: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub right_side_angle: Option<f64>,
    #[serde(default)]
    pub left_side_angle: Option<f64>,
    #[serde(default)]
    pub observe_angle: Option<f64>,
    #[serde(default, alias = "hex_color")]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub init_angle: Option<f64>,
}

/// Container for the tree endpoint response
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Wrapped { satellites: Vec<CatalogSatellite> },
    Enveloped { data: Vec<CatalogSatellite> },
    Bare(Vec<CatalogSatellite>),
}

fn node_id_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten catalog entries into tree nodes under a synthesized root.
///
/// Satellite node ids are `sat-<catalog id>`, sensor node ids `sensor-<id>`.
pub fn nodes_from_catalog(satellites: Vec<CatalogSatellite>) -> Vec<TreeNode> {
    let mut nodes = vec![TreeNode::root(CATALOG_ROOT_ID, "Satellites")];

    for sat in satellites {
        let sat_id = format!("sat-{}", sat.catalog_id);
        let mut sat_node = TreeNode::satellite(
            sat_id.clone(),
            sat.name,
            CATALOG_ROOT_ID,
            SatelliteAttributes {
                catalog_id: sat.catalog_id.clone(),
                tle1: sat.tle1,
                tle2: sat.tle2,
                elements_captured_at: None,
            },
        );
        sat_node.color_hex = sat.color_hex;
        nodes.push(sat_node);

        for sensor in sat.sensors {
            let mut sensor_node = TreeNode::sensor(
                format!("sensor-{}", node_id_string(&sensor.id)),
                sensor.name,
                sat_id.clone(),
                SensorAttributes {
                    satellite_catalog_id: sensor
                        .satellite_catalog_id
                        .unwrap_or_else(|| sat.catalog_id.clone()),
                    left_side_angle: sensor.left_side_angle,
                    right_side_angle: sensor.right_side_angle,
                    observe_angle: sensor.observe_angle,
                    init_angle: sensor.init_angle,
                    resolution: sensor.resolution,
                    width: sensor.width,
                },
            );
            sensor_node.color_hex = sensor.color_hex;
            nodes.push(sensor_node);
        }
    }

    nodes
}

/// Parse either accepted JSON shape into a model
pub fn model_from_json(json: &str) -> Result<TreeSelectionModel> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    model_from_value(value)
}

fn model_from_value(value: serde_json::Value) -> Result<TreeSelectionModel> {
    let is_flat = value
        .as_array()
        .and_then(|items| items.first())
        .is_some_and(|first| first.get("type").is_some());

    let nodes = if is_flat {
        serde_json::from_value::<Vec<TreeNode>>(value)?
    } else {
        let satellites = match serde_json::from_value::<CatalogFile>(value) {
            Ok(CatalogFile::Wrapped { satellites }) => satellites,
            Ok(CatalogFile::Enveloped { data }) => data,
            Ok(CatalogFile::Bare(satellites)) => satellites,
            Err(e) => {
                return Err(TreeError::MalformedHierarchy(format!(
                    "unrecognized tree document: {}",
                    e
                )))
            }
        };
        nodes_from_catalog(satellites)
    };

    TreeSelectionModel::build(nodes)
}

/// Load the hierarchy from a JSON file
pub fn load_tree(path: impl AsRef<Path>) -> Result<TreeSelectionModel> {
    let path = path.as_ref();
    info!("Loading sensor tree from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let value: serde_json::Value = serde_json::from_reader(reader)?;

    model_from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CATALOG: &str = r##"{
        "satellites": [
            {"noard_id": "25544", "name": "ISS", "hex_color": "#00FF00",
             "tle1": "1 25544U 98067A", "tle2": "2 25544  51.6416",
             "sensors": [
                {"id": 1, "name": "PAN", "sat_noard_id": "25544", "resolution": 0.5,
                 "width": 12.0, "left_side_angle": 15.0, "right_side_angle": 15.0,
                 "observe_angle": 30.0, "hex_color": "#FF00FF", "init_angle": 0.0},
                {"id": 2, "name": "MSS", "resolution": 2.0}
             ]},
            {"noard_id": "20580", "name": "HUBBLE", "sensors": []}
        ]
    }"##;

    #[test]
    fn test_load_catalog() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let model = load_tree(file.path()).unwrap();
        let ids: Vec<&str> = model.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "sat-25544", "sensor-1", "sensor-2", "sat-20580"]);

        let pan = model.find_by_id("sensor-1").unwrap();
        assert_eq!(pan.color_hex.as_deref(), Some("#FF00FF"));
        let attrs = pan.sensor_attributes().unwrap();
        assert_eq!(attrs.resolution, Some(0.5));
        assert_eq!(attrs.left_side_angle, Some(15.0));

        // sensor without sat_noard_id inherits the enclosing satellite's
        let mss = model.find_by_id("sensor-2").unwrap().sensor_attributes().unwrap();
        assert_eq!(mss.satellite_catalog_id, "25544");

        let hubble = model.find_satellite_by_catalog_id("20580").unwrap();
        assert_eq!(hubble.satellite_attributes().unwrap().elements(), None);
    }

    #[test]
    fn test_load_enveloped_catalog() {
        let json = r#"{"success": true, "data": [{"noard_id": "1", "name": "A"}]}"#;
        let model = model_from_json(json).unwrap();
        assert_eq!(model.satellites().count(), 1);
    }

    #[test]
    fn test_load_flat_nodes() {
        let json = r#"[
            {"id": "r", "name": "All", "type": "root"},
            {"id": "s", "name": "SAT", "type": "satellite", "parent_id": "r", "catalog_id": "7"},
            {"id": "x", "name": "CAM", "type": "sensor", "parent_id": "s", "satellite_catalog_id": "7"}
        ]"#;
        let model = model_from_json(json).unwrap();
        assert_eq!(model.root().id, "r");
        assert_eq!(model.sensors_of("s").count(), 1);
    }

    #[test]
    fn test_unrecognized_document() {
        let err = model_from_json(r#"{"foo": 1}"#).unwrap_err();
        assert!(matches!(err, TreeError::MalformedHierarchy(_)));
    }
}
