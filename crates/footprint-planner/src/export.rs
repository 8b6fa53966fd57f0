//! Outcome exports: GeoJSON for the map layer, tabular rows for reports

use crate::{PlanOutcome, Region};
use chrono::DateTime;
use sensor_tree::TreeSelectionModel;
use serde::Serialize;

/// One report table row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub satellite: String,
    pub sensor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
    pub start: String,
    pub end: String,
}

fn rfc3339(epoch_seconds: i64) -> String {
    DateTime::from_timestamp(epoch_seconds, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// Polygon as a closed GeoJSON ring
fn closed_ring(polygon: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut ring = polygon.to_vec();
    if let (Some(first), Some(last)) = (polygon.first(), polygon.last()) {
        if first != last {
            ring.push(*first);
        }
    }
    ring
}

fn region_feature(region: &Region) -> serde_json::Value {
    serde_json::json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [closed_ring(&region.polygon)]
        },
        "properties": {
            "satellite_id": region.satellite_id,
            "satellite_name": region.satellite_name,
            "sensor_id": region.sensor_id,
            "color": region.color_hex,
            "start_epoch_seconds": region.start_epoch_seconds,
            "end_epoch_seconds": region.end_epoch_seconds,
            "start": rfc3339(region.start_epoch_seconds),
            "end": rfc3339(region.end_epoch_seconds)
        }
    })
}

pub fn to_geojson(outcome: &PlanOutcome) -> serde_json::Value {
    let features: Vec<serde_json::Value> = outcome.regions.iter().map(region_feature).collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
        "metadata": {
            "horizon": outcome.horizon,
            "skipped_satellites": outcome.skipped_satellites,
            "unresolved_sensors": outcome.unresolved_sensors
        }
    })
}

/// Rows in region order. Sensor name and resolution come from the tree;
/// the sensor id stands in for the name when the node is gone.
pub fn table_rows(outcome: &PlanOutcome, tree: &TreeSelectionModel) -> Vec<ReportRow> {
    outcome
        .regions
        .iter()
        .map(|region| {
            let sensor = tree.find_by_id(&region.sensor_id).ok();
            ReportRow {
                satellite: region.satellite_name.clone(),
                sensor: sensor
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| region.sensor_id.clone()),
                resolution: sensor
                    .and_then(|s| s.sensor_attributes())
                    .and_then(|attrs| attrs.resolution),
                start: rfc3339(region.start_epoch_seconds),
                end: rfc3339(region.end_epoch_seconds),
            }
        })
        .collect()
}
