//! Planning session orchestration

use crate::aggregate::sort_by_start;
use crate::engine::{FootprintEngine, FootprintRequest};
use crate::{
    PlanOutcome, PlannerConfig, PlannerError, PlanningArea, PlanningHorizon, Result, SensorSpec,
    MIN_POLYGON_VERTICES,
};
use chrono::{DateTime, Utc};
use sensor_tree::{TreeNode, TreeSelectionModel};
use tracing::{debug, error, info, warn};

/// Selected sensors of one satellite
struct SensorGroup<'a> {
    satellite: &'a TreeNode,
    sensors: Vec<&'a TreeNode>,
}

/// One operator's planning interaction: the engine, the run defaults and the
/// currently drawn area.
///
/// Runs borrow the session and the tree immutably and return a complete
/// replacement result.
#[derive(Debug, Clone)]
pub struct PlanningSession<E> {
    engine: E,
    config: PlannerConfig,
    area: Option<PlanningArea>,
}

impl<E: FootprintEngine> PlanningSession<E> {
    pub fn new(engine: E, config: PlannerConfig) -> Self {
        Self {
            engine,
            config,
            area: None,
        }
    }

    /// Replace the area wholesale
    pub fn set_area(&mut self, area: PlanningArea) {
        debug!("Planning area set: {:?}", area);
        self.area = Some(area);
    }

    pub fn clear_area(&mut self) {
        self.area = None;
    }

    pub fn area(&self) -> Option<&PlanningArea> {
        self.area.as_ref()
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Plan over `horizon_days` (or the configured default) starting today
    pub async fn run(
        &self,
        tree: &TreeSelectionModel,
        horizon_days: Option<u32>,
    ) -> Result<PlanOutcome> {
        self.run_at(tree, horizon_days, Utc::now()).await
    }

    /// Plan with the horizon anchored at the UTC midnight on or before `now`
    pub async fn run_at(
        &self,
        tree: &TreeSelectionModel,
        horizon_days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<PlanOutcome> {
        let area = match self.area {
            Some(area) if area.is_well_formed() => area,
            Some(area) => {
                warn!("Rejecting malformed planning area {:?}", area);
                return Err(PlannerError::NoAreaDefined);
            }
            None => return Err(PlannerError::NoAreaDefined),
        };

        if !self.engine.is_ready() {
            return Err(PlannerError::EngineUnavailable);
        }

        let horizon =
            PlanningHorizon::starting_at(now, horizon_days.unwrap_or(self.config.horizon_days))?;

        let selected = tree.selected_sensor_ids();
        if selected.is_empty() {
            info!("No sensors selected, nothing to plan");
            return Ok(PlanOutcome::empty(horizon));
        }

        let mut outcome = PlanOutcome::empty(horizon);
        let groups = group_sensors(tree, &selected, &mut outcome.unresolved_sensors);

        for group in groups {
            let Some((line1, line2)) = group
                .satellite
                .satellite_attributes()
                .and_then(|attrs| attrs.elements())
            else {
                warn!(
                    "Skipping satellite {} ({}): no element lines",
                    group.satellite.name, group.satellite.id
                );
                outcome.skipped_satellites.push(group.satellite.id.clone());
                continue;
            };

            let request = FootprintRequest {
                satellite_id: group.satellite.id.clone(),
                satellite_name: group.satellite.name.clone(),
                tle_line1: line1.to_string(),
                tle_line2: line2.to_string(),
                sensors: group
                    .sensors
                    .iter()
                    .map(|sensor| self.sensor_spec(sensor))
                    .collect(),
                start_epoch_seconds: horizon.start_epoch_seconds,
                end_epoch_seconds: horizon.end_epoch_seconds,
                area: area.to_bounds(),
            };

            let regions = match self.engine.compute_footprints(&request).await {
                Ok(regions) => regions,
                Err(e) => {
                    error!("Footprint request for {} failed: {}", request.satellite_id, e);
                    return Err(e);
                }
            };

            debug!(
                "Engine returned {} regions for {}",
                regions.len(),
                request.satellite_id
            );

            for mut region in regions {
                if region.polygon.len() < MIN_POLYGON_VERTICES {
                    warn!(
                        "Dropping region for sensor {} with {} vertices",
                        region.sensor_id,
                        region.polygon.len()
                    );
                    continue;
                }
                if region.color_hex.is_empty() {
                    region.color_hex = self.config.default_color.clone();
                }
                outcome.regions.push(region);
            }
        }

        outcome.regions = sort_by_start(&outcome.regions);

        info!(
            "Planned {} regions ({} satellites skipped, {} sensors unresolved)",
            outcome.regions.len(),
            outcome.skipped_satellites.len(),
            outcome.unresolved_sensors.len()
        );

        Ok(outcome)
    }

    fn sensor_spec(&self, sensor: &TreeNode) -> SensorSpec {
        let attrs = sensor.sensor_attributes().cloned().unwrap_or_default();

        SensorSpec {
            satellite_catalog_id: attrs.satellite_catalog_id,
            sensor_id: sensor.id.clone(),
            sensor_name: sensor.name.clone(),
            side_angle: attrs.left_side_angle.unwrap_or(self.config.fallback_side_angle),
            observe_angle: attrs
                .observe_angle
                .unwrap_or(self.config.fallback_observe_angle),
            init_angle: attrs.init_angle.unwrap_or(self.config.fallback_init_angle),
            color_hex: sensor
                .color_hex
                .clone()
                .unwrap_or_else(|| self.config.default_color.clone()),
            resolution: attrs.resolution,
        }
    }
}

/// Group selected sensors by owning satellite, in first-appearance order.
///
/// Sensors whose satellite cannot be resolved are appended to `unresolved`.
fn group_sensors<'a>(
    tree: &'a TreeSelectionModel,
    selected: &[String],
    unresolved: &mut Vec<String>,
) -> Vec<SensorGroup<'a>> {
    let mut groups: Vec<SensorGroup<'a>> = Vec::new();

    for sensor_id in selected {
        let satellite = tree.find_by_id(sensor_id).ok().and_then(|sensor| {
            let attrs = sensor.sensor_attributes()?;
            let satellite = tree
                .find_satellite_by_catalog_id(&attrs.satellite_catalog_id)
                .ok()?;
            Some((sensor, satellite))
        });

        let Some((sensor, satellite)) = satellite else {
            warn!("Sensor {} has no resolvable satellite, skipping", sensor_id);
            unresolved.push(sensor_id.clone());
            continue;
        };

        match groups.iter_mut().find(|g| g.satellite.id == satellite.id) {
            Some(group) => group.sensors.push(sensor),
            None => groups.push(SensorGroup {
                satellite,
                sensors: vec![sensor],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Region;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use sensor_tree::{SatelliteAttributes, SensorAttributes};
    use std::sync::Mutex;

    /// Engine stub that records requests and answers with canned starts
    struct MockEngine {
        ready: bool,
        fail: bool,
        starts: Vec<i64>,
        calls: Mutex<Vec<FootprintRequest>>,
    }

    impl MockEngine {
        fn ready(starts: Vec<i64>) -> Self {
            Self {
                ready: true,
                fail: false,
                starts,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<FootprintRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FootprintEngine for MockEngine {
        fn is_ready(&self) -> bool {
            self.ready
        }

        async fn compute_footprints(&self, request: &FootprintRequest) -> Result<Vec<Region>> {
            self.calls.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(PlannerError::EngineFailed("connection reset".into()));
            }
            Ok(self
                .starts
                .iter()
                .map(|start| Region {
                    satellite_id: request.satellite_id.clone(),
                    satellite_name: request.satellite_name.clone(),
                    sensor_id: request.sensors[0].sensor_id.clone(),
                    polygon: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
                    start_epoch_seconds: *start,
                    end_epoch_seconds: start + 60,
                    color_hex: String::new(),
                })
                .collect())
        }
    }

    fn satellite(id: &str, catalog_id: &str, with_elements: bool) -> TreeNode {
        TreeNode::satellite(
            id,
            id.to_uppercase(),
            "root",
            SatelliteAttributes {
                catalog_id: catalog_id.to_string(),
                tle1: with_elements.then(|| format!("1 {}U 98067A", catalog_id)),
                tle2: with_elements.then(|| format!("2 {} 51.6416", catalog_id)),
                elements_captured_at: None,
            },
        )
    }

    fn sensor(id: &str, sat_id: &str, catalog_id: &str) -> TreeNode {
        TreeNode::sensor(
            id,
            id.to_uppercase(),
            sat_id,
            SensorAttributes {
                satellite_catalog_id: catalog_id.to_string(),
                left_side_angle: Some(12.5),
                ..Default::default()
            },
        )
    }

    /// sat-a has elements, sat-b does not
    fn tree() -> TreeSelectionModel {
        TreeSelectionModel::build(vec![
            TreeNode::root("root", "Satellites"),
            satellite("sat-a", "11111", true),
            sensor("a1", "sat-a", "11111"),
            sensor("a2", "sat-a", "11111").with_color("#00FF00"),
            satellite("sat-b", "22222", false),
            sensor("b1", "sat-b", "22222"),
        ])
        .unwrap()
    }

    fn session(engine: MockEngine) -> PlanningSession<MockEngine> {
        let mut session = PlanningSession::new(engine, PlannerConfig::default());
        session.set_area(PlanningArea::new(100.0, 20.0, 120.0, 40.0));
        session
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_no_area_defined() {
        let mut session = session(MockEngine::ready(vec![100]));
        session.clear_area();
        let mut tree = tree();
        tree.toggle("sat-a", true).unwrap();

        let err = session.run_at(&tree, None, now()).await.unwrap_err();
        assert!(matches!(err, PlannerError::NoAreaDefined));
        assert!(session.engine().calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_area_is_no_area() {
        let mut session = session(MockEngine::ready(vec![100]));
        session.set_area(PlanningArea::new(50.0, 20.0, 10.0, 40.0));
        let err = session.run_at(&tree(), None, now()).await.unwrap_err();
        assert!(matches!(err, PlannerError::NoAreaDefined));
    }

    #[tokio::test]
    async fn test_engine_unavailable() {
        let mut engine = MockEngine::ready(vec![100]);
        engine.ready = false;
        let session = session(engine);
        let mut tree = tree();
        tree.toggle("sat-a", true).unwrap();

        let err = session.run_at(&tree, None, now()).await.unwrap_err();
        assert!(matches!(err, PlannerError::EngineUnavailable));
        assert!(session.engine().calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_selection_makes_no_calls() {
        let session = session(MockEngine::ready(vec![100]));
        let outcome = session.run_at(&tree(), None, now()).await.unwrap();

        assert!(outcome.regions.is_empty());
        assert!(outcome.skipped_satellites.is_empty());
        assert!(session.engine().calls().is_empty());
    }

    #[tokio::test]
    async fn test_satellite_without_elements_is_skipped() {
        let session = session(MockEngine::ready(vec![300, 100, 200]));
        let mut tree = tree();
        tree.toggle("a1", true).unwrap();
        tree.toggle("b1", true).unwrap();

        let outcome = session.run_at(&tree, None, now()).await.unwrap();

        let calls = session.engine().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].satellite_id, "sat-a");
        assert_eq!(outcome.skipped_satellites, vec!["sat-b".to_string()]);
        assert!(outcome.regions.iter().all(|r| r.satellite_id == "sat-a"));

        let starts: Vec<i64> = outcome.regions.iter().map(|r| r.start_epoch_seconds).collect();
        assert_eq!(starts, vec![100, 200, 300]);
        assert!(outcome.regions.iter().all(|r| r.color_hex == "#1E90FF"));
    }

    #[tokio::test]
    async fn test_request_contents() {
        let session = session(MockEngine::ready(vec![100]));
        let mut tree = tree();
        tree.toggle("sat-a", true).unwrap();

        let outcome = session.run_at(&tree, Some(2), now()).await.unwrap();
        let calls = session.engine().calls();
        let request = &calls[0];

        let midnight = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap().timestamp();
        assert_eq!(request.start_epoch_seconds, midnight);
        assert_eq!(request.end_epoch_seconds, midnight + 2 * 86_400);
        assert_eq!(outcome.horizon.start_epoch_seconds, midnight);

        assert_eq!(request.tle_line1, "1 11111U 98067A");
        assert_eq!(request.area.west, 100.0);
        assert_eq!(request.area.north, 40.0);

        assert_eq!(request.sensors.len(), 2);
        let a1 = &request.sensors[0];
        assert_eq!(a1.sensor_id, "a1");
        assert_eq!(a1.side_angle, 12.5);
        assert_eq!(a1.observe_angle, 60.0);
        assert_eq!(a1.init_angle, 0.0);
        assert_eq!(a1.color_hex, "#1E90FF");
        assert_eq!(request.sensors[1].color_hex, "#00FF00");
    }

    #[tokio::test]
    async fn test_degenerate_polygons_dropped() {
        struct ThinEngine;

        #[async_trait]
        impl FootprintEngine for ThinEngine {
            fn is_ready(&self) -> bool {
                true
            }

            async fn compute_footprints(&self, request: &FootprintRequest) -> Result<Vec<Region>> {
                let region = |polygon: Vec<[f64; 2]>| Region {
                    satellite_id: request.satellite_id.clone(),
                    satellite_name: request.satellite_name.clone(),
                    sensor_id: "a1".into(),
                    polygon,
                    start_epoch_seconds: 0,
                    end_epoch_seconds: 1,
                    color_hex: "#ABCDEF".into(),
                };
                Ok(vec![
                    region(vec![[0.0, 0.0], [1.0, 1.0]]),
                    region(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
                ])
            }
        }

        let mut session = PlanningSession::new(ThinEngine, PlannerConfig::default());
        session.set_area(PlanningArea::new(0.0, 0.0, 1.0, 1.0));
        let mut tree = tree();
        tree.toggle("a1", true).unwrap();

        let outcome = session.run_at(&tree, None, now()).await.unwrap();
        assert_eq!(outcome.regions.len(), 1);
        assert_eq!(outcome.regions[0].polygon.len(), 4);
        assert_eq!(outcome.regions[0].color_hex, "#ABCDEF");
    }

    #[tokio::test]
    async fn test_engine_failure_aborts_run() {
        let mut engine = MockEngine::ready(vec![100]);
        engine.fail = true;
        let session = session(engine);
        let mut tree = tree();
        tree.toggle("a1", true).unwrap();

        let err = session.run_at(&tree, None, now()).await.unwrap_err();
        assert!(matches!(err, PlannerError::EngineFailed(_)));
    }

    #[tokio::test]
    async fn test_zero_day_horizon() {
        let session = session(MockEngine::ready(vec![100]));
        let err = session.run_at(&tree(), Some(0), now()).await.unwrap_err();
        assert!(matches!(err, PlannerError::InvalidHorizon(0)));
    }

    #[test]
    fn test_unknown_sensor_is_unresolved() {
        let tree = tree();
        let mut unresolved = Vec::new();
        let groups = group_sensors(
            &tree,
            &["a1".to_string(), "ghost".to_string(), "b1".to_string(), "a2".to_string()],
            &mut unresolved,
        );

        assert_eq!(unresolved, vec!["ghost".to_string()]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].satellite.id, "sat-a");
        assert_eq!(groups[0].sensors.len(), 2);
        assert_eq!(groups[1].satellite.id, "sat-b");
    }
}
