//! Region ordering and grouping

use crate::Region;
use serde::Serialize;

/// Regions of one satellite, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatelliteRegions {
    pub satellite_id: String,
    pub satellite_name: String,
    pub regions: Vec<Region>,
}

/// Stable ascending sort by start time. The input is left untouched.
pub fn sort_by_start(regions: &[Region]) -> Vec<Region> {
    let mut sorted = regions.to_vec();
    sorted.sort_by_key(|r| r.start_epoch_seconds);
    sorted
}

/// Group regions by satellite, keeping first-appearance order of satellites
pub fn group_by_satellite(regions: &[Region]) -> Vec<SatelliteRegions> {
    let mut groups: Vec<SatelliteRegions> = Vec::new();

    for region in regions {
        match groups
            .iter_mut()
            .find(|g| g.satellite_id == region.satellite_id)
        {
            Some(group) => group.regions.push(region.clone()),
            None => groups.push(SatelliteRegions {
                satellite_id: region.satellite_id.clone(),
                satellite_name: region.satellite_name.clone(),
                regions: vec![region.clone()],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn region(satellite_id: &str, sensor_id: &str, start: i64) -> Region {
        Region {
            satellite_id: satellite_id.to_string(),
            satellite_name: satellite_id.to_uppercase(),
            sensor_id: sensor_id.to_string(),
            polygon: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
            start_epoch_seconds: start,
            end_epoch_seconds: start + 60,
            color_hex: "#1E90FF".to_string(),
        }
    }

    #[test]
    fn test_sort_by_start() {
        let input = vec![region("a", "s1", 300), region("a", "s1", 100), region("b", "s2", 200)];
        let sorted = sort_by_start(&input);

        let starts: Vec<i64> = sorted.iter().map(|r| r.start_epoch_seconds).collect();
        assert_eq!(starts, vec![100, 200, 300]);
        // input untouched
        assert_eq!(input[0].start_epoch_seconds, 300);
    }

    #[test]
    fn test_sort_is_stable() {
        let input = vec![region("a", "first", 100), region("b", "second", 100), region("c", "x", 50)];
        let sorted = sort_by_start(&input);
        let sensors: Vec<&str> = sorted.iter().map(|r| r.sensor_id.as_str()).collect();
        assert_eq!(sensors, vec!["x", "first", "second"]);
    }

    #[test]
    fn test_group_by_satellite() {
        let input = vec![
            region("b", "s1", 10),
            region("a", "s2", 20),
            region("b", "s3", 30),
        ];
        let groups = group_by_satellite(&input);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].satellite_id, "b");
        assert_eq!(groups[0].satellite_name, "B");
        assert_eq!(groups[0].regions.len(), 2);
        assert_eq!(groups[1].satellite_id, "a");
        assert!(group_by_satellite(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_sort_idempotent_and_stable(starts in prop::collection::vec(0i64..50, 0..40)) {
            let input: Vec<Region> = starts
                .iter()
                .enumerate()
                .map(|(i, s)| region("a", &i.to_string(), *s))
                .collect();

            let once = sort_by_start(&input);
            let twice = sort_by_start(&once);
            prop_assert_eq!(&once, &twice);

            for pair in once.windows(2) {
                prop_assert!(pair[0].start_epoch_seconds <= pair[1].start_epoch_seconds);
                if pair[0].start_epoch_seconds == pair[1].start_epoch_seconds {
                    let a: usize = pair[0].sensor_id.parse().unwrap();
                    let b: usize = pair[1].sensor_id.parse().unwrap();
                    prop_assert!(a < b);
                }
            }
        }
    }
}
