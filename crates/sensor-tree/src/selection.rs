//! Tri-state selection over the satellite/sensor hierarchy

use crate::{NodeKind, Result, TreeError, TreeNode};
use orbital_elements::{normalize_catalog_id, OrbitalElementRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Selection flags of a single node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub checked: bool,
    pub indeterminate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriState {
    Unchecked,
    Checked,
    Indeterminate,
}

impl NodeState {
    const CHECKED: Self = Self { checked: true, indeterminate: false };
    const UNCHECKED: Self = Self { checked: false, indeterminate: false };
    const INDETERMINATE: Self = Self { checked: false, indeterminate: true };

    pub fn tri_state(&self) -> TriState {
        match (self.checked, self.indeterminate) {
            (_, true) => TriState::Indeterminate,
            (true, false) => TriState::Checked,
            (false, false) => TriState::Unchecked,
        }
    }

    fn from_checked(checked: bool) -> Self {
        if checked {
            Self::CHECKED
        } else {
            Self::UNCHECKED
        }
    }
}

/// Outcome of applying element records to the hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementUpdate {
    pub updated: usize,
    pub skipped: usize,
    /// Catalog ids with no matching satellite
    pub not_found: Vec<String>,
}

/// Satellite/sensor hierarchy with selection state.
///
/// Indices are built once at construction; lookups never walk the tree.
#[derive(Debug, Clone)]
pub struct TreeSelectionModel {
    root_id: String,
    nodes: HashMap<String, TreeNode>,
    /// Satellite ids in load order
    satellites: Vec<String>,
    /// Satellite id -> sensor ids in load order
    children: HashMap<String, Vec<String>>,
    by_catalog_id: HashMap<String, String>,
    /// Zero-normalized catalog id -> satellite id
    by_normalized_id: HashMap<String, String>,
    state: HashMap<String, NodeState>,
}

impl TreeSelectionModel {
    /// Build the model from a flat node list.
    ///
    /// Requires exactly one root, satellites parented by the root, and sensors
    /// parented by the satellite their `satellite_catalog_id` names.
    pub fn build(nodes: Vec<TreeNode>) -> Result<Self> {
        let mut root_id: Option<String> = None;
        let mut index: HashMap<String, TreeNode> = HashMap::with_capacity(nodes.len());
        let mut order: Vec<String> = Vec::with_capacity(nodes.len());

        for node in nodes {
            if matches!(node.kind, NodeKind::Root) {
                if let Some(existing) = &root_id {
                    return Err(TreeError::MalformedHierarchy(format!(
                        "multiple roots: {} and {}",
                        existing, node.id
                    )));
                }
                root_id = Some(node.id.clone());
            }
            if index.contains_key(&node.id) {
                return Err(TreeError::MalformedHierarchy(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }
            order.push(node.id.clone());
            index.insert(node.id.clone(), node);
        }

        let root_id =
            root_id.ok_or_else(|| TreeError::MalformedHierarchy("no root node".to_string()))?;

        let mut satellites = Vec::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut by_catalog_id = HashMap::new();
        let mut by_normalized_id: HashMap<String, String> = HashMap::new();

        for id in &order {
            let node = &index[id];
            if let NodeKind::Satellite(attrs) = &node.kind {
                if node.parent_id.as_deref() != Some(root_id.as_str()) {
                    return Err(TreeError::MalformedHierarchy(format!(
                        "satellite {} is not attached to root {}",
                        id, root_id
                    )));
                }
                if by_catalog_id
                    .insert(attrs.catalog_id.clone(), id.clone())
                    .is_some()
                {
                    return Err(TreeError::MalformedHierarchy(format!(
                        "catalog id {} used by more than one satellite",
                        attrs.catalog_id
                    )));
                }
                let normalized = normalize_catalog_id(&attrs.catalog_id);
                if let Some(other) = by_normalized_id.insert(normalized.clone(), id.clone()) {
                    return Err(TreeError::MalformedHierarchy(format!(
                        "satellites {} and {} both resolve to catalog id {}",
                        other, id, normalized
                    )));
                }
                satellites.push(id.clone());
                children.insert(id.clone(), Vec::new());
            }
        }

        for id in &order {
            let node = &index[id];
            let NodeKind::Sensor(attrs) = &node.kind else {
                continue;
            };
            let owner = by_catalog_id.get(&attrs.satellite_catalog_id).ok_or_else(|| {
                TreeError::MalformedHierarchy(format!(
                    "sensor {} references unknown satellite catalog id {}",
                    id, attrs.satellite_catalog_id
                ))
            })?;
            if node.parent_id.as_ref() != Some(owner) {
                return Err(TreeError::MalformedHierarchy(format!(
                    "sensor {} is parented by {:?} but its catalog id belongs to {}",
                    id, node.parent_id, owner
                )));
            }
            if let Some(siblings) = children.get_mut(owner) {
                siblings.push(id.clone());
            }
        }

        let state = index
            .values()
            .filter(|n| !matches!(n.kind, NodeKind::Root))
            .map(|n| (n.id.clone(), NodeState::default()))
            .collect();

        info!(
            "Built sensor tree: {} satellites, {} sensors",
            satellites.len(),
            children.values().map(Vec::len).sum::<usize>()
        );

        Ok(Self {
            root_id,
            nodes: index,
            satellites,
            children,
            by_catalog_id,
            by_normalized_id,
            state,
        })
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[&self.root_id]
    }

    /// Set a node's checked flag and propagate.
    ///
    /// Satellites push the flag down to every sensor; sensors recompute their
    /// parent from all siblings. Toggling the root applies to every satellite.
    pub fn toggle(&mut self, node_id: &str, checked: bool) -> Result<()> {
        let Some(node) = self.nodes.get(node_id) else {
            error!("Toggle of unknown node {}", node_id);
            return Err(TreeError::InvalidReference(node_id.to_string()));
        };

        match &node.kind {
            NodeKind::Root => {
                let satellites = self.satellites.clone();
                for sat_id in &satellites {
                    self.set_satellite(sat_id, checked);
                }
            }
            NodeKind::Satellite(_) => {
                let sat_id = node.id.clone();
                self.set_satellite(&sat_id, checked);
            }
            NodeKind::Sensor(_) => {
                let sensor_id = node.id.clone();
                let parent_id = node.parent_id.clone();
                self.state.insert(sensor_id, NodeState::from_checked(checked));
                if let Some(parent_id) = parent_id {
                    self.refresh_satellite(&parent_id);
                }
            }
        }

        debug!("Toggled {} -> {}", node_id, checked);
        Ok(())
    }

    fn set_satellite(&mut self, sat_id: &str, checked: bool) {
        if let Some(sensors) = self.children.get(sat_id) {
            for sensor_id in sensors {
                self.state
                    .insert(sensor_id.clone(), NodeState::from_checked(checked));
            }
        }
        self.refresh_satellite(sat_id);
    }

    /// Derive a satellite's state from its sensors
    fn refresh_satellite(&mut self, sat_id: &str) {
        let sensors = self.children.get(sat_id).map(Vec::as_slice).unwrap_or(&[]);
        let total = sensors.len();
        let checked = sensors
            .iter()
            .filter(|id| self.state.get(*id).is_some_and(|s| s.checked))
            .count();

        let derived = if total > 0 && checked == total {
            NodeState::CHECKED
        } else if checked == 0 {
            NodeState::UNCHECKED
        } else {
            NodeState::INDETERMINATE
        };

        self.state.insert(sat_id.to_string(), derived);
    }

    /// Ids of checked sensors, in load order
    pub fn selected_sensor_ids(&self) -> Vec<String> {
        self.satellites
            .iter()
            .flat_map(|sat_id| &self.children[sat_id])
            .filter(|id| self.state.get(*id).is_some_and(|s| s.checked))
            .cloned()
            .collect()
    }

    pub fn state(&self, node_id: &str) -> Option<NodeState> {
        self.state.get(node_id).copied()
    }

    pub fn find_by_id(&self, node_id: &str) -> Result<&TreeNode> {
        self.nodes
            .get(node_id)
            .ok_or_else(|| TreeError::NotFound(node_id.to_string()))
    }

    pub fn find_satellite_by_catalog_id(&self, catalog_id: &str) -> Result<&TreeNode> {
        self.by_catalog_id
            .get(catalog_id)
            .and_then(|id| self.nodes.get(id))
            .ok_or_else(|| TreeError::NotFound(catalog_id.to_string()))
    }

    pub fn satellites(&self) -> impl Iterator<Item = &TreeNode> {
        self.satellites.iter().map(|id| &self.nodes[id])
    }

    pub fn sensors_of(&self, satellite_id: &str) -> impl Iterator<Item = &TreeNode> {
        self.children
            .get(satellite_id)
            .into_iter()
            .flatten()
            .map(|id| &self.nodes[id])
    }

    /// All nodes, root first, then each satellite followed by its sensors
    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        std::iter::once(self.root()).chain(
            self.satellites()
                .flat_map(|sat| std::iter::once(sat).chain(self.sensors_of(&sat.id))),
        )
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.satellites.is_empty()
    }

    /// Uncheck everything
    pub fn clear(&mut self) {
        for state in self.state.values_mut() {
            *state = NodeState::UNCHECKED;
        }
    }

    /// Write element lines into the matching satellites.
    ///
    /// Matches on the exact catalog id first, then on the zero-normalized
    /// form, which `build` keeps unique across satellites. Records older than a satellite's current elements are skipped.
    pub fn apply_elements(&mut self, records: &[OrbitalElementRecord]) -> ElementUpdate {
        let mut update = ElementUpdate::default();

        for record in records {
            let sat_id = self
                .by_catalog_id
                .get(&record.catalog_id)
                .or_else(|| self.by_normalized_id.get(&record.normalized_catalog_id()))
                .cloned();

            let Some(sat_id) = sat_id else {
                warn!(
                    "Satellite with catalog id {} not in tree, skipping",
                    record.catalog_id
                );
                update.skipped += 1;
                update.not_found.push(record.catalog_id.clone());
                continue;
            };

            let Some(NodeKind::Satellite(attrs)) = self.nodes.get_mut(&sat_id).map(|n| &mut n.kind)
            else {
                update.skipped += 1;
                continue;
            };

            if attrs
                .elements_captured_at
                .is_some_and(|current| current > record.epoch_seconds)
            {
                debug!(
                    "Keeping newer elements for {} (captured {:?})",
                    sat_id, attrs.elements_captured_at
                );
                update.skipped += 1;
                continue;
            }

            attrs.tle1 = Some(record.line1.clone());
            attrs.tle2 = Some(record.line2.clone());
            attrs.elements_captured_at = Some(record.epoch_seconds);
            update.updated += 1;
        }

        info!(
            "Applied element sets: {} updated, {} skipped",
            update.updated, update.skipped
        );

        update
    }
}
