// src/results/snapshot.rs

//! A results source backed by a JSON snapshot of the solver output.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use super::{DisplacementSeries, NodeQuery, ReactionSeries, RegionQuery, ResultsSource};
use crate::VfmError;

/// Static mesh geometry of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMesh {
    pub nodes: Vec<[f64; 3]>,
}

/// Everything the exporter reads, dumped from a finished job.
///
/// `node_data[field]` is indexed `[time][node]`.
/// `face_region_data[field][region]` is indexed `[time][item]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsSnapshot {
    pub mesh: SnapshotMesh,
    #[serde(default)]
    pub node_data: HashMap<String, Vec<Vec<[f64; 3]>>>,
    #[serde(default)]
    pub face_region_data: HashMap<String, HashMap<String, Vec<Vec<[f64; 3]>>>>,
}

impl ResultsSnapshot {
    /// Reads and validates a snapshot file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, VfmError> {
        let path = path.as_ref();
        info!("Reading results snapshot: {}", path.display());

        let bytes = fs::read(path)
            .map_err(|e| VfmError::FileAccess(format!("{}: {}", path.display(), e)))?;
        let snapshot: ResultsSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| VfmError::FileAccess(format!("{} is not a valid results snapshot: {}", path.display(), e)))?;
        snapshot.validate()?;

        debug!(
            "Snapshot has {} mesh nodes, {} nodal fields, {} face-region fields.",
            snapshot.mesh.nodes.len(),
            snapshot.node_data.len(),
            snapshot.face_region_data.len()
        );
        Ok(snapshot)
    }

    /// Parses and validates a snapshot held in memory.
    pub fn from_json(json_str: &str) -> Result<Self, VfmError> {
        let snapshot: ResultsSnapshot = serde_json::from_str(json_str)
            .map_err(|e| VfmError::FileAccess(format!("invalid results snapshot: {}", e)))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String, VfmError> {
        serde_json::to_string_pretty(self).map_err(|e| VfmError::Serialization(e.to_string()))
    }

    /// Every time step of a nodal field must list the same nodes.
    fn validate(&self) -> Result<(), VfmError> {
        for (field, steps) in &self.node_data {
            if let Some(first) = steps.first() {
                if let Some((t, step)) = steps.iter().enumerate().find(|(_, s)| s.len() != first.len()) {
                    return Err(VfmError::FileAccess(format!(
                        "nodal field '{}' has {} nodes at time step {} but {} at time step 0",
                        field,
                        step.len(),
                        t,
                        first.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ResultsSource for ResultsSnapshot {
    fn mesh_node_coordinates(&self) -> Result<Vec<[f64; 3]>, VfmError> {
        Ok(self.mesh.nodes.clone())
    }

    fn node_displacement(&self, query: &NodeQuery) -> Result<DisplacementSeries, VfmError> {
        let steps = self
            .node_data
            .get(&query.field)
            .ok_or_else(|| VfmError::Lookup(format!("nodal field '{}' not found", query.field)))?;

        let times = query.times.resolve(steps.len(), "time steps")?;
        let available_nodes = steps.first().map_or(0, Vec::len);
        let nodes = query.nodes.resolve(available_nodes, "nodes")?;

        let mut values = Array3::<f64>::zeros((times.len(), nodes.len(), 3));
        for (ti, step) in steps[times.clone()].iter().enumerate() {
            let selected = step.get(nodes.clone()).ok_or_else(|| {
                VfmError::Lookup(format!(
                    "time step {} of '{}' has only {} nodes",
                    times.start + ti,
                    query.field,
                    step.len()
                ))
            })?;
            for (ni, vector) in selected.iter().enumerate() {
                for (c, component) in vector.iter().enumerate() {
                    values[[ti, ni, c]] = *component;
                }
            }
        }

        Ok(DisplacementSeries::new(values))
    }

    fn face_region_series(&self, query: &RegionQuery) -> Result<ReactionSeries, VfmError> {
        let regions = self
            .face_region_data
            .get(&query.field)
            .ok_or_else(|| VfmError::Lookup(format!("face-region field '{}' not found", query.field)))?;
        let steps = regions.get(&query.region).ok_or_else(|| {
            VfmError::Lookup(format!(
                "region '{}' not found in face-region field '{}'",
                query.region, query.field
            ))
        })?;

        let times = query.times.resolve(steps.len(), "time steps")?;
        let column = query.axis.index();
        let values: Vec<Vec<f64>> = steps[times]
            .iter()
            .map(|items| items.iter().map(|v| v[column]).collect())
            .collect();

        Ok(ReactionSeries {
            region: query.region.clone(),
            axis: query.axis,
            values,
        })
    }
}
