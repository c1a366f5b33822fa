// src/results/mod.rs

//! The seam between the exporter and the solver's results.
//!
//! The exporter never touches a results file directly. It asks a
//! [`ResultsSource`] for three views: nodal displacements over time, one
//! component of a face-region series over time, and the static mesh
//! coordinates. Each request is a single lookup keyed by a query struct.

pub mod snapshot;

use std::ops::Range;

use ndarray::{Array3, ArrayView2, Axis as ArrayAxis};
use serde::{Deserialize, Serialize};

use crate::VfmError;

pub use snapshot::ResultsSnapshot;

/// A Cartesian component of a vector result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Column of this component in an `[x, y, z]` triplet.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// Either every entry of an index space or a half-open slice of it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Range(Range<usize>),
}

pub type TimeSelection = Selection;
pub type NodeSelection = Selection;

impl Selection {
    /// Resolves the selection against `count` available entries.
    pub fn resolve(&self, count: usize, what: &str) -> Result<Range<usize>, VfmError> {
        match self {
            Selection::All => Ok(0..count),
            Selection::Range(range) if range.start <= range.end && range.end <= count => {
                Ok(range.clone())
            }
            Selection::Range(range) => Err(VfmError::Lookup(format!(
                "{} {}..{} outside of available 0..{}",
                what, range.start, range.end, count
            ))),
        }
    }
}

/// Request for a nodal vector field. All three components are returned.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeQuery {
    pub field: String,
    pub times: TimeSelection,
    pub nodes: NodeSelection,
}

impl NodeQuery {
    /// Every time step and every node of `field`.
    pub fn all(field: &str) -> Self {
        NodeQuery {
            field: field.to_string(),
            times: Selection::All,
            nodes: Selection::All,
        }
    }
}

/// Request for one component of a face-region field, keyed by
/// (field, region, times, axis).
#[derive(Debug, Clone, PartialEq)]
pub struct RegionQuery {
    pub field: String,
    pub region: String,
    pub times: TimeSelection,
    pub axis: Axis,
}

impl RegionQuery {
    /// Every time step of `axis` for `region` within `field`.
    pub fn new(field: &str, region: &str, axis: Axis) -> Self {
        RegionQuery {
            field: field.to_string(),
            region: region.to_string(),
            times: Selection::All,
            axis,
        }
    }
}

/// Nodal displacements indexed `[time, node, component]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementSeries {
    pub values: Array3<f64>,
}

impl DisplacementSeries {
    pub fn new(values: Array3<f64>) -> Self {
        DisplacementSeries { values }
    }

    pub fn time_steps(&self) -> usize {
        self.values.len_of(ArrayAxis(0))
    }

    pub fn node_count(&self) -> usize {
        self.values.len_of(ArrayAxis(1))
    }

    /// `[node, component]` view of one time step.
    pub fn time_slice(&self, time: usize) -> ArrayView2<'_, f64> {
        self.values.index_axis(ArrayAxis(0), time)
    }
}

/// One component of a face-region field, indexed `[time][item]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionSeries {
    pub region: String,
    pub axis: Axis,
    pub values: Vec<Vec<f64>>,
}

impl ReactionSeries {
    pub fn time_steps(&self) -> usize {
        self.values.len()
    }

    pub fn at(&self, time: usize) -> Option<&[f64]> {
        self.values.get(time).map(Vec::as_slice)
    }

    /// The same series with every value sign-flipped.
    pub fn negated(&self) -> ReactionSeries {
        ReactionSeries {
            region: self.region.clone(),
            axis: self.axis,
            values: self
                .values
                .iter()
                .map(|step| step.iter().map(|v| -v).collect())
                .collect(),
        }
    }
}

/// Read-only access to a finished simulation's results.
pub trait ResultsSource {
    /// Reference coordinates of every mesh node, in node id order.
    fn mesh_node_coordinates(&self) -> Result<Vec<[f64; 3]>, VfmError>;

    /// Nodal vector field over the selected time steps and nodes.
    fn node_displacement(&self, query: &NodeQuery) -> Result<DisplacementSeries, VfmError>;

    /// One component of a face-region field over the selected time steps.
    fn face_region_series(&self, query: &RegionQuery) -> Result<ReactionSeries, VfmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_selection_all_covers_everything() {
        assert_eq!(Selection::All.resolve(4, "time steps").unwrap(), 0..4);
        assert_eq!(Selection::All.resolve(0, "time steps").unwrap(), 0..0);
    }

    #[test]
    fn test_selection_range_is_bounds_checked() {
        assert_eq!(Selection::Range(1..3).resolve(3, "nodes").unwrap(), 1..3);

        let err = Selection::Range(2..5).resolve(3, "nodes").unwrap_err();
        assert!(matches!(err, VfmError::Lookup(_)));
        assert!(err.to_string().contains("nodes 2..5"));
    }

    #[test]
    fn test_displacement_series_shape() {
        let series = DisplacementSeries::new(Array3::zeros((4, 7, 3)));
        assert_eq!(series.time_steps(), 4);
        assert_eq!(series.node_count(), 7);
        assert_eq!(series.time_slice(2).dim(), (7, 3));
    }

    #[test]
    fn test_reaction_series_negation_keeps_identity() {
        let series = ReactionSeries {
            region: "PrescribedDisplacement2".to_string(),
            axis: Axis::X,
            values: vec![vec![0.0], vec![1.5, -2.0]],
        };
        let flipped = series.negated();

        assert_eq!(flipped.region, series.region);
        assert_eq!(flipped.axis, Axis::X);
        assert_eq!(flipped.at(1), Some(&[-1.5, 2.0][..]));
        assert!(flipped.at(0).unwrap()[0].is_sign_negative());
        assert_eq!(flipped.at(2), None);
    }

    #[test]
    fn test_axis_columns() {
        assert_eq!(Axis::X.index(), 0);
        assert_eq!(Axis::Y.index(), 1);
        assert_eq!(Axis::Z.label(), "z");
    }
}
