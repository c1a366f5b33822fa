// src/fields/mod.rs

//! Virtual displacement fields derived from the mesh bounding box.
//!
//! Field 1 grows linearly in x from the left edge of the mesh, field 2
//! grows linearly in y measured down from the top edge. Both span [0, 2].

use nalgebra::{Point3, Vector3};

use crate::VfmError;

/// Peak value of a virtual field at the far edge of the bounding box.
pub const VIRTUAL_FIELD_SCALE: f64 = 2.0;

/// Axis-aligned bounds of the reference mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn from_nodes(nodes: &[[f64; 3]]) -> Result<Self, VfmError> {
        let first = nodes
            .first()
            .ok_or_else(|| VfmError::DegenerateBounds("mesh has no nodes".to_string()))?;

        let mut min = Point3::from(*first);
        let mut max = min;
        for node in &nodes[1..] {
            for c in 0..3 {
                min[c] = min[c].min(node[c]);
                max[c] = max[c].max(node[c]);
            }
        }

        Ok(BoundingBox { min, max })
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

/// A time-invariant per-node displacement field, written under `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualField {
    pub id: u32,
    pub values: Vec<Vector3<f64>>,
}

/// The pair of virtual fields exported for one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualFields {
    pub bounds: BoundingBox,
    pub ustar_x: VirtualField,
    pub ustar_y: VirtualField,
}

impl VirtualFields {
    pub fn node_count(&self) -> usize {
        self.ustar_x.values.len()
    }

    /// Fields in the order they are written.
    pub fn iter(&self) -> impl Iterator<Item = &VirtualField> {
        [&self.ustar_x, &self.ustar_y].into_iter()
    }
}

/// Computes both virtual fields from the reference node coordinates.
///
/// * `ustar_x = 2 (x - min_x) / (max_x - min_x)` in the x component only.
/// * `ustar_y = 2 (max_y - y) / (max_y - min_y)` in the y component only.
///
/// The y field is measured from the top of the mesh, so the node at
/// `(min_x, max_y)` maps to zero in both fields.
///
/// # Errors
///
/// `VfmError::DegenerateBounds` when the mesh is empty or has no x or y
/// extent.
pub fn compute_virtual_fields(nodes: &[[f64; 3]]) -> Result<VirtualFields, VfmError> {
    let bounds = BoundingBox::from_nodes(nodes)?;
    let extent = bounds.extent();

    let width = extent.x;
    let height = extent.y;
    if !(width.is_finite() && width > 0.0) {
        return Err(VfmError::DegenerateBounds(format!(
            "mesh x extent is {} (min {}, max {})",
            width, bounds.min.x, bounds.max.x
        )));
    }
    if !(height.is_finite() && height > 0.0) {
        return Err(VfmError::DegenerateBounds(format!(
            "mesh y extent is {} (min {}, max {})",
            height, bounds.min.y, bounds.max.y
        )));
    }

    let ustar_x = nodes
        .iter()
        .map(|p| Vector3::new((p[0] - bounds.min.x) / width * VIRTUAL_FIELD_SCALE, 0.0, 0.0))
        .collect();
    let ustar_y = nodes
        .iter()
        .map(|p| Vector3::new(0.0, (bounds.max.y - p[1]) / height * VIRTUAL_FIELD_SCALE, 0.0))
        .collect();

    Ok(VirtualFields {
        bounds,
        ustar_x: VirtualField { id: 1, values: ustar_x },
        ustar_y: VirtualField { id: 2, values: ustar_y },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plate_nodes() -> Vec<[f64; 3]> {
        let mut nodes = Vec::new();
        for j in 0..4 {
            for i in 0..5 {
                nodes.push([-3.0 + 2.5 * i as f64, 1.0 + 0.75 * j as f64, 0.2 * (i + j) as f64]);
            }
        }
        nodes
    }

    #[test]
    fn test_two_node_example() {
        let fields = compute_virtual_fields(&[[0.0, 0.0, 0.0], [10.0, 5.0, 0.0]]).unwrap();

        assert_eq!(fields.ustar_x.values[0], Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(fields.ustar_x.values[1], Vector3::new(2.0, 0.0, 0.0));
        assert_eq!(fields.ustar_y.values[0], Vector3::new(0.0, 2.0, 0.0));
        assert_eq!(fields.ustar_y.values[1], Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_fields_stay_in_unit_range() {
        let fields = compute_virtual_fields(&plate_nodes()).unwrap();

        for (ux, uy) in fields.ustar_x.values.iter().zip(&fields.ustar_y.values) {
            assert!((0.0..=2.0).contains(&ux.x), "ustar_x out of range: {}", ux.x);
            assert!((0.0..=2.0).contains(&uy.y), "ustar_y out of range: {}", uy.y);
            assert_eq!(ux.y, 0.0);
            assert_eq!(ux.z, 0.0);
            assert_eq!(uy.x, 0.0);
            assert_eq!(uy.z, 0.0);
        }
    }

    #[test]
    fn test_corner_nodes_map_to_field_extremes() {
        let nodes = plate_nodes();
        let fields = compute_virtual_fields(&nodes).unwrap();

        // top-left corner: i = 0, j = 3
        let top_left = 15;
        assert_relative_eq!(fields.ustar_x.values[top_left].x, 0.0);
        assert_relative_eq!(fields.ustar_y.values[top_left].y, 0.0);

        // bottom-right corner: i = 4, j = 0
        let bottom_right = 4;
        assert_relative_eq!(fields.ustar_x.values[bottom_right].x, 2.0);
        assert_relative_eq!(fields.ustar_y.values[bottom_right].y, 2.0);
    }

    #[test]
    fn test_fields_ignore_the_other_coordinates() {
        let base = compute_virtual_fields(&[[0.0, 0.0, 0.0], [4.0, 8.0, 0.0], [1.0, 2.0, 0.0]]).unwrap();
        let moved = compute_virtual_fields(&[[0.0, 0.0, 9.0], [4.0, 8.0, -3.0], [1.0, 2.0, 5.0]]).unwrap();
        assert_eq!(base.ustar_x, moved.ustar_x);
        assert_eq!(base.ustar_y, moved.ustar_y);

        // node 3 moves in y only: its x field value is unchanged
        let shifted = compute_virtual_fields(&[[0.0, 0.0, 0.0], [4.0, 8.0, 0.0], [1.0, 6.0, 0.0]]).unwrap();
        assert_eq!(shifted.ustar_x.values[2], base.ustar_x.values[2]);
        assert_relative_eq!(base.ustar_y.values[2].y, 1.5);
        assert_relative_eq!(shifted.ustar_y.values[2].y, 0.5);
    }

    #[test]
    fn test_bounds_are_reported() {
        let fields = compute_virtual_fields(&plate_nodes()).unwrap();
        assert_relative_eq!(fields.bounds.min.x, -3.0);
        assert_relative_eq!(fields.bounds.max.x, 7.0);
        assert_relative_eq!(fields.bounds.min.y, 1.0);
        assert_relative_eq!(fields.bounds.max.y, 3.25);
        assert_eq!(fields.node_count(), 20);
        assert_eq!(fields.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_degenerate_bounds_are_rejected() {
        let empty = compute_virtual_fields(&[]);
        assert!(matches!(empty, Err(VfmError::DegenerateBounds(_))));

        let vertical_line = compute_virtual_fields(&[[1.0, 0.0, 0.0], [1.0, 5.0, 0.0]]);
        match vertical_line {
            Err(VfmError::DegenerateBounds(msg)) => assert!(msg.contains("x extent")),
            other => panic!("expected degenerate bounds, got {:?}", other),
        }

        let horizontal_line = compute_virtual_fields(&[[0.0, 2.0, 0.0], [3.0, 2.0, 1.0]]);
        match horizontal_line {
            Err(VfmError::DegenerateBounds(msg)) => assert!(msg.contains("y extent")),
            other => panic!("expected degenerate bounds, got {:?}", other),
        }
    }
}
