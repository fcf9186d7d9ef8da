use std::cmp::Ordering;

use kd_tree::{KdPoint, KdTree};
use scan2bim_core::nalgebra::Vector3;

/// Position stored in the kd-tree together with the index of the point it belongs to
#[derive(Debug, Clone, Copy)]
struct IndexedPosition {
    position: [f64; 3],
    index: usize,
}

impl KdPoint for IndexedPosition {
    type Scalar = f64;
    type Dim = typenum::U3;
    fn at(&self, k: usize) -> f64 {
        self.position[k]
    }
}

/// Result of a nearest neighbour query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Index of the neighbour in the position slice the index was built from
    pub index: usize,
    pub distance: f64,
}

/// Kd-tree over a set of 3D positions that answers radius and nearest neighbour queries in terms of point indices.
/// The index is immutable once built and can be queried concurrently.
pub struct SpatialIndex {
    tree: KdTree<IndexedPosition>,
}

impl SpatialIndex {
    /// Builds an index over all `positions`. Query results refer to indices into `positions`
    pub fn build(positions: &[Vector3<f64>]) -> Self {
        Self::build_from_indexed(
            positions
                .iter()
                .enumerate()
                .map(|(index, position)| IndexedPosition {
                    position: [position.x, position.y, position.z],
                    index,
                })
                .collect(),
        )
    }

    /// Builds an index over the subset of `positions` given by `indices`. Query results still refer to indices
    /// into `positions`, not into `indices`
    ///
    /// # Panics
    ///
    /// If any of the `indices` is out of bounds for `positions`
    pub fn build_subset(positions: &[Vector3<f64>], indices: &[usize]) -> Self {
        Self::build_from_indexed(
            indices
                .iter()
                .map(|index| {
                    let position = positions[*index];
                    IndexedPosition {
                        position: [position.x, position.y, position.z],
                        index: *index,
                    }
                })
                .collect(),
        )
    }

    fn build_from_indexed(points: Vec<IndexedPosition>) -> Self {
        Self {
            tree: KdTree::build_by_ordered_float(points),
        }
    }

    /// Number of indexed positions
    pub fn len(&self) -> usize {
        self.tree.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.items().is_empty()
    }

    /// Finds the indexed position closest to `query`. Returns `None` if the index is empty. The kd-tree traversal is
    /// deterministic, so equidistant candidates always resolve to the same index for the same input
    pub fn nearest(&self, query: &Vector3<f64>) -> Option<Neighbour> {
        self.tree
            .nearest(&[query.x, query.y, query.z])
            .map(|found| Neighbour {
                index: found.item.index,
                distance: found.squared_distance.sqrt(),
            })
    }

    /// Returns the indices of all positions within Euclidean distance `radius` of `query`, including a position
    /// equal to `query` itself and positions at exactly `radius`. The order of the returned indices is unspecified
    pub fn within_radius(&self, query: &Vector3<f64>, radius: f64) -> Vec<usize> {
        let center = [query.x, query.y, query.z];
        // The box is padded so that rounding in `center ± radius` never drops a point the distance test keeps
        let reach = radius + radius.abs() * 1e-9;
        let squared_radius = radius * radius;
        self.tree
            .within_by_cmp(|item, k| {
                let coordinate = item.position[k];
                if coordinate < center[k] - reach {
                    Ordering::Less
                } else if coordinate > center[k] + reach {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
            .into_iter()
            .filter(|item| {
                let squared_distance: f64 = (0..3)
                    .map(|k| (item.position[k] - center[k]).powi(2))
                    .sum();
                squared_distance <= squared_radius
            })
            .map(|item| item.index)
            .collect()
    }
}
