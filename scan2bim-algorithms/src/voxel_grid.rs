use std::collections::HashMap;

use rayon::prelude::*;
use scan2bim_core::{
    math::AABB,
    nalgebra::{Point3, Vector3},
    Label, PipelineError, Point, PointCloud,
};

/// Integer coordinates of a cell in the voxel grid
pub type CellIndex = (i64, i64, i64);

/// A non-empty cell of the grid together with the indices of all points that fall into it
#[derive(Debug, Clone, PartialEq)]
pub struct Voxel {
    pub cell: CellIndex,
    pub points: Vec<usize>,
}

/// Partition of a point cloud into cubic cells of edge length `cell_size`. Every point belongs to exactly one voxel,
/// the assignment is stored explicitly in both directions. Voxels are ordered by the first point that fell into them,
/// so the grid of a given cloud is always the same.
///
/// The grid origin is half a cell below the minimum of the cloud's bounding box, so that the lowest points sit in the
/// middle of the first layer of cells rather than on a cell boundary.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    cell_size: f64,
    origin: Point3<f64>,
    voxels: Vec<Voxel>,
    point_to_voxel: Vec<usize>,
}

impl VoxelGrid {
    /// Assigns every position to its cell
    ///
    /// # Errors
    ///
    /// If `cell_size` is not a positive number
    pub fn build(positions: &[Vector3<f64>], cell_size: f64) -> Result<Self, PipelineError> {
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(PipelineError::configuration(format!(
                "voxel size must be positive, got {}",
                cell_size
            )));
        }
        let min = AABB::from_positions(positions.iter())
            .map(|bounds| *bounds.min())
            .unwrap_or_else(Point3::origin);
        let origin = min - Vector3::repeat(cell_size * 0.5);

        let mut voxels: Vec<Voxel> = vec![];
        let mut voxel_lookup: HashMap<CellIndex, usize> = HashMap::new();
        let mut point_to_voxel = Vec::with_capacity(positions.len());
        for (idx, position) in positions.iter().enumerate() {
            let cell = cell_of(&origin, cell_size, position);
            let voxel_idx = *voxel_lookup.entry(cell).or_insert_with(|| {
                voxels.push(Voxel {
                    cell,
                    points: vec![],
                });
                voxels.len() - 1
            });
            voxels[voxel_idx].points.push(idx);
            point_to_voxel.push(voxel_idx);
        }

        Ok(Self {
            cell_size,
            origin,
            voxels,
            point_to_voxel,
        })
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    /// Number of non-empty cells
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Index of the voxel that the point at `point_index` belongs to
    pub fn voxel_of(&self, point_index: usize) -> usize {
        self.point_to_voxel[point_index]
    }

    /// Voxel index of every point, in point order
    pub fn point_to_voxel(&self) -> &[usize] {
        &self.point_to_voxel
    }
}

fn cell_of(origin: &Point3<f64>, cell_size: f64, position: &Vector3<f64>) -> CellIndex {
    let scaled = (position - origin.coords) / cell_size;
    (
        scaled.x.floor() as i64,
        scaled.y.floor() as i64,
        scaled.z.floor() as i64,
    )
}

/// Downsamples `cloud` by applying a voxel grid filter with cubic cells of edge length `cell_size`. Every non-empty
/// cell yields one representative point:
/// - position: mean of the member positions
/// - color: mean of the member colors
/// - intensity: mean of the member intensities, if the cloud has intensities
/// - label: most common member label, the lower classification code wins ties
///
/// The representatives are returned as a new cloud in voxel order, together with the grid that maps between points and
/// voxels.
///
/// # Errors
///
/// If `cell_size` is not a positive number
pub fn downsample(cloud: &PointCloud, cell_size: f64) -> Result<(PointCloud, VoxelGrid), PipelineError> {
    let grid = VoxelGrid::build(cloud.positions(), cell_size)?;
    let representatives = grid
        .voxels()
        .par_iter()
        .map(|voxel| representative_point(cloud, voxel))
        .collect::<Vec<_>>();
    Ok((representatives.into_iter().collect(), grid))
}

fn representative_point(cloud: &PointCloud, voxel: &Voxel) -> Point {
    let count = voxel.points.len() as f64;
    let position = voxel
        .points
        .iter()
        .map(|idx| cloud.positions()[*idx])
        .sum::<Vector3<f64>>()
        / count;
    let color_sum = voxel
        .points
        .iter()
        .map(|idx| cloud.colors()[*idx].map(f64::from))
        .sum::<Vector3<f64>>();
    let color = (color_sum / count).map(|channel| channel.round() as u16);
    let intensity = cloud.intensities().map(|intensities| {
        let sum: f64 = voxel.points.iter().map(|idx| intensities[*idx] as f64).sum();
        (sum / count).round() as u16
    });
    Point {
        position,
        color,
        intensity,
        label: most_common_label(voxel.points.iter().map(|idx| cloud.labels()[*idx])),
    }
}

fn most_common_label<I: Iterator<Item = Label>>(labels: I) -> Label {
    let mut counts: HashMap<Label, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(label_a, count_a), (label_b, count_b)| {
            count_a.cmp(count_b).then_with(|| label_b.cmp(label_a))
        })
        .map(|(label, _)| label)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn setup_point_cloud() -> PointCloud {
        let mut points = vec![];
        // three points per unit cell, offset by 0.5, 0.6 and 0.7
        for i in 0..10 {
            for j in 0..10 {
                for k in 0..10 {
                    for (offset, intensity, label) in [
                        (0.5, 2u16, Label::Wall),
                        (0.6, 4, Label::Floor),
                        (0.7, 6, Label::Floor),
                    ]
                    .iter()
                    {
                        let mut point = Point::new(
                            Vector3::new(
                                f64::from(i) + offset,
                                f64::from(j) + offset,
                                f64::from(k) + offset,
                            ),
                            Vector3::new(10, 20, 30 + *intensity),
                        )
                        .with_label(*label);
                        point.intensity = Some(*intensity);
                        points.push(point);
                    }
                }
            }
        }
        points.into_iter().collect()
    }

    #[test]
    fn test_voxel_grid_filter() {
        let cloud = setup_point_cloud();
        assert_eq!(3000, cloud.len());
        let (voxels, grid) = downsample(&cloud, 1.0).unwrap();
        assert_eq!(1000, voxels.len());
        assert_eq!(1000, grid.len());

        // average position
        let first = voxels.point(0);
        assert_approx_eq!(0.6, first.position.x, 1e-9);
        assert_approx_eq!(0.6, first.position.y, 1e-9);
        assert_approx_eq!(0.6, first.position.z, 1e-9);
        // average color and intensity
        assert_eq!(Vector3::new(10, 20, 34), first.color);
        assert_eq!(Some(4), first.intensity);
        // most common label
        assert_eq!(Label::Floor, first.label);
    }

    #[test]
    fn test_every_point_maps_to_exactly_one_voxel() {
        let cloud = setup_point_cloud();
        let grid = VoxelGrid::build(cloud.positions(), 0.35).unwrap();
        let mut seen = vec![0usize; cloud.len()];
        for (voxel_idx, voxel) in grid.voxels().iter().enumerate() {
            for point in &voxel.points {
                seen[*point] += 1;
                assert_eq!(voxel_idx, grid.voxel_of(*point));
            }
        }
        assert!(seen.iter().all(|count| *count == 1));
    }

    #[test]
    fn test_most_common_label_ties() {
        let labels = vec![Label::Wall, Label::Floor, Label::Wall, Label::Floor];
        assert_eq!(Label::Floor, most_common_label(labels.into_iter()));
        assert_eq!(Label::Unclassified, most_common_label(std::iter::empty()));
    }

    #[test]
    fn test_invalid_cell_size() {
        assert!(VoxelGrid::build(&[Vector3::new(0.0, 0.0, 0.0)], 0.0).is_err());
        assert!(VoxelGrid::build(&[Vector3::new(0.0, 0.0, 0.0)], -1.0).is_err());
    }
}
