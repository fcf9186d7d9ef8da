use std::iter::FromIterator;

use nalgebra::Vector3;

use crate::{classification::Label, error::PipelineError, math::AABB};

/// A single point of a scan. Positions and colors are immutable once a cloud is loaded, only the label gets
/// rewritten by the prediction and correction stages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub position: Vector3<f64>,
    /// 16-bit RGB color
    pub color: Vector3<u16>,
    pub intensity: Option<u16>,
    pub label: Label,
}

impl Point {
    /// Creates an unclassified point without intensity
    pub fn new(position: Vector3<f64>, color: Vector3<u16>) -> Self {
        Self {
            position,
            color,
            intensity: None,
            label: Label::Unclassified,
        }
    }

    /// Returns this point with the given label
    pub fn with_label(mut self, label: Label) -> Self {
        self.label = label;
        self
    }
}

/// Ordered collection of points, stored per attribute. The order of the points is significant: labels are
/// written back to point cloud files by index, so every stage has to preserve it.
///
/// Intensities are either present for all points or for none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    positions: Vec<Vector3<f64>>,
    colors: Vec<Vector3<u16>>,
    intensities: Option<Vec<u16>>,
    labels: Vec<Label>,
}

impl PointCloud {
    /// Creates a new empty `PointCloud`
    pub fn new() -> Self {
        Default::default()
    }

    /// Assembles a `PointCloud` from its attribute columns
    ///
    /// # Errors
    ///
    /// If any of the columns has a different length than `positions`
    pub fn from_columns(
        positions: Vec<Vector3<f64>>,
        colors: Vec<Vector3<u16>>,
        intensities: Option<Vec<u16>>,
        labels: Vec<Label>,
    ) -> Result<Self, PipelineError> {
        let expected = positions.len();
        let check = |what: &'static str, actual: usize| {
            if actual != expected {
                Err(PipelineError::LengthMismatch {
                    what,
                    expected,
                    actual,
                })
            } else {
                Ok(())
            }
        };
        check("colors", colors.len())?;
        check("labels", labels.len())?;
        if let Some(intensities) = &intensities {
            check("intensities", intensities.len())?;
        }
        Ok(Self {
            positions,
            colors,
            intensities,
            labels,
        })
    }

    /// Number of points in this cloud
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn colors(&self) -> &[Vector3<u16>] {
        &self.colors
    }

    pub fn intensities(&self) -> Option<&[u16]> {
        self.intensities.as_deref()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Mutable access to the labels. This is the only mutable attribute of a `PointCloud`
    pub fn labels_mut(&mut self) -> &mut [Label] {
        &mut self.labels
    }

    /// Replaces all labels of this cloud
    ///
    /// # Errors
    ///
    /// If `labels` does not contain exactly one label per point
    pub fn set_labels(&mut self, labels: Vec<Label>) -> Result<(), PipelineError> {
        if labels.len() != self.len() {
            return Err(PipelineError::LengthMismatch {
                what: "labels",
                expected: self.len(),
                actual: labels.len(),
            });
        }
        self.labels = labels;
        Ok(())
    }

    /// Returns the point at `index`
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds
    pub fn point(&self, index: usize) -> Point {
        Point {
            position: self.positions[index],
            color: self.colors[index],
            intensity: self.intensities.as_ref().map(|i| i[index]),
            label: self.labels[index],
        }
    }

    /// Iterates over all points in order
    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.len()).map(move |index| self.point(index))
    }

    /// Bounding box of all positions, `None` for an empty cloud
    pub fn bounds(&self) -> Option<AABB> {
        AABB::from_positions(self.positions.iter())
    }

    /// Indices of all points carrying `label`
    pub fn indices_of(&self, label: Label) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(idx, l)| if *l == label { Some(idx) } else { None })
            .collect()
    }
}

impl FromIterator<Point> for PointCloud {
    fn from_iter<T: IntoIterator<Item = Point>>(iter: T) -> Self {
        let points = iter.into_iter().collect::<Vec<_>>();
        let has_intensity = !points.is_empty() && points.iter().all(|p| p.intensity.is_some());
        Self {
            positions: points.iter().map(|p| p.position).collect(),
            colors: points.iter().map(|p| p.color).collect(),
            intensities: if has_intensity {
                Some(points.iter().filter_map(|p| p.intensity).collect())
            } else {
                None
            },
            labels: points.iter().map(|p| p.label).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_points() -> Vec<Point> {
        vec![
            Point::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1, 2, 3)).with_label(Label::Floor),
            Point::new(Vector3::new(1.0, 0.0, 2.5), Vector3::new(4, 5, 6)).with_label(Label::Wall),
            Point::new(Vector3::new(0.0, 1.0, 2.9), Vector3::new(7, 8, 9))
                .with_label(Label::Ceiling),
        ]
    }

    #[test]
    fn test_collect_preserves_order() {
        let points = three_points();
        let cloud = points.iter().copied().collect::<PointCloud>();
        assert_eq!(3, cloud.len());
        assert!(cloud.intensities().is_none());
        for (idx, point) in cloud.iter().enumerate() {
            assert_eq!(points[idx], point);
        }
        assert_eq!(vec![1], cloud.indices_of(Label::Wall));
    }

    #[test]
    fn test_intensity_only_if_all_points_have_one() {
        let mut points = three_points();
        for point in points.iter_mut() {
            point.intensity = Some(100);
        }
        let cloud = points.iter().copied().collect::<PointCloud>();
        assert_eq!(Some(&[100u16, 100, 100][..]), cloud.intensities());

        points[1].intensity = None;
        let cloud = points.into_iter().collect::<PointCloud>();
        assert!(cloud.intensities().is_none());
    }

    #[test]
    fn test_set_labels_checks_length() {
        let mut cloud = three_points().into_iter().collect::<PointCloud>();
        assert!(matches!(
            cloud.set_labels(vec![Label::Wall]),
            Err(PipelineError::LengthMismatch {
                expected: 3,
                actual: 1,
                ..
            })
        ));
        cloud
            .set_labels(vec![Label::Column; 3])
            .expect("Setting labels failed");
        assert!(cloud.labels().iter().all(|l| *l == Label::Column));
    }

    #[test]
    fn test_from_columns_rejects_ragged_columns() {
        let result = PointCloud::from_columns(
            vec![Vector3::new(0.0, 0.0, 0.0); 2],
            vec![Vector3::new(0, 0, 0); 2],
            Some(vec![1]),
            vec![Label::Unclassified; 2],
        );
        assert!(result.is_err());
    }
}
