use nalgebra::{Point3, Vector3};

/// 3D axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    min: Point3<f64>,
    max: Point3<f64>,
}

impl AABB {
    /// Creates a new AABB from the given minimum and maximum coordinates. Panics if the minimum position is
    /// not less than or equal to the maximum position
    /// ```
    /// # use scan2bim_core::math::AABB;
    /// let bounds = AABB::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// ```
    pub fn from_min_max(min: Point3<f64>, max: Point3<f64>) -> Self {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            panic!("AABB::from_min_max: Minimum position must be <= maximum position!");
        }
        Self { min, max }
    }

    /// Computes the tightest AABB around the given positions. Returns `None` if `positions` is empty
    /// ```
    /// # use scan2bim_core::math::AABB;
    /// # use nalgebra::{Point3, Vector3};
    /// let positions = vec![Vector3::new(1.0, -1.0, 0.5), Vector3::new(-2.0, 3.0, 0.0)];
    /// let bounds = AABB::from_positions(positions.iter()).unwrap();
    /// assert_eq!(*bounds.min(), Point3::new(-2.0, -1.0, 0.0));
    /// assert_eq!(*bounds.max(), Point3::new(1.0, 3.0, 0.5));
    /// ```
    pub fn from_positions<'a, I: IntoIterator<Item = &'a Vector3<f64>>>(positions: I) -> Option<Self> {
        let mut iter = positions.into_iter();
        let first = Point3::from(*iter.next()?);
        let bounds = iter.fold(Self::from_min_max(first, first), |bounds, position| {
            bounds.extend_with_point(&Point3::from(*position))
        });
        Some(bounds)
    }

    /// Returns the minimum point of this AABB
    pub fn min(&self) -> &Point3<f64> {
        &self.min
    }

    /// Returns the maximum point of this AABB
    pub fn max(&self) -> &Point3<f64> {
        &self.max
    }

    /// Returns the extent of this AABB. The extent is the size between the minimum and maximum position of this AABB
    /// ```
    /// # use scan2bim_core::math::AABB;
    /// let bounds = AABB::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 2.0, 3.0));
    /// assert_eq!(bounds.extent(), nalgebra::Vector3::new(1.0, 2.0, 3.0));
    /// ```
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Returns a copy of this AABB that is extended so that it contains the given point
    pub fn extend_with_point(&self, point: &Point3<f64>) -> AABB {
        Self {
            min: Point3::new(
                self.min.x.min(point.x),
                self.min.y.min(point.y),
                self.min.z.min(point.z),
            ),
            max: Point3::new(
                self.max.x.max(point.x),
                self.max.y.max(point.y),
                self.max.z.max(point.z),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_positions_empty() {
        let positions: Vec<Vector3<f64>> = vec![];
        assert!(AABB::from_positions(positions.iter()).is_none());
    }

    #[test]
    fn test_from_positions_is_tight() {
        let positions = vec![
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(-1.0, 4.0, 2.0),
            Vector3::new(3.0, -2.0, -7.5),
        ];
        let bounds = AABB::from_positions(positions.iter()).unwrap();
        assert_eq!(Point3::new(-1.0, -2.0, -7.5), *bounds.min());
        assert_eq!(Point3::new(3.0, 4.0, 2.0), *bounds.max());
        assert_eq!(Vector3::new(4.0, 6.0, 9.5), bounds.extent());
    }
}
