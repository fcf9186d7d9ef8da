//! Rule-based repair of systematic classifier errors using geometric priors.
//!
//! Each [CorrectionRule] is a pure transformation of a label array: it reads the positions and the current labels and
//! returns a new label array. The [Corrector] applies its rules in a fixed order, every rule seeing the output of the
//! previous one.

use rayon::prelude::*;
use scan2bim_core::{math::percentile, nalgebra::Vector3, Label, PipelineError, PointCloud};

use crate::spatial_index::SpatialIndex;

/// A deterministic relabeling step
pub trait CorrectionRule: Send + Sync {
    /// Short name of this rule, used in logs and reports
    fn name(&self) -> &'static str;

    /// Computes the corrected labels for the given positions and current labels. Both slices have the same length,
    /// and so does the result.
    fn apply(&self, positions: &[Vector3<f64>], labels: &[Label]) -> Vec<Label>;
}

/// Resolves floor/ceiling confusion by height. The floor level is a low percentile of all z coordinates, which is
/// robust against noise below the floor. Points labeled floor above `floor level + height_threshold` become ceiling,
/// points labeled ceiling below it become floor. Both decisions are made on the labels the rule receives, so a point
/// is moved at most once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightCorrection {
    pub height_threshold: f64,
    /// Percentile in `[0, 100]` of the z coordinates that is taken as floor level
    pub floor_percentile: f64,
}

impl HeightCorrection {
    pub fn new(height_threshold: f64, floor_percentile: f64) -> Self {
        Self {
            height_threshold,
            floor_percentile,
        }
    }

    /// Height that separates floor from ceiling, `None` for an empty set of positions
    pub fn split_height(&self, positions: &[Vector3<f64>]) -> Option<f64> {
        let heights = positions.iter().map(|p| p.z).collect::<Vec<_>>();
        percentile(&heights, self.floor_percentile).map(|floor_level| floor_level + self.height_threshold)
    }
}

impl CorrectionRule for HeightCorrection {
    fn name(&self) -> &'static str {
        "height"
    }

    fn apply(&self, positions: &[Vector3<f64>], labels: &[Label]) -> Vec<Label> {
        let split_height = match self.split_height(positions) {
            Some(split_height) => split_height,
            None => return labels.to_vec(),
        };
        log::debug!("Floor/ceiling split height: {:.3}", split_height);
        positions
            .iter()
            .zip(labels.iter())
            .map(|(position, label)| match label {
                Label::Floor if position.z > split_height => Label::Ceiling,
                Label::Ceiling if position.z < split_height => Label::Floor,
                other => *other,
            })
            .collect()
    }
}

/// Resolves column/wall confusion by proximity. Every point labeled column whose nearest wall point is closer than
/// `min_distance` becomes wall. Distances are measured to the wall points of the labels the rule receives. Without
/// column or wall points this rule changes nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnWallCorrection {
    pub min_distance: f64,
}

impl ColumnWallCorrection {
    pub fn new(min_distance: f64) -> Self {
        Self { min_distance }
    }
}

impl CorrectionRule for ColumnWallCorrection {
    fn name(&self) -> &'static str {
        "column-wall"
    }

    fn apply(&self, positions: &[Vector3<f64>], labels: &[Label]) -> Vec<Label> {
        let indices_of = |target: Label| {
            labels
                .iter()
                .enumerate()
                .filter(|(_, label)| **label == target)
                .map(|(idx, _)| idx)
                .collect::<Vec<_>>()
        };
        let walls = indices_of(Label::Wall);
        let columns = indices_of(Label::Column);
        if walls.is_empty() || columns.is_empty() {
            return labels.to_vec();
        }

        let wall_index = SpatialIndex::build_subset(positions, &walls);
        let near_wall = columns
            .par_iter()
            .filter(|idx| {
                wall_index
                    .nearest(&positions[**idx])
                    .map(|wall| wall.distance < self.min_distance)
                    .unwrap_or(false)
            })
            .copied()
            .collect::<Vec<_>>();

        let mut corrected = labels.to_vec();
        for idx in near_wall {
            corrected[idx] = Label::Wall;
        }
        corrected
    }
}

/// Number of labels a single rule changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule: &'static str,
    pub changed: usize,
}

/// Ordered sequence of correction rules
pub struct Corrector {
    rules: Vec<Box<dyn CorrectionRule>>,
}

impl Corrector {
    /// The standard correction: [HeightCorrection] followed by [ColumnWallCorrection]
    pub fn new(height_threshold: f64, floor_percentile: f64, min_column_wall_distance: f64) -> Self {
        Self::with_rules(vec![
            Box::new(HeightCorrection::new(height_threshold, floor_percentile)),
            Box::new(ColumnWallCorrection::new(min_column_wall_distance)),
        ])
    }

    /// A corrector that applies `rules` in the given order
    pub fn with_rules(rules: Vec<Box<dyn CorrectionRule>>) -> Self {
        Self { rules }
    }

    /// Runs all rules in order on `labels`. Returns the final labels and, per rule, how many labels it changed
    ///
    /// # Errors
    ///
    /// If `labels` and `positions` differ in length
    pub fn correct(
        &self,
        positions: &[Vector3<f64>],
        labels: &[Label],
    ) -> Result<(Vec<Label>, Vec<RuleOutcome>), PipelineError> {
        if positions.len() != labels.len() {
            return Err(PipelineError::LengthMismatch {
                what: "labels",
                expected: positions.len(),
                actual: labels.len(),
            });
        }
        let mut current = labels.to_vec();
        let mut outcomes = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let corrected = rule.apply(positions, &current);
            let changed = corrected
                .iter()
                .zip(current.iter())
                .filter(|(new, old)| new != old)
                .count();
            log::info!("Correction rule '{}' changed {} labels", rule.name(), changed);
            outcomes.push(RuleOutcome {
                rule: rule.name(),
                changed,
            });
            current = corrected;
        }
        Ok((current, outcomes))
    }

    /// Corrects the labels of `cloud` in place
    pub fn correct_cloud(&self, cloud: &mut PointCloud) -> Result<Vec<RuleOutcome>, PipelineError> {
        let (labels, outcomes) = self.correct(cloud.positions(), cloud.labels())?;
        cloud.set_labels(labels)?;
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan2bim_core::Point;

    fn at(z: f64) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, z)
    }

    /// 6 floor points at z in 0.0..=0.5, 4 ceiling points at z in 2.6..=3.0
    fn consistent_room() -> (Vec<Vector3<f64>>, Vec<Label>) {
        let mut positions = (0..6).map(|i| at(i as f64 * 0.1)).collect::<Vec<_>>();
        positions.extend([2.6, 2.7, 2.9, 3.0].iter().map(|z| at(*z)));
        let mut labels = vec![Label::Floor; 6];
        labels.extend(vec![Label::Ceiling; 4]);
        (positions, labels)
    }

    #[test]
    fn test_height_correction_scenario() {
        let rule = HeightCorrection::new(1.8, 1.0);
        let (mut positions, mut labels) = consistent_room();

        let split_height = rule.split_height(&positions).unwrap();
        assert!((split_height - 1.8).abs() < 0.01);
        assert_eq!(labels, rule.apply(&positions, &labels));

        positions.push(at(2.9));
        labels.push(Label::Floor);
        let corrected = rule.apply(&positions, &labels);
        assert_eq!(Label::Ceiling, corrected[10]);
        assert_eq!(&labels[..10], &corrected[..10]);
    }

    #[test]
    fn test_height_correction_moves_low_ceiling_points() {
        let rule = HeightCorrection::new(1.8, 1.0);
        let (mut positions, mut labels) = consistent_room();
        positions.push(at(0.2));
        labels.push(Label::Ceiling);
        positions.push(at(1.0));
        labels.push(Label::Wall);
        let corrected = rule.apply(&positions, &labels);
        assert_eq!(Label::Floor, corrected[10]);
        assert_eq!(Label::Wall, corrected[11]);
    }

    #[test]
    fn test_height_correction_is_idempotent() {
        let rule = HeightCorrection::new(1.8, 1.0);
        let positions = (0..100).map(|i| at(i as f64 * 0.03)).collect::<Vec<_>>();
        let labels = (0..100)
            .map(|i| if i % 2 == 0 { Label::Floor } else { Label::Ceiling })
            .collect::<Vec<_>>();
        let once = rule.apply(&positions, &labels);
        assert_ne!(labels, once);
        let twice = rule.apply(&positions, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_column_wall_scenario() {
        let rule = ColumnWallCorrection::new(0.6);
        let positions = vec![
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 1.0, 1.0),
            Vector3::new(0.3, 0.0, 1.0),
            Vector3::new(0.0, 1.9, 1.0),
        ];
        let labels = vec![Label::Wall, Label::Wall, Label::Column, Label::Column];
        let corrected = rule.apply(&positions, &labels);
        assert_eq!(
            vec![Label::Wall, Label::Wall, Label::Wall, Label::Column],
            corrected
        );
    }

    #[test]
    fn test_column_wall_without_walls_is_a_no_op() {
        let rule = ColumnWallCorrection::new(0.6);
        let positions = vec![at(0.0), at(0.1)];
        let labels = vec![Label::Column, Label::Floor];
        assert_eq!(labels, rule.apply(&positions, &labels));
        let labels = vec![Label::Wall, Label::Floor];
        assert_eq!(labels, rule.apply(&positions, &labels));
    }

    #[test]
    fn test_rules_run_in_order() {
        // The high floor point becomes ceiling in the first rule, the column next to the wall becomes wall in the
        // second
        let mut points = vec![];
        for i in 0..10 {
            points.push(Point::new(at(i as f64 * 0.01), Vector3::new(0, 0, 0)).with_label(Label::Floor));
        }
        points.push(Point::new(at(2.8), Vector3::new(0, 0, 0)).with_label(Label::Floor));
        points.push(Point::new(Vector3::new(5.0, 5.0, 1.0), Vector3::new(0, 0, 0)).with_label(Label::Wall));
        points.push(Point::new(Vector3::new(5.2, 5.0, 1.0), Vector3::new(0, 0, 0)).with_label(Label::Column));
        let mut cloud = points.into_iter().collect::<PointCloud>();

        let corrector = Corrector::new(1.8, 1.0, 0.6);
        let outcomes = corrector.correct_cloud(&mut cloud).unwrap();
        assert_eq!(
            vec![
                RuleOutcome {
                    rule: "height",
                    changed: 1
                },
                RuleOutcome {
                    rule: "column-wall",
                    changed: 1
                }
            ],
            outcomes
        );
        assert_eq!(Label::Ceiling, cloud.labels()[10]);
        assert_eq!(Label::Wall, cloud.labels()[12]);
    }

    #[test]
    fn test_length_mismatch() {
        let corrector = Corrector::new(1.8, 1.0, 0.6);
        assert!(corrector.correct(&[at(0.0)], &[]).is_err());
    }
}
