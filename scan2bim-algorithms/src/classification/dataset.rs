/// Dense training matrix for the ensemble classifier. Targets are class indices in `0..num_classes`, not labels; the
/// mapping back to labels is kept by the [TrainedModel](super::TrainedModel).
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    values: Vec<f64>,
    num_features: usize,
    targets: Vec<usize>,
    num_classes: usize,
}

impl Dataset {
    /// Creates a dataset from row-major `values`
    ///
    /// # Panics
    ///
    /// If `values` does not hold exactly `num_features` values per target, or a target is not below `num_classes`
    pub fn new(values: Vec<f64>, num_features: usize, targets: Vec<usize>, num_classes: usize) -> Self {
        assert_eq!(values.len(), targets.len() * num_features);
        assert!(targets.iter().all(|target| *target < num_classes));
        Self {
            values,
            num_features,
            targets,
            num_classes,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn row(&self, sample: usize) -> &[f64] {
        &self.values[sample * self.num_features..(sample + 1) * self.num_features]
    }

    pub fn value(&self, sample: usize, feature: usize) -> f64 {
        self.values[sample * self.num_features + feature]
    }

    pub fn target(&self, sample: usize) -> usize {
        self.targets[sample]
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }
}
