use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    dataset::Dataset,
    tree::{DecisionTree, TreeParameters},
};

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Square root of the feature count
    Sqrt,
    /// Binary logarithm of the feature count
    Log2,
    /// Every feature
    All,
    /// A fixed number of features, capped at the feature count
    Count(usize),
}

impl MaxFeatures {
    /// Resolves to a concrete number of features in `1..=num_features`
    pub fn resolve(self, num_features: usize) -> usize {
        let count = match self {
            MaxFeatures::Sqrt => (num_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (num_features as f64).log2().floor() as usize,
            MaxFeatures::All => num_features,
            MaxFeatures::Count(count) => count,
        };
        count.max(1).min(num_features.max(1))
    }
}

impl Default for MaxFeatures {
    fn default() -> Self {
        MaxFeatures::Sqrt
    }
}

/// Hyperparameters of a [RandomForest]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParameters {
    pub num_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for ForestParameters {
    fn default() -> Self {
        Self {
            num_trees: 500,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
        }
    }
}

/// Ensemble of decision trees, each grown on a bootstrap sample of the training data. Predictions average the leaf
/// class distributions of all trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    num_features: usize,
    num_classes: usize,
}

impl RandomForest {
    /// Fits a forest on the given `samples` of `dataset`. The per-tree seeds are drawn from a generator seeded with
    /// `seed`, so the same inputs always yield the same forest regardless of how the trees are scheduled onto threads.
    /// Trees are grown in parallel.
    ///
    /// # Panics
    ///
    /// If `samples` is empty or `parameters.num_trees` is zero
    pub fn fit(dataset: &Dataset, samples: &[usize], parameters: &ForestParameters, seed: u64) -> Self {
        assert!(!samples.is_empty(), "cannot fit a forest without samples");
        assert!(parameters.num_trees > 0, "a forest needs at least one tree");

        let tree_parameters = TreeParameters {
            max_depth: parameters.max_depth,
            min_samples_split: parameters.min_samples_split.max(2),
            min_samples_leaf: parameters.min_samples_leaf.max(1),
            max_features: parameters.max_features.resolve(dataset.num_features()),
        };
        let mut master_rng = StdRng::seed_from_u64(seed);
        let tree_seeds = (0..parameters.num_trees)
            .map(|_| master_rng.gen::<u64>())
            .collect::<Vec<_>>();

        let trees = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let bootstrap = (0..samples.len())
                    .map(|_| samples[rng.gen_range(0..samples.len())])
                    .collect::<Vec<_>>();
                DecisionTree::fit(dataset, bootstrap, &tree_parameters, &mut rng)
            })
            .collect();

        Self {
            trees,
            num_features: dataset.num_features(),
            num_classes: dataset.num_classes(),
        }
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Mean class distribution over all trees
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut distribution = vec![0.0; self.num_classes];
        for tree in &self.trees {
            for (sum, probability) in distribution
                .iter_mut()
                .zip(tree.predict_distribution(row).iter())
            {
                *sum += probability;
            }
        }
        let num_trees = self.trees.len() as f64;
        distribution.iter_mut().for_each(|p| *p /= num_trees);
        distribution
    }

    /// Most probable class index of `row`. Ties go to the lowest class index
    pub fn predict(&self, row: &[f64]) -> usize {
        argmax(&self.predict_proba(row))
    }

    /// Predicts the class index of every sample in `samples`, in parallel
    pub fn predict_samples(&self, dataset: &Dataset, samples: &[usize]) -> Vec<usize> {
        samples
            .par_iter()
            .map(|sample| self.predict(dataset.row(*sample)))
            .collect()
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = index;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::Rng;

    fn two_blobs(count: usize, seed: u64) -> Dataset {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut values = vec![];
        let mut targets = vec![];
        for i in 0..count {
            let class = i % 2;
            let center = if class == 0 { -2.0 } else { 2.0 };
            values.push(center + rng.gen_range(-1.0..1.0));
            values.push(rng.gen_range(-5.0..5.0));
            values.push(rng.gen_range(-5.0..5.0));
            targets.push(class);
        }
        Dataset::new(values, 3, targets, 2)
    }

    fn small_forest() -> ForestParameters {
        ForestParameters {
            num_trees: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(3, MaxFeatures::Sqrt.resolve(9));
        assert_eq!(3, MaxFeatures::Log2.resolve(9));
        assert_eq!(9, MaxFeatures::All.resolve(9));
        assert_eq!(9, MaxFeatures::Count(20).resolve(9));
        assert_eq!(1, MaxFeatures::Count(0).resolve(9));
        assert_eq!(1, MaxFeatures::Sqrt.resolve(2));
    }

    #[test]
    fn test_forest_separates_blobs() {
        let dataset = two_blobs(200, 5);
        let samples = (0..dataset.len()).collect::<Vec<_>>();
        let forest = RandomForest::fit(&dataset, &samples, &small_forest(), 42);
        assert_eq!(20, forest.num_trees());
        assert_eq!(0, forest.predict(&[-2.0, 0.0, 0.0]));
        assert_eq!(1, forest.predict(&[2.0, 0.0, 0.0]));

        let probabilities = forest.predict_proba(&[2.5, 1.0, -1.0]);
        assert_approx_eq!(1.0, probabilities.iter().sum::<f64>(), 1e-9);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let dataset = two_blobs(100, 9);
        let samples = (0..dataset.len()).collect::<Vec<_>>();
        let first = RandomForest::fit(&dataset, &samples, &small_forest(), 7);
        let second = RandomForest::fit(&dataset, &samples, &small_forest(), 7);
        assert_eq!(first, second);
        let third = RandomForest::fit(&dataset, &samples, &small_forest(), 8);
        assert_ne!(first, third);
    }

    #[test]
    fn test_argmax_ties_go_to_lowest_index() {
        assert_eq!(0, argmax(&[0.5, 0.5]));
        assert_eq!(1, argmax(&[0.25, 0.5, 0.25]));
        assert_eq!(2, argmax(&[0.2, 0.3, 0.5]));
    }
}
