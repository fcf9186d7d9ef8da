use float_ord::FloatOrd;
use rand::{rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use super::dataset::Dataset;

/// Growth limits of a single decision tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParameters {
    /// Maximum depth of the tree, `None` grows until all leaves are pure or too small to split
    pub max_depth: Option<usize>,
    /// A node needs at least this many samples to be split
    pub min_samples_split: usize,
    /// Each child of a split needs at least this many samples
    pub min_samples_leaf: usize,
    /// Number of features drawn as split candidates at each node
    pub max_features: usize,
}

/// A node in the decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Samples with `value <= threshold` go to `left`, all others to `right`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Fraction of the training samples per class that ended up in this leaf
    Leaf { distribution: Vec<f64> },
}

/// Binary CART classification tree grown on Gini impurity. Nodes are stored in a flat arena, the root is the first
/// node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    num_classes: usize,
}

struct PendingNode {
    slot: usize,
    samples: Vec<usize>,
    depth: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    /// Grows a tree on the given `samples` of `dataset`. `samples` may contain repeated indices (bootstrap samples).
    /// All randomness (candidate features per split) is drawn from `rng`.
    ///
    /// # Panics
    ///
    /// If `samples` is empty
    pub fn fit(
        dataset: &Dataset,
        samples: Vec<usize>,
        parameters: &TreeParameters,
        rng: &mut StdRng,
    ) -> Self {
        assert!(!samples.is_empty(), "cannot grow a tree without samples");
        let num_classes = dataset.num_classes();
        let mut nodes = vec![Node::Leaf {
            distribution: vec![],
        }];
        // Nodes are grown from an explicit stack, unbounded trees on large data would overflow the call stack
        let mut pending = vec![PendingNode {
            slot: 0,
            samples,
            depth: 0,
        }];
        let mut features = (0..dataset.num_features()).collect::<Vec<_>>();

        while let Some(node) = pending.pop() {
            let counts = class_counts(dataset, &node.samples, num_classes);
            let is_pure = counts.iter().filter(|count| **count > 0).count() <= 1;
            let depth_reached = parameters
                .max_depth
                .map(|max_depth| node.depth >= max_depth)
                .unwrap_or(false);
            let split = if is_pure
                || depth_reached
                || node.samples.len() < parameters.min_samples_split
            {
                None
            } else {
                features.shuffle(rng);
                find_best_split(dataset, &node.samples, &counts, &features, parameters)
            };

            match split {
                None => {
                    nodes[node.slot] = leaf(&counts, node.samples.len());
                }
                Some(split) => {
                    let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = node
                        .samples
                        .into_iter()
                        .partition(|sample| dataset.value(*sample, split.feature) <= split.threshold);
                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf {
                        distribution: vec![],
                    });
                    nodes.push(Node::Leaf {
                        distribution: vec![],
                    });
                    nodes[node.slot] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left,
                        right,
                    };
                    pending.push(PendingNode {
                        slot: right,
                        samples: right_samples,
                        depth: node.depth + 1,
                    });
                    pending.push(PendingNode {
                        slot: left,
                        samples: left_samples,
                        depth: node.depth + 1,
                    });
                }
            }
        }

        Self { nodes, num_classes }
    }

    /// Class distribution of the leaf that `row` falls into
    pub fn predict_distribution(&self, row: &[f64]) -> &[f64] {
        let mut current = 0;
        loop {
            match &self.nodes[current] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    current = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest path from the root to a leaf
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = &self.nodes[node] {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        max_depth
    }
}

fn class_counts(dataset: &Dataset, samples: &[usize], num_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; num_classes];
    for sample in samples {
        counts[dataset.target(*sample)] += 1;
    }
    counts
}

fn leaf(counts: &[usize], total: usize) -> Node {
    Node::Leaf {
        distribution: counts
            .iter()
            .map(|count| *count as f64 / total as f64)
            .collect(),
    }
}

/// Sum of squared class counts, `gini = 1 - sum_sq / n^2`
fn sum_of_squares(counts: &[usize]) -> f64 {
    counts.iter().map(|count| (*count as f64).powi(2)).sum()
}

/// Searches the candidate `features` in order for the split with the lowest weighted Gini impurity. The first
/// `max_features` features are always evaluated; if none of them allows a valid split, the search continues with the
/// remaining features until one does.
fn find_best_split(
    dataset: &Dataset,
    samples: &[usize],
    parent_counts: &[usize],
    features: &[usize],
    parameters: &TreeParameters,
) -> Option<BestSplit> {
    let total = samples.len();
    let mut best: Option<BestSplit> = None;
    let mut sorted = samples.to_vec();

    for (evaluated, feature) in features.iter().enumerate() {
        if evaluated >= parameters.max_features && best.is_some() {
            break;
        }
        sorted.sort_unstable_by_key(|sample| FloatOrd(dataset.value(*sample, *feature)));

        let mut left_counts = vec![0usize; parent_counts.len()];
        let mut left_sum_sq = 0.0;
        let mut right_sum_sq = sum_of_squares(parent_counts);
        for position in 0..total - 1 {
            let class = dataset.target(sorted[position]);
            let left_before = left_counts[class] as f64;
            let right_before = (parent_counts[class] - left_counts[class]) as f64;
            left_counts[class] += 1;
            left_sum_sq += 2.0 * left_before + 1.0;
            right_sum_sq -= 2.0 * right_before - 1.0;

            let num_left = position + 1;
            let num_right = total - num_left;
            if num_left < parameters.min_samples_leaf || num_right < parameters.min_samples_leaf {
                continue;
            }
            let value = dataset.value(sorted[position], *feature);
            let next_value = dataset.value(sorted[position + 1], *feature);
            if !(value < next_value) {
                continue;
            }

            let gini_left = 1.0 - left_sum_sq / (num_left as f64).powi(2);
            let gini_right = 1.0 - right_sum_sq / (num_right as f64).powi(2);
            let impurity =
                (num_left as f64 * gini_left + num_right as f64 * gini_right) / total as f64;
            if best
                .as_ref()
                .map(|best| impurity < best.impurity)
                .unwrap_or(true)
            {
                let mut threshold = value + (next_value - value) / 2.0;
                // Midpoints of adjacent floats can round up to the larger value
                if threshold >= next_value {
                    threshold = value;
                }
                best = Some(BestSplit {
                    feature: *feature,
                    threshold,
                    impurity,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;

    fn parameters(max_features: usize) -> TreeParameters {
        TreeParameters {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features,
        }
    }

    #[test]
    fn test_simple_tree() {
        // class 1 iff the second feature is larger than 5
        let mut values = vec![];
        let mut targets = vec![];
        for i in 0..20 {
            values.push((i % 3) as f64);
            values.push(i as f64 * 0.5);
            targets.push(if i as f64 * 0.5 > 5.0 { 1 } else { 0 });
        }
        let dataset = Dataset::new(values, 2, targets, 2);
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&dataset, (0..20).collect(), &parameters(2), &mut rng);

        assert_eq!(1, tree.depth());
        assert_eq!(&[1.0, 0.0], tree.predict_distribution(&[0.0, 1.0]));
        assert_eq!(&[0.0, 1.0], tree.predict_distribution(&[2.0, 9.0]));
    }

    #[test]
    fn test_tree_memorizes_distinct_samples() {
        let values = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let targets = vec![0, 1, 0, 2, 1, 0];
        let dataset = Dataset::new(values.clone(), 1, targets.clone(), 3);
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&dataset, (0..6).collect(), &parameters(1), &mut rng);
        for (value, target) in values.iter().zip(targets.iter()) {
            let distribution = tree.predict_distribution(&[*value]);
            assert_approx_eq!(1.0, distribution[*target]);
        }
    }

    #[test]
    fn test_limits_produce_mixed_leaves() {
        let values = vec![0.0, 1.0, 2.0, 3.0];
        let targets = vec![0, 1, 0, 1];
        let dataset = Dataset::new(values, 1, targets, 2);
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(
            &dataset,
            (0..4).collect(),
            &TreeParameters {
                max_depth: Some(0),
                ..parameters(1)
            },
            &mut rng,
        );
        assert_eq!(1, tree.num_nodes());
        assert_eq!(&[0.5, 0.5], tree.predict_distribution(&[10.0]));
    }

    #[test]
    fn test_constant_features_yield_a_leaf() {
        let dataset = Dataset::new(vec![1.0; 4], 1, vec![0, 1, 1, 1], 2);
        let mut rng = StdRng::seed_from_u64(3);
        let tree = DecisionTree::fit(&dataset, (0..4).collect(), &parameters(1), &mut rng);
        assert_eq!(1, tree.num_nodes());
        assert_eq!(&[0.25, 0.75], tree.predict_distribution(&[1.0]));
    }
}
