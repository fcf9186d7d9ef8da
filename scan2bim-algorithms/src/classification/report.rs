use std::fmt::Display;

use scan2bim_core::Label;
use serde::{Deserialize, Serialize};

/// Precision, recall and F1 score of a single class, together with the number of samples that truly belong to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: Label,
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged metrics over all classes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Diagnostic result of cross-validating a classifier: per-class metrics and a confusion matrix over the held-out
/// predictions of all folds. Rows of the confusion matrix are the true classes, columns the predicted classes, both in
/// the order of `classes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub classes: Vec<Label>,
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_average: AveragedMetrics,
    pub weighted_average: AveragedMetrics,
    pub confusion_matrix: Vec<Vec<usize>>,
    pub num_samples: usize,
    pub num_folds: usize,
    pub num_trees: usize,
    pub seed: u64,
}

/// Ratio that is defined as 0 when the denominator is 0
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Mean of `metric` over all classes, weighted by class support
fn weighted_mean<F: Fn(&ClassMetrics) -> f64>(per_class: &[ClassMetrics], num_samples: usize, metric: F) -> f64 {
    if num_samples == 0 {
        return 0.0;
    }
    per_class
        .iter()
        .map(|m| metric(m) * m.support as f64)
        .sum::<f64>()
        / num_samples as f64
}

impl EvaluationReport {
    /// Builds the report from the true and predicted class indices of every sample. Class indices refer to
    /// `classes`.
    ///
    /// # Panics
    ///
    /// If `truth` and `predicted` differ in length or contain an index outside of `classes`
    pub fn from_predictions(
        classes: &[Label],
        truth: &[usize],
        predicted: &[usize],
        num_folds: usize,
        num_trees: usize,
        seed: u64,
    ) -> Self {
        assert_eq!(truth.len(), predicted.len());
        let num_classes = classes.len();
        let mut confusion_matrix = vec![vec![0usize; num_classes]; num_classes];
        for (t, p) in truth.iter().zip(predicted.iter()) {
            confusion_matrix[*t][*p] += 1;
        }

        let per_class = classes
            .iter()
            .enumerate()
            .map(|(class, label)| {
                let true_positives = confusion_matrix[class][class];
                let support = confusion_matrix[class].iter().sum::<usize>();
                let predicted_positives = confusion_matrix.iter().map(|row| row[class]).sum::<usize>();
                let precision = ratio(true_positives, predicted_positives);
                let recall = ratio(true_positives, support);
                ClassMetrics {
                    label: *label,
                    name: label.name().to_string(),
                    precision,
                    recall,
                    f1_score: f1(precision, recall),
                    support,
                }
            })
            .collect::<Vec<_>>();

        let num_samples = truth.len();
        let correct = (0..num_classes).map(|class| confusion_matrix[class][class]).sum();
        let macro_average = AveragedMetrics {
            precision: per_class.iter().map(|m| m.precision).sum::<f64>() / num_classes.max(1) as f64,
            recall: per_class.iter().map(|m| m.recall).sum::<f64>() / num_classes.max(1) as f64,
            f1_score: per_class.iter().map(|m| m.f1_score).sum::<f64>() / num_classes.max(1) as f64,
            support: num_samples,
        };
        let weighted_average = AveragedMetrics {
            precision: weighted_mean(&per_class, num_samples, |m| m.precision),
            recall: weighted_mean(&per_class, num_samples, |m| m.recall),
            f1_score: weighted_mean(&per_class, num_samples, |m| m.f1_score),
            support: num_samples,
        };

        Self {
            classes: classes.to_vec(),
            per_class,
            accuracy: ratio(correct, num_samples),
            macro_average,
            weighted_average,
            confusion_matrix,
            num_samples,
            num_folds,
            num_trees,
            seed,
        }
    }
}

impl Display for EvaluationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Cross-validation ({} folds, {} trees, seed {}) on {} rows",
            self.num_folds, self.num_trees, self.seed, self.num_samples
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for metrics in &self.per_class {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                format!("{} ({})", metrics.name, metrics.label.code()),
                metrics.precision,
                metrics.recall,
                metrics.f1_score,
                metrics.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.num_samples
        )?;
        for (name, average) in [
            ("macro avg", &self.macro_average),
            ("weighted avg", &self.weighted_average),
        ]
        .iter()
        {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, average.precision, average.recall, average.f1_score, average.support
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows: true class, columns: predicted class)")?;
        write!(f, "{:>8}", "")?;
        for label in &self.classes {
            write!(f, " {:>8}", label.code())?;
        }
        writeln!(f)?;
        for (label, row) in self.classes.iter().zip(self.confusion_matrix.iter()) {
            write!(f, "{:>8}", label.code())?;
            for count in row {
                write!(f, " {:>8}", count)?;
            }
            writeln!(f)?;
        }
        let legend = self
            .classes
            .iter()
            .map(|label| format!("{} = {}", label.code(), label.name()))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "Legend: {}", legend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn report() -> EvaluationReport {
        // floor: 4 rows, 3 right; wall: 2 rows, both right; one floor row predicted as wall
        let classes = [Label::Floor, Label::Wall];
        let truth = [0, 0, 0, 0, 1, 1];
        let predicted = [0, 0, 0, 1, 1, 1];
        EvaluationReport::from_predictions(&classes, &truth, &predicted, 2, 10, 42)
    }

    #[test]
    fn test_metrics() {
        let report = report();
        assert_eq!(vec![vec![3, 1], vec![0, 2]], report.confusion_matrix);
        assert_approx_eq!(5.0 / 6.0, report.accuracy);

        let floor = &report.per_class[0];
        assert_approx_eq!(1.0, floor.precision);
        assert_approx_eq!(0.75, floor.recall);
        assert_approx_eq!(6.0 / 7.0, floor.f1_score);
        assert_eq!(4, floor.support);

        let wall = &report.per_class[1];
        assert_approx_eq!(2.0 / 3.0, wall.precision);
        assert_approx_eq!(1.0, wall.recall);
        assert_approx_eq!(0.8, wall.f1_score);

        assert_approx_eq!((1.0 + 2.0 / 3.0) / 2.0, report.macro_average.precision);
        assert_approx_eq!((4.0 * 0.75 + 2.0 * 1.0) / 6.0, report.weighted_average.recall);
    }

    #[test]
    fn test_class_without_predictions() {
        let classes = [Label::Floor, Label::Column];
        let report = EvaluationReport::from_predictions(&classes, &[0, 1], &[0, 0], 2, 1, 0);
        assert_approx_eq!(0.0, report.per_class[1].precision);
        assert_approx_eq!(0.0, report.per_class[1].f1_score);
    }

    #[test]
    fn test_text_layout() {
        let text = report().to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("floor (2)"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("Legend: 2 = floor, 6 = wall"));
    }
}
