use std::collections::BTreeSet;

use rayon::prelude::*;
use scan2bim_core::{features::is_undefined, FeatureTable, Label, PipelineError};
use serde::{Deserialize, Serialize};

use super::{
    dataset::Dataset,
    folds::{fold_splits, stratified_fold_assignment},
    forest::{ForestParameters, RandomForest},
    model::TrainedModel,
    report::EvaluationReport,
};

/// Parameters of [train]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParameters {
    pub num_folds: usize,
    /// Seeds fold assignment and forest construction
    pub seed: u64,
    #[serde(flatten)]
    pub forest: ForestParameters,
}

impl Default for TrainingParameters {
    fn default() -> Self {
        Self {
            num_folds: 5,
            seed: 42,
            forest: Default::default(),
        }
    }
}

/// Trains a random forest on the labeled `table`, using the columns `feature_columns` in that order.
///
/// Rows labeled [Label::Unclassified] and rows with an undefined feature value are excluded. The remaining rows are
/// evaluated with stratified k-fold cross-validation: every row is predicted exactly once, by the forest of the one
/// fold that did not see it during fitting. The held-out predictions make up the [EvaluationReport]. Afterwards a final
/// forest is fit on all remaining rows; that forest is the returned model; the cross-validation forests are dropped.
///
/// # Errors
///
/// - [PipelineError::Configuration] if `table` has no label column, lacks one of the `feature_columns`, or the
///   parameters are invalid
/// - [PipelineError::EmptyTrainingSet] if no rows are left after the exclusions
pub fn train<S: AsRef<str>>(
    table: &FeatureTable,
    feature_columns: &[S],
    parameters: &TrainingParameters,
) -> Result<(TrainedModel, EvaluationReport), PipelineError> {
    if table.labels().is_none() {
        return Err(PipelineError::configuration(
            "training requires a feature table with a label column",
        ));
    }
    if parameters.forest.num_trees == 0 {
        return Err(PipelineError::configuration(
            "the forest needs at least one tree",
        ));
    }
    let mut training_table = table.select_columns(feature_columns)?;

    let unclassified = training_table.retain_rows(|_, label| {
        label.map(Label::is_training_target).unwrap_or(false)
    });
    let undefined =
        training_table.retain_rows(|row, _| !row.iter().copied().any(is_undefined));
    if unclassified > 0 {
        log::info!("Excluded {} unclassified rows from training", unclassified);
    }
    if undefined > 0 {
        log::warn!(
            "Excluded {} rows with undefined feature values from training",
            undefined
        );
    }
    if training_table.is_empty() {
        return Err(PipelineError::EmptyTrainingSet);
    }

    let (dataset, classes) = to_dataset(&training_table)?;
    log::info!(
        "Training on {} rows, {} features, classes {:?}",
        dataset.len(),
        dataset.num_features(),
        classes.iter().map(|label| label.code()).collect::<Vec<_>>()
    );

    let held_out = cross_validate(
        &dataset,
        parameters.num_folds,
        &parameters.forest,
        parameters.seed,
    )?;
    let report = EvaluationReport::from_predictions(
        &classes,
        dataset.targets(),
        &held_out,
        parameters.num_folds,
        parameters.forest.num_trees,
        parameters.seed,
    );
    log::info!("Cross-validated accuracy: {:.4}", report.accuracy);

    let all_samples = (0..dataset.len()).collect::<Vec<_>>();
    let forest = RandomForest::fit(&dataset, &all_samples, &parameters.forest, parameters.seed);
    let model = TrainedModel::new(training_table.columns().to_vec(), classes, forest)?;
    Ok((model, report))
}

/// Runs stratified k-fold cross-validation on `dataset` and returns the held-out prediction of every sample. Folds are
/// evaluated in parallel, each with a forest that is fit only on the samples outside of the fold.
///
/// # Errors
///
/// If `num_folds` is less than 2 or larger than the number of samples
pub fn cross_validate(
    dataset: &Dataset,
    num_folds: usize,
    parameters: &ForestParameters,
    seed: u64,
) -> Result<Vec<usize>, PipelineError> {
    let assignment = stratified_fold_assignment(dataset.targets(), num_folds, seed)?;
    let fold_predictions = fold_splits(&assignment, num_folds)
        .into_par_iter()
        .enumerate()
        .map(|(fold, split)| {
            let forest = RandomForest::fit(dataset, &split.train, parameters, seed);
            let predictions = forest.predict_samples(dataset, &split.test);
            log::debug!(
                "Fold {}: fit on {} rows, predicted {} held-out rows",
                fold,
                split.train.len(),
                split.test.len()
            );
            (split.test, predictions)
        })
        .collect::<Vec<_>>();

    let mut held_out = vec![None; dataset.len()];
    for (test, predictions) in fold_predictions {
        for (sample, prediction) in test.into_iter().zip(predictions.into_iter()) {
            held_out[sample] = Some(prediction);
        }
    }
    held_out
        .into_iter()
        .enumerate()
        .map(|(sample, prediction)| {
            prediction.ok_or_else(|| {
                PipelineError::configuration(format!(
                    "training row {} was not assigned to any fold",
                    sample
                ))
            })
        })
        .collect()
}

/// Converts the labeled `table` into a dataset with class indices, together with the labels those indices stand for
fn to_dataset(table: &FeatureTable) -> Result<(Dataset, Vec<Label>), PipelineError> {
    let labels = table.labels().ok_or_else(|| {
        PipelineError::configuration("training requires a feature table with a label column")
    })?;
    let classes = labels
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    let targets = labels
        .iter()
        .map(|label| classes.binary_search(label).unwrap_or_default())
        .collect();
    let values = table.rows().flatten().copied().collect();
    Ok((
        Dataset::new(values, table.num_columns(), targets, classes.len()),
        classes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use scan2bim_core::features::{default_feature_columns, UNDEFINED, VERTICALITY, Z_NORM};

    /// Rows that are separable by verticality and height: floor low and flat, ceiling high and flat, walls vertical
    fn room_table(rows_per_class: usize) -> FeatureTable {
        let mut rng = StdRng::seed_from_u64(11);
        let columns = default_feature_columns();
        let mut table = FeatureTable::new_labeled(columns.clone());
        for label in [Label::Floor, Label::Wall, Label::Ceiling].iter() {
            for _ in 0..rows_per_class {
                let mut row = (0..columns.len())
                    .map(|_| rng.gen_range(0.0..1.0))
                    .collect::<Vec<f64>>();
                let (verticality, z_norm) = match label {
                    Label::Floor => (rng.gen_range(0.0..0.1), rng.gen_range(0.0..0.3)),
                    Label::Ceiling => (rng.gen_range(0.0..0.1), rng.gen_range(2.5..3.0)),
                    _ => (rng.gen_range(0.9..1.0), rng.gen_range(0.0..3.0)),
                };
                row[table.column_index(VERTICALITY).unwrap()] = verticality;
                row[table.column_index(Z_NORM).unwrap()] = z_norm;
                table.push_labeled_row(&row, *label).unwrap();
            }
        }
        table
    }

    fn parameters() -> TrainingParameters {
        TrainingParameters {
            num_folds: 3,
            seed: 42,
            forest: ForestParameters {
                num_trees: 15,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_train_separable_room() {
        let table = room_table(40);
        let columns = default_feature_columns();
        let (model, report) = train(&table, &columns, &parameters()).unwrap();

        assert_eq!(columns.as_slice(), model.feature_names());
        assert_eq!(&[Label::Floor, Label::Wall, Label::Ceiling], model.classes());
        assert_eq!(15, model.forest().num_trees());

        assert_eq!(120, report.num_samples);
        let predicted_total: usize = report.confusion_matrix.iter().flatten().sum();
        assert_eq!(120, predicted_total);
        assert!(report.accuracy > 0.9);
        assert!(report.per_class.iter().all(|m| m.support == 40));
    }

    #[test]
    fn test_unclassified_and_undefined_rows_are_excluded() {
        let mut table = room_table(20);
        let columns = default_feature_columns();
        table
            .push_labeled_row(&vec![0.5; columns.len()], Label::Unclassified)
            .unwrap();
        let mut undefined_row = vec![0.5; columns.len()];
        undefined_row[0] = UNDEFINED;
        table.push_labeled_row(&undefined_row, Label::Wall).unwrap();

        let (model, report) = train(&table, &columns, &parameters()).unwrap();
        assert_eq!(60, report.num_samples);
        assert!(!model.classes().contains(&Label::Unclassified));
    }

    #[test]
    fn test_training_subset_of_columns() {
        let table = room_table(20);
        let (model, _) = train(&table, &[VERTICALITY, Z_NORM], &parameters()).unwrap();
        assert_eq!(&[VERTICALITY.to_string(), Z_NORM.to_string()], model.feature_names());
        assert_eq!(Label::Ceiling, model.predict_row(&[0.05, 2.8]));
        assert_eq!(Label::Wall, model.predict_row(&[0.95, 1.5]));
    }

    #[test]
    fn test_training_is_deterministic() {
        let table = room_table(20);
        let columns = default_feature_columns();
        let first = train(&table, &columns, &parameters()).unwrap();
        let second = train(&table, &columns, &parameters()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_row_is_held_out_exactly_once() {
        let table = room_table(10);
        let (dataset, _) = to_dataset(&table).unwrap();
        let held_out = cross_validate(&dataset, 5, &parameters().forest, 1).unwrap();
        assert_eq!(dataset.len(), held_out.len());
        assert!(held_out.iter().all(|class| *class < dataset.num_classes()));
    }

    #[test]
    fn test_held_out_rows_are_not_memorized() {
        // Labels are independent of the features, so any model that saw a row during fitting would reproduce its label
        // while held-out predictions can only guess
        let mut rng = StdRng::seed_from_u64(3);
        let num_samples = 200;
        let values = (0..num_samples * 2)
            .map(|_| rng.gen_range(0.0..1.0))
            .collect::<Vec<f64>>();
        let targets = (0..num_samples).map(|i| i % 2).collect::<Vec<_>>();
        let dataset = Dataset::new(values, 2, targets.clone(), 2);
        let forest_parameters = ForestParameters {
            num_trees: 10,
            ..Default::default()
        };

        let held_out = cross_validate(&dataset, 5, &forest_parameters, 9).unwrap();
        let held_out_accuracy =
            held_out.iter().zip(targets.iter()).filter(|(p, t)| p == t).count() as f64 / num_samples as f64;
        assert!(held_out_accuracy < 0.75);

        let all = (0..num_samples).collect::<Vec<_>>();
        let forest = RandomForest::fit(&dataset, &all, &forest_parameters, 9);
        let resubstitution = forest.predict_samples(&dataset, &all);
        let resubstitution_accuracy =
            resubstitution.iter().zip(targets.iter()).filter(|(p, t)| p == t).count() as f64 / num_samples as f64;
        assert!(resubstitution_accuracy > 0.9);
    }

    #[test]
    fn test_training_errors() {
        let columns = default_feature_columns();

        let unlabeled = FeatureTable::new(columns.clone());
        assert!(matches!(
            train(&unlabeled, &columns, &parameters()),
            Err(PipelineError::Configuration(_))
        ));

        let mut only_unclassified = FeatureTable::new_labeled(columns.clone());
        only_unclassified
            .push_labeled_row(&vec![0.1; columns.len()], Label::Unclassified)
            .unwrap();
        assert!(matches!(
            train(&only_unclassified, &columns, &parameters()),
            Err(PipelineError::EmptyTrainingSet)
        ));

        let table = room_table(5);
        assert!(matches!(
            train(&table, &["curvature"], &parameters()),
            Err(PipelineError::Configuration(_))
        ));
    }
}
