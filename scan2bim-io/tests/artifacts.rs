use std::fs;

use anyhow::Result;
use scan2bim_algorithms::classification::{train, TrainingParameters};
use scan2bim_core::{features::default_feature_columns, FeatureTable, Label, PipelineError};
use scan2bim_io::artifacts::{load_model, load_report, save_model, save_report};

fn small_training_table() -> FeatureTable {
    let columns = default_feature_columns();
    let mut table = FeatureTable::new_labeled(columns.clone());
    for i in 0..30 {
        let mut row = vec![0.1 * (i % 7) as f64; columns.len()];
        let label = match i % 3 {
            0 => Label::Floor,
            1 => Label::Wall,
            _ => Label::Ceiling,
        };
        row[2] = if label == Label::Wall { 0.95 } else { 0.02 };
        row[8] = if label == Label::Ceiling { 2.8 } else { 0.1 };
        table.push_labeled_row(&row, label).unwrap();
    }
    table
}

#[test]
fn test_model_and_report_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let model_path = dir.path().join("output").join("model.bin");
    let report_path = dir.path().join("output").join("report.json");

    let mut parameters = TrainingParameters::default();
    parameters.num_folds = 3;
    parameters.forest.num_trees = 4;
    let (model, report) = train(
        &small_training_table(),
        &default_feature_columns(),
        &parameters,
    )?;
    save_model(&model, &model_path)?;
    save_report(&report, &report_path)?;

    assert_eq!(model, load_model(&model_path)?);
    assert_eq!(report, load_report(&report_path)?);
    Ok(())
}

#[test]
fn test_foreign_file_is_no_model() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("not_a_model.bin");
    fs::write(&path, b"definitely not a model file")?;
    assert!(load_model(&path).is_err());
    Ok(())
}

#[test]
fn test_missing_model_is_reported() {
    let error = load_model("does/not/exist.bin").unwrap_err();
    assert!(matches!(
        error.downcast_ref::<PipelineError>(),
        Some(PipelineError::MissingArtifact { .. })
    ));
}
