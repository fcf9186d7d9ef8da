//! The four stages of the pipeline. Every stage reads its inputs from and writes its outputs to the locations given by
//! [PathConfig](crate::config::PathConfig), so that each stage can run on its own. Inputs are checked before any work
//! is done and outputs are only written once the stage has succeeded.

use std::fmt::Display;

use anyhow::{Context, Result};
use log::info;
use scan2bim_algorithms::{
    classification::{self, EvaluationReport},
    correction::{Corrector, RuleOutcome},
    prediction::{predict_voxels, upsample, PredictionDiagnostics},
    structure_measures::{compute_features, compute_labeled_features},
    voxel_grid::downsample,
};
use scan2bim_core::{features::is_undefined, FeatureTable, Label};
use scan2bim_io::{
    artifacts::{load_model, require_input, save_model, save_report},
    feature_csv::{read_feature_table, write_feature_table},
    las_io::{read_point_cloud, write_classified_copy},
};

use crate::config::PipelineConfig;

/// One independently runnable step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Train,
    Predict,
    Correct,
}

impl Stage {
    /// All stages in the order the pipeline runs them
    pub const ALL: [Stage; 4] = [Stage::Extract, Stage::Train, Stage::Predict, Stage::Correct];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Extract => "feature extraction",
            Stage::Train => "training",
            Stage::Predict => "prediction",
            Stage::Correct => "correction",
        }
    }

    pub fn run(self, config: &PipelineConfig) -> Result<()> {
        match self {
            Stage::Extract => extract(config).map(|_| ()),
            Stage::Train => train(config).map(|_| ()),
            Stage::Predict => predict(config).map(|_| ()),
            Stage::Correct => correct(config).map(|_| ()),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Rows dropped by [extract]. Unclassified rows are dropped first, so a row that is both is only counted as unclassified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedRows {
    pub unclassified: usize,
    pub degenerate: usize,
}

/// Computes the features of the labeled training cloud and writes them as the training table. Unclassified points and
/// points with a degenerate neighbourhood are not part of the table.
pub fn extract(config: &PipelineConfig) -> Result<(FeatureTable, DroppedRows)> {
    let paths = &config.paths;
    let (cloud, _) = read_point_cloud(&paths.training_cloud)?;
    info!(
        "Computing features of {} points with search radius {}",
        cloud.len(),
        config.features.search_radius
    );
    let mut table = compute_labeled_features(&cloud, config.features.search_radius)?;

    let unclassified = table.retain_rows(|_, label| label.map_or(false, Label::is_training_target));
    let degenerate = table.retain_rows(|row, _| !row.iter().copied().any(is_undefined));
    info!(
        "Dropped {} unclassified rows and {} further rows with a degenerate neighbourhood, {} rows remain",
        unclassified,
        degenerate,
        table.len()
    );

    write_feature_table(&table, &paths.training_features)?;
    info!(
        "Wrote training features to {}",
        paths.training_features.display()
    );
    Ok((
        table,
        DroppedRows {
            unclassified,
            degenerate,
        },
    ))
}

/// Trains the model on the training table, then writes the model and its cross-validation report
pub fn train(config: &PipelineConfig) -> Result<EvaluationReport> {
    let paths = &config.paths;
    let table = read_feature_table(&paths.training_features)?;
    info!(
        "Training a forest of {} trees on {} rows with {}-fold cross-validation",
        config.training.forest.num_trees,
        table.len(),
        config.training.num_folds
    );
    let (model, report) =
        classification::train(&table, &config.features.feature_columns, &config.training)?;
    info!("Cross-validation results:\n{}", report);

    save_model(&model, &paths.model)?;
    save_report(&report, &paths.report)?;
    info!(
        "Wrote model to {} and report to {}",
        paths.model.display(),
        paths.report.display()
    );
    Ok(report)
}

/// Classifies the input cloud: downsample, compute voxel features, predict voxel labels and transfer them back to
/// every point. The classified cloud is a copy of the input cloud with new classification codes.
pub fn predict(config: &PipelineConfig) -> Result<PredictionDiagnostics> {
    let paths = &config.paths;
    require_input(&paths.input_cloud)?;
    require_input(&paths.model)?;
    let model = load_model(&paths.model)?;
    let (cloud, _) = read_point_cloud(&paths.input_cloud)?;

    let (voxels, _) = downsample(&cloud, config.prediction.voxel_size)?;
    info!(
        "Downsampled {} points to {} voxels of size {}",
        cloud.len(),
        voxels.len(),
        config.prediction.voxel_size
    );
    let table = compute_features(&voxels, config.features.search_radius)?;
    let (voxel_labels, diagnostics) =
        predict_voxels(&table, &model, config.prediction.schema_policy)?;
    let labels = upsample(voxels.positions(), &voxel_labels, cloud.positions())
        .context("Could not transfer voxel labels to the full resolution cloud")?;
    log_label_counts(&labels);

    write_classified_copy(&paths.input_cloud, &paths.classified_cloud, &labels)?;
    Ok(diagnostics)
}

/// Applies the correction rules to the classified cloud
pub fn correct(config: &PipelineConfig) -> Result<Vec<RuleOutcome>> {
    let paths = &config.paths;
    let (cloud, _) = read_point_cloud(&paths.classified_cloud)?;
    let correction = &config.correction;
    let corrector = Corrector::new(
        correction.height_threshold,
        correction.floor_percentile,
        correction.min_column_wall_distance,
    );
    let (labels, outcomes) = corrector.correct(cloud.positions(), cloud.labels())?;
    log_label_counts(&labels);

    write_classified_copy(&paths.classified_cloud, &paths.corrected_cloud, &labels)?;
    Ok(outcomes)
}

fn log_label_counts(labels: &[Label]) {
    for label in Label::ALL.iter() {
        let count = labels.iter().filter(|l| *l == label).count();
        info!("{:>12}: {}", label.name(), count);
    }
}
