use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use scan2bim_algorithms::{classification::TrainingParameters, prediction::SchemaPolicy};
use scan2bim_core::{features::default_feature_columns, PipelineError};
use serde::{Deserialize, Serialize};

/// Locations of the input and output artifacts of all stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Labeled LAS/LAZ file the model is trained on
    pub training_cloud: PathBuf,
    pub training_features: PathBuf,
    pub model: PathBuf,
    pub report: PathBuf,
    /// Unlabeled scan that gets classified
    pub input_cloud: PathBuf,
    pub classified_cloud: PathBuf,
    pub corrected_cloud: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            training_cloud: "data/training_labeled.las".into(),
            training_features: "output/training_features.csv".into(),
            model: "output/scan_to_bim_model.bin".into(),
            report: "output/training_report.json".into(),
            input_cloud: "data/scan.las".into(),
            classified_cloud: "output/result_final.las".into(),
            corrected_cloud: "output/result_corrected.las".into(),
        }
    }
}

impl PathConfig {
    /// Directories that have to exist before the stages run
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut directories: Vec<PathBuf> = vec![];
        for path in [
            &self.training_cloud,
            &self.training_features,
            &self.model,
            &self.report,
            &self.input_cloud,
            &self.classified_cloud,
            &self.corrected_cloud,
        ]
        .iter()
        {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !directories.iter().any(|d| d == parent) {
                    directories.push(parent.to_owned());
                }
            }
        }
        directories
    }
}

/// Feature extraction settings shared by training and inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Neighbourhood radius. Must be the same for the training cloud and every classified cloud
    pub search_radius: f64,
    /// Columns of the feature table the model is trained on, in this order
    pub feature_columns: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            search_radius: 0.4,
            feature_columns: default_feature_columns(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Edge length of the voxels the input cloud is downsampled to before feature extraction
    pub voxel_size: f64,
    pub schema_policy: SchemaPolicy,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            voxel_size: 0.05,
            schema_policy: SchemaPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Margin above the floor level that separates floor from ceiling
    pub height_threshold: f64,
    /// Percentile of all heights that is taken as the floor level
    pub floor_percentile: f64,
    /// Columns closer than this to a wall are relabeled as wall
    pub min_column_wall_distance: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            height_threshold: 1.8,
            floor_percentile: 1.0,
            min_column_wall_distance: 0.6,
        }
    }
}

/// Configuration of the whole pipeline. Every field has a default, so a configuration file only has to contain the
/// values that differ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathConfig,
    pub features: FeatureConfig,
    pub training: TrainingParameters,
    pub prediction: PredictionConfig,
    pub correction: CorrectionConfig,
}

impl PipelineConfig {
    /// Reads a configuration from the JSON file at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        scan2bim_io::artifacts::require_input(path)?;
        let file = File::open(path).with_context(|| format!("Could not open {}", path.display()))?;
        let config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Could not parse configuration file {}", path.display()))?;
        Ok(config)
    }

    /// Reads the configuration from `path`, or uses the defaults if there is no path
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Checks all values that would otherwise only fail deep inside a stage
    pub fn validate(&self) -> Result<(), PipelineError> {
        fn positive(value: f64, name: &str) -> Result<(), PipelineError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(PipelineError::configuration(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )))
            }
        }

        positive(self.features.search_radius, "search_radius")?;
        positive(self.prediction.voxel_size, "voxel_size")?;
        positive(self.correction.height_threshold, "height_threshold")?;
        positive(
            self.correction.min_column_wall_distance,
            "min_column_wall_distance",
        )?;
        if !(0.0..=100.0).contains(&self.correction.floor_percentile) {
            return Err(PipelineError::configuration(format!(
                "floor_percentile must be within [0, 100], got {}",
                self.correction.floor_percentile
            )));
        }
        if self.features.feature_columns.is_empty() {
            return Err(PipelineError::configuration(
                "at least one feature column is required",
            ));
        }
        if self.training.num_folds < 2 {
            return Err(PipelineError::configuration(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.training.num_folds
            )));
        }
        if self.training.forest.num_trees == 0 {
            return Err(PipelineError::configuration(
                "the forest needs at least one tree",
            ));
        }
        Ok(())
    }
}
